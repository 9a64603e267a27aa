//! Cache-backed guest carts.

use std::time::Duration;

use common::{GUEST_CART_TTL, ProductId, SessionId};
use domain::Cart;

use crate::store::CacheClient;
use crate::{Result, StoreError};

/// Prefix of every guest cart key in the cache.
pub const GUEST_CART_KEY_PREFIX: &str = "guest_cart:";

/// Repository of guest carts keyed by session ID.
///
/// Carts are stored as JSON documents whose expiry is reset on every save.
/// The read-modify-write operations are not atomic against the cache:
/// concurrent mutations of one session race and the last save wins.
#[derive(Debug, Clone)]
pub struct GuestCartStore<C> {
    cache: C,
    ttl: Duration,
}

impl<C: CacheClient> GuestCartStore<C> {
    /// Creates a guest cart store with the default seven-day expiry.
    pub fn new(cache: C) -> Self {
        Self::with_ttl(cache, GUEST_CART_TTL)
    }

    /// Creates a guest cart store with a custom expiry.
    pub fn with_ttl(cache: C, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Returns the cache key for a session.
    pub fn key(session_id: &SessionId) -> String {
        format!("{GUEST_CART_KEY_PREFIX}{session_id}")
    }

    /// Loads the session's cart.
    ///
    /// A missing key yields a fresh empty cart, not an error.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, session_id: &SessionId) -> Result<Cart> {
        match self.cache.get(&Self::key(session_id)).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Cart::new_guest(session_id)),
        }
    }

    /// Stores the cart and resets its expiry.
    #[tracing::instrument(skip(self, cart), fields(items = cart.item_count()))]
    pub async fn save(&self, session_id: &SessionId, cart: &Cart) -> Result<()> {
        let json = serde_json::to_string(cart)?;
        self.cache
            .set(&Self::key(session_id), json, self.ttl)
            .await
    }

    /// Sets the quantity of an existing line.
    ///
    /// Fails with `ItemNotFound` and writes nothing if no line matches.
    #[tracing::instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        session_id: &SessionId,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<()> {
        let mut cart = self.get(session_id).await?;
        if !cart.set_quantity(product_id, quantity) {
            return Err(StoreError::ItemNotFound {
                product_id: product_id.clone(),
            });
        }
        self.save(session_id, &cart).await
    }

    /// Removes the line for a product and saves, even if nothing matched.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(&self, session_id: &SessionId, product_id: &ProductId) -> Result<()> {
        let mut cart = self.get(session_id).await?;
        cart.remove_item(product_id);
        self.save(session_id, &cart).await
    }

    /// Deletes the session's cart. Idempotent.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, session_id: &SessionId) -> Result<()> {
        self.cache.delete(&Self::key(session_id)).await
    }
}

#[cfg(test)]
mod tests {
    use domain::{CartItem, Money};

    use super::*;
    use crate::memory::InMemoryCache;

    fn session() -> SessionId {
        SessionId::new("sess-1")
    }

    fn widget(quantity: i64) -> CartItem {
        CartItem::new("SKU-001", "Widget", quantity, Money::from_cents(1000))
    }

    #[tokio::test]
    async fn test_missing_key_yields_empty_cart() {
        let store = GuestCartStore::new(InMemoryCache::new());
        let cart = store.get(&session()).await.unwrap();

        assert!(cart.is_empty());
        assert_eq!(cart.id, "sess-1");
        assert!(cart.user_id.is_none());
    }

    #[tokio::test]
    async fn test_save_uses_prefixed_key_and_ttl() {
        let cache = InMemoryCache::new();
        let store = GuestCartStore::new(cache.clone());
        let mut cart = Cart::new_guest(&session());
        cart.merge_item(widget(2));

        store.save(&session(), &cart).await.unwrap();

        assert!(cache.contains_key("guest_cart:sess-1").await);
        let remaining = cache.remaining_ttl("guest_cart:sess-1").await.unwrap();
        assert!(remaining <= GUEST_CART_TTL);
        assert!(remaining > GUEST_CART_TTL - Duration::from_secs(5));

        let loaded = store.get(&session()).await.unwrap();
        assert_eq!(loaded, cart);
    }

    #[tokio::test]
    async fn test_read_failure_is_distinct_from_missing() {
        let cache = InMemoryCache::new();
        cache.set_fail_on_get(true).await;
        let store = GuestCartStore::new(cache);

        let err = store.get(&session()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_update_quantity_missing_item_writes_nothing() {
        let cache = InMemoryCache::new();
        let store = GuestCartStore::new(cache.clone());
        let mut cart = Cart::new_guest(&session());
        cart.merge_item(widget(1));
        store.save(&session(), &cart).await.unwrap();
        let writes = cache.write_count().await;

        let err = store
            .update_quantity(&session(), &ProductId::new("SKU-404"), 3)
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::ItemNotFound { .. }));
        assert_eq!(cache.write_count().await, writes);
    }

    #[tokio::test]
    async fn test_update_quantity_existing_item() {
        let store = GuestCartStore::new(InMemoryCache::new());
        let mut cart = Cart::new_guest(&session());
        cart.merge_item(widget(1));
        store.save(&session(), &cart).await.unwrap();

        store
            .update_quantity(&session(), &ProductId::new("SKU-001"), 7)
            .await
            .unwrap();

        let cart = store.get(&session()).await.unwrap();
        assert_eq!(cart.items[0].quantity, 7);
    }

    #[tokio::test]
    async fn test_remove_absent_item_still_saves() {
        let cache = InMemoryCache::new();
        let store = GuestCartStore::new(cache.clone());

        store
            .remove_item(&session(), &ProductId::new("SKU-404"))
            .await
            .unwrap();

        assert_eq!(cache.write_count().await, 1);
        assert!(store.get(&session()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = GuestCartStore::new(InMemoryCache::new());
        let mut cart = Cart::new_guest(&session());
        cart.merge_item(widget(1));
        store.save(&session(), &cart).await.unwrap();

        store.delete(&session()).await.unwrap();
        store.delete(&session()).await.unwrap();

        assert!(store.get(&session()).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_slides_on_every_save() {
        let ttl = Duration::from_secs(60);
        let store = GuestCartStore::with_ttl(InMemoryCache::new(), ttl);
        let mut cart = Cart::new_guest(&session());
        cart.merge_item(widget(1));
        store.save(&session(), &cart).await.unwrap();

        tokio::time::advance(Duration::from_secs(45)).await;
        store
            .update_quantity(&session(), &ProductId::new("SKU-001"), 2)
            .await
            .unwrap();

        // 90s after the first save, but only 45s after the second one.
        tokio::time::advance(Duration::from_secs(45)).await;
        let cart = store.get(&session()).await.unwrap();
        assert_eq!(cart.items[0].quantity, 2);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(store.get(&session()).await.unwrap().is_empty());
    }
}
