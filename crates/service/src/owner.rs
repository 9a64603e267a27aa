//! Caller identity and its resolution to a cart store.

use common::{ProductId, SessionId, UserId};
use domain::{AppError, Cart, CartItem, ErrorCode};
use store::{CacheClient, GuestCartStore, StoreError, UserCartStore};

/// Whose cart an operation acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    /// Anonymous session, backed by the cache.
    Guest(SessionId),
    /// Authenticated user, backed by the document store.
    User(UserId),
}

impl CartOwner {
    /// Returns the session or user ID.
    pub fn id(&self) -> &str {
        match self {
            CartOwner::Guest(session_id) => session_id.as_str(),
            CartOwner::User(user_id) => user_id.as_str(),
        }
    }

    /// Returns `"guest"` or `"user"`.
    pub fn kind(&self) -> &'static str {
        match self {
            CartOwner::Guest(_) => "guest",
            CartOwner::User(_) => "user",
        }
    }
}

impl std::fmt::Display for CartOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// A [`CartOwner`] bound to the store that holds its cart.
pub(crate) enum CartHandle<'a, C, U> {
    Guest {
        store: &'a GuestCartStore<C>,
        session_id: &'a SessionId,
    },
    User {
        store: &'a U,
        user_id: &'a UserId,
    },
}

impl<C: CacheClient, U: UserCartStore> CartHandle<'_, C, U> {
    /// Adds a line. Guest carts enforce `max_items` on new products; user
    /// carts leave merging to the store.
    pub(crate) async fn add_item(&self, item: CartItem, max_items: usize) -> Result<(), AppError> {
        match self {
            CartHandle::Guest { store, session_id } => {
                let mut cart = store.get(session_id).await.map_err(|e| {
                    AppError::wrap(ErrorCode::GetCartFailed, "failed to load guest cart", e)
                })?;
                cart.add_item(item, max_items)?;
                store.save(session_id, &cart).await.map_err(|e| {
                    AppError::wrap(ErrorCode::SaveCartFailed, "failed to save guest cart", e)
                })
            }
            CartHandle::User { store, user_id } => {
                store.add_item(user_id, item).await.map_err(|e| {
                    AppError::wrap(ErrorCode::AddFailed, "failed to add item to cart", e)
                })
            }
        }
    }

    /// Loads the cart; a user without a stored cart gets an empty one.
    pub(crate) async fn get(&self) -> Result<Cart, StoreError> {
        match self {
            CartHandle::Guest { store, session_id } => store.get(session_id).await,
            CartHandle::User { store, user_id } => Ok(store
                .get_by_user(user_id)
                .await?
                .unwrap_or_else(|| Cart::new_user(user_id))),
        }
    }

    pub(crate) async fn update_quantity(
        &self,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<(), StoreError> {
        match self {
            CartHandle::Guest { store, session_id } => {
                store.update_quantity(session_id, product_id, quantity).await
            }
            CartHandle::User { store, user_id } => {
                store.update_quantity(user_id, product_id, quantity).await
            }
        }
    }

    pub(crate) async fn remove_item(&self, product_id: &ProductId) -> Result<(), StoreError> {
        match self {
            CartHandle::Guest { store, session_id } => {
                store.remove_item(session_id, product_id).await
            }
            CartHandle::User { store, user_id } => store.remove_item(user_id, product_id).await,
        }
    }

    /// Empties the cart. Guest carts are deleted outright.
    pub(crate) async fn clear(&self) -> Result<(), StoreError> {
        match self {
            CartHandle::Guest { store, session_id } => store.delete(session_id).await,
            CartHandle::User { store, user_id } => store.clear(user_id).await,
        }
    }
}
