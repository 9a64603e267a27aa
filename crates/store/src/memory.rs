use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{ProductId, UserId};
use domain::{Cart, CartItem, NewOrder, NewOrderItem, Product};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::{
    Result, StoreError,
    store::{CacheClient, OrderWriter, ProductLookup, Transaction, TransactionManager, UserCartStore},
};

fn injected(what: &str) -> StoreError {
    StoreError::Unavailable(format!("injected failure: {what}"))
}

fn shifted_stock(product_id: &ProductId, stock: i32, delta: i64) -> Result<i32> {
    i64::from(stock)
        .checked_add(delta)
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| StoreError::StockOutOfRange(product_id.clone()))
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, (String, Instant)>,
    writes: usize,
    fail_on_get: bool,
    fail_on_set: bool,
    fail_on_delete: bool,
}

impl CacheState {
    fn evict_expired(&mut self, now: Instant) {
        self.entries.retain(|_, (_, expires_at)| *expires_at > now);
    }
}

/// In-memory cache for tests and single-node use.
///
/// An expired key is dropped when it is read, and every `set` sweeps all
/// expired entries so abandoned keys do not accumulate. Expiry is measured
/// with `tokio::time`, so tests can pause and advance the clock.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    state: Arc<RwLock<CacheState>>,
}

impl InMemoryCache {
    /// Creates a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the cache to fail every read.
    pub async fn set_fail_on_get(&self, fail: bool) {
        self.state.write().await.fail_on_get = fail;
    }

    /// Configures the cache to fail every write.
    pub async fn set_fail_on_set(&self, fail: bool) {
        self.state.write().await.fail_on_set = fail;
    }

    /// Configures the cache to fail every delete.
    pub async fn set_fail_on_delete(&self, fail: bool) {
        self.state.write().await.fail_on_delete = fail;
    }

    /// Returns the number of successful `set` calls.
    pub async fn write_count(&self) -> usize {
        self.state.read().await.writes
    }

    /// Returns true if an unexpired entry exists for `key`.
    pub async fn contains_key(&self, key: &str) -> bool {
        self.remaining_ttl(key).await.is_some()
    }

    /// Returns the number of stored entries, expired or not.
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    /// Returns true if no entries are stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops every entry whose TTL has elapsed.
    pub async fn evict_expired(&self) {
        self.state.write().await.evict_expired(Instant::now());
    }

    /// Returns the time left before `key` expires.
    pub async fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        let state = self.state.read().await;
        let (_, expires_at) = state.entries.get(key)?;
        expires_at.checked_duration_since(Instant::now())
    }
}

#[async_trait]
impl CacheClient for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut state = self.state.write().await;
        if state.fail_on_get {
            return Err(injected("cache get"));
        }

        let expired = match state.entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => {
                return Ok(Some(value.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            state.entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_set {
            return Err(injected("cache set"));
        }
        let now = Instant::now();
        state.evict_expired(now);
        state.entries.insert(key.to_string(), (value, now + ttl));
        state.writes += 1;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_delete {
            return Err(injected("cache delete"));
        }
        state.entries.remove(key);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct UserCartState {
    carts: HashMap<UserId, Cart>,
    fail: bool,
}

/// In-memory user cart document store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserCartStore {
    state: Arc<RwLock<UserCartState>>,
}

impl InMemoryUserCartStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to fail every operation.
    pub async fn set_fail(&self, fail: bool) {
        self.state.write().await.fail = fail;
    }

    /// Returns the number of stored cart documents.
    pub async fn cart_count(&self) -> usize {
        self.state.read().await.carts.len()
    }

    async fn modify<F>(&self, user_id: &UserId, create: bool, f: F) -> Result<()>
    where
        F: FnOnce(&mut Cart) -> Result<()> + Send,
    {
        let mut state = self.state.write().await;
        if state.fail {
            return Err(injected("user cart store"));
        }
        if create {
            let cart = state
                .carts
                .entry(user_id.clone())
                .or_insert_with(|| Cart::new_user(user_id));
            return f(cart);
        }
        match state.carts.get_mut(user_id) {
            Some(cart) => f(cart),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl UserCartStore for InMemoryUserCartStore {
    async fn add_item(&self, user_id: &UserId, item: CartItem) -> Result<()> {
        self.modify(user_id, true, |cart| {
            cart.merge_item(item);
            Ok(())
        })
        .await
    }

    async fn get_by_user(&self, user_id: &UserId) -> Result<Option<Cart>> {
        let state = self.state.read().await;
        if state.fail {
            return Err(injected("user cart store"));
        }
        Ok(state.carts.get(user_id).cloned())
    }

    async fn update_quantity(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<()> {
        let mut found = false;
        self.modify(user_id, false, |cart| {
            found = cart.set_quantity(product_id, quantity);
            Ok(())
        })
        .await?;
        if !found {
            return Err(StoreError::ItemNotFound {
                product_id: product_id.clone(),
            });
        }
        Ok(())
    }

    async fn remove_item(&self, user_id: &UserId, product_id: &ProductId) -> Result<()> {
        self.modify(user_id, false, |cart| {
            cart.remove_item(product_id);
            Ok(())
        })
        .await
    }

    async fn clear(&self, user_id: &UserId) -> Result<()> {
        self.modify(user_id, false, |cart| {
            cart.clear();
            Ok(())
        })
        .await
    }
}

/// A step of the relational store that can be made to fail in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Begin,
    Lookup,
    AdjustStock,
    CreateOrder,
    CreateOrderItem,
    Commit,
}

#[derive(Debug, Default)]
struct DatabaseState {
    products: HashMap<ProductId, Product>,
    orders: Vec<NewOrder>,
    order_items: Vec<NewOrderItem>,
    faults: HashSet<FailPoint>,
    lookups: usize,
    commits: usize,
    rollbacks: usize,
}

impl DatabaseState {
    fn check(&self, point: FailPoint) -> Result<()> {
        if self.faults.contains(&point) {
            return Err(injected(&format!("{point:?}")));
        }
        Ok(())
    }
}

/// In-memory relational store: products, orders and order lines.
///
/// Transactions journal their writes and apply them at commit. Stock
/// changes are applied as deltas against the live row at that moment, with
/// no locking between the stock check and the commit, so two concurrent
/// checkouts of the last unit can both succeed and drive stock negative.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDatabase {
    state: Arc<RwLock<DatabaseState>>,
}

impl InMemoryDatabase {
    /// Creates a new empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a product row.
    pub async fn insert_product(&self, product: Product) {
        self.state
            .write()
            .await
            .products
            .insert(product.id.clone(), product);
    }

    /// Returns the committed stock of a product.
    pub async fn stock(&self, product_id: &ProductId) -> Option<i32> {
        self.state
            .read()
            .await
            .products
            .get(product_id)
            .map(|p| p.stock)
    }

    /// Returns every committed order header.
    pub async fn orders(&self) -> Vec<NewOrder> {
        self.state.read().await.orders.clone()
    }

    /// Returns every committed order line.
    pub async fn order_items(&self) -> Vec<NewOrderItem> {
        self.state.read().await.order_items.clone()
    }

    /// Makes a step fail (or stop failing).
    pub async fn set_failure(&self, point: FailPoint, fail: bool) {
        let mut state = self.state.write().await;
        if fail {
            state.faults.insert(point);
        } else {
            state.faults.remove(&point);
        }
    }

    /// Returns the number of product reads, inside or outside transactions.
    pub async fn lookup_count(&self) -> usize {
        self.state.read().await.lookups
    }

    /// Returns the number of committed transactions.
    pub async fn commit_count(&self) -> usize {
        self.state.read().await.commits
    }

    /// Returns the number of explicitly rolled back or failed-commit
    /// transactions.
    pub async fn rollback_count(&self) -> usize {
        self.state.read().await.rollbacks
    }
}

#[async_trait]
impl ProductLookup for InMemoryDatabase {
    async fn get_by_id(&self, product_id: &ProductId) -> Result<Product> {
        let mut state = self.state.write().await;
        state.lookups += 1;
        state.check(FailPoint::Lookup)?;
        state
            .products
            .get(product_id)
            .cloned()
            .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))
    }

    async fn adjust_stock(&self, product_id: &ProductId, delta: i32) -> Result<()> {
        let mut state = self.state.write().await;
        state.check(FailPoint::AdjustStock)?;
        let product = state
            .products
            .get_mut(product_id)
            .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))?;
        product.stock = shifted_stock(product_id, product.stock, i64::from(delta))?;
        Ok(())
    }
}

#[async_trait]
impl TransactionManager for InMemoryDatabase {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        self.state.read().await.check(FailPoint::Begin)?;
        Ok(InMemoryTransaction {
            state: Arc::clone(&self.state),
            pending: Vec::new(),
        })
    }
}

#[derive(Debug)]
enum PendingWrite {
    Stock { product_id: ProductId, delta: i32 },
    Order(NewOrder),
    OrderItem(NewOrderItem),
}

/// Transaction over an [`InMemoryDatabase`].
#[derive(Debug)]
pub struct InMemoryTransaction {
    state: Arc<RwLock<DatabaseState>>,
    pending: Vec<PendingWrite>,
}

impl InMemoryTransaction {
    fn pending_delta(&self, product_id: &ProductId) -> i64 {
        self.pending
            .iter()
            .map(|w| match w {
                PendingWrite::Stock {
                    product_id: id,
                    delta,
                } if id == product_id => i64::from(*delta),
                _ => 0,
            })
            .sum()
    }
}

#[async_trait]
impl OrderWriter for InMemoryTransaction {
    async fn create_order(&mut self, order: &NewOrder) -> Result<()> {
        self.state.read().await.check(FailPoint::CreateOrder)?;
        self.pending.push(PendingWrite::Order(order.clone()));
        Ok(())
    }

    async fn create_order_item(&mut self, item: &NewOrderItem) -> Result<()> {
        self.state.read().await.check(FailPoint::CreateOrderItem)?;
        self.pending.push(PendingWrite::OrderItem(item.clone()));
        Ok(())
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn get_product(&mut self, product_id: &ProductId) -> Result<Product> {
        let mut product = {
            let mut state = self.state.write().await;
            state.lookups += 1;
            state.check(FailPoint::Lookup)?;
            state
                .products
                .get(product_id)
                .cloned()
                .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))?
        };
        product.stock = shifted_stock(product_id, product.stock, self.pending_delta(product_id))?;
        Ok(product)
    }

    async fn adjust_stock(&mut self, product_id: &ProductId, delta: i32) -> Result<()> {
        {
            let state = self.state.read().await;
            state.check(FailPoint::AdjustStock)?;
            if !state.products.contains_key(product_id) {
                return Err(StoreError::ProductNotFound(product_id.clone()));
            }
        }
        self.pending.push(PendingWrite::Stock {
            product_id: product_id.clone(),
            delta,
        });
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let mut state = self.state.write().await;
        if let Err(e) = state.check(FailPoint::Commit) {
            state.rollbacks += 1;
            return Err(e);
        }

        let mut stock = HashMap::new();
        for write in &self.pending {
            if let PendingWrite::Stock { product_id, delta } = write
                && let Some(product) = state.products.get(product_id)
            {
                let current = *stock.get(product_id).unwrap_or(&product.stock);
                match shifted_stock(product_id, current, i64::from(*delta)) {
                    Ok(next) => {
                        stock.insert(product_id.clone(), next);
                    }
                    Err(e) => {
                        state.rollbacks += 1;
                        return Err(e);
                    }
                }
            }
        }

        for (product_id, next) in stock {
            if let Some(product) = state.products.get_mut(&product_id) {
                product.stock = next;
            }
        }
        for write in self.pending {
            match write {
                PendingWrite::Stock { .. } => {}
                PendingWrite::Order(order) => state.orders.push(order),
                PendingWrite::OrderItem(item) => state.order_items.push(item),
            }
        }
        state.commits += 1;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.state.write().await.rollbacks += 1;
        Ok(())
    }
}
