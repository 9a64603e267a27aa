use std::time::Duration;

use async_trait::async_trait;
use common::{ProductId, UserId};
use domain::{Cart, CartItem, NewOrder, NewOrderItem, Product};

use crate::Result;

/// Key/value cache with per-key expiry, the backing store of guest carts.
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait CacheClient: Send + Sync {
    /// Returns the value for `key`, or `None` if it is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value and
    /// resetting its expiry to `ttl` from now.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Removes `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Document store holding one cart document per user.
///
/// Each operation is a single call against the store; read-modify-write
/// atomicity within a document is the implementation's responsibility.
#[async_trait]
pub trait UserCartStore: Send + Sync {
    /// Adds a line to the user's cart, creating the cart if needed and
    /// merging quantities on a duplicate product.
    async fn add_item(&self, user_id: &UserId, item: CartItem) -> Result<()>;

    /// Returns the user's cart, or `None` if the user has never had one.
    async fn get_by_user(&self, user_id: &UserId) -> Result<Option<Cart>>;

    /// Sets the quantity of an existing line.
    ///
    /// Fails with `ItemNotFound` if the cart has no line for the product.
    async fn update_quantity(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<()>;

    /// Removes the line for a product. Absent products are ignored.
    async fn remove_item(&self, user_id: &UserId, product_id: &ProductId) -> Result<()>;

    /// Removes every line from the user's cart.
    async fn clear(&self, user_id: &UserId) -> Result<()>;
}

/// Non-transactional access to the product catalog.
#[async_trait]
pub trait ProductLookup: Send + Sync {
    /// Fetches current price, name and stock for a product.
    async fn get_by_id(&self, product_id: &ProductId) -> Result<Product>;

    /// Applies a signed delta to the product's stock.
    async fn adjust_stock(&self, product_id: &ProductId, delta: i32) -> Result<()>;
}

/// Writes order header and order line rows.
#[async_trait]
pub trait OrderWriter: Send {
    /// Inserts the order header.
    async fn create_order(&mut self, order: &NewOrder) -> Result<()>;

    /// Inserts one order line.
    async fn create_order_item(&mut self, item: &NewOrderItem) -> Result<()>;
}

/// A relational unit of work spanning stock updates and order writes.
///
/// Dropping a transaction without calling [`commit`](Transaction::commit)
/// discards every write made through it, so a cancelled caller still rolls
/// back. `commit` and `rollback` consume the transaction; rolling back an
/// already-committed transaction cannot be expressed.
#[async_trait]
pub trait Transaction: OrderWriter {
    /// Reads a product as seen by this transaction.
    async fn get_product(&mut self, product_id: &ProductId) -> Result<Product>;

    /// Applies a signed stock delta within this transaction.
    async fn adjust_stock(&mut self, product_id: &ProductId, delta: i32) -> Result<()>;

    /// Makes every write visible. On failure nothing is applied.
    async fn commit(self) -> Result<()>;

    /// Discards every write.
    async fn rollback(self) -> Result<()>;
}

/// Opens relational transactions.
#[async_trait]
pub trait TransactionManager: Send + Sync {
    type Tx: Transaction;

    /// Begins a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;
}
