//! Backing stores for carts, the product catalog and orders.
//!
//! Each store is a capability trait with an in-memory implementation for
//! tests and single-node runs, and a PostgreSQL implementation.

pub mod error;
pub mod guest;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::{ProductId, SessionId, UserId};
pub use error::{Result, StoreError};
pub use guest::{GUEST_CART_KEY_PREFIX, GuestCartStore};
pub use memory::{
    FailPoint, InMemoryCache, InMemoryDatabase, InMemoryTransaction, InMemoryUserCartStore,
};
pub use postgres::{PgDatabase, PgTransaction, PgUserCartStore};
pub use store::{
    CacheClient, OrderWriter, ProductLookup, Transaction, TransactionManager, UserCartStore,
};
