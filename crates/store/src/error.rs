use common::ProductId;
use thiserror::Error;

/// Errors that can occur when interacting with a backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The cart has no line for the product.
    #[error("Item not found: {product_id}")]
    ItemNotFound { product_id: ProductId },

    /// The catalog has no such product.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// A stock change would move the count outside the column's range.
    #[error("Stock out of range for product {0}")]
    StockOutOfRange(ProductId),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend could not serve the request.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns true for "no such row/line" conditions.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::ItemNotFound { .. } | StoreError::ProductNotFound(_)
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
