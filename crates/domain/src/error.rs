//! Typed application errors with stable machine-readable codes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed underlying cause retained on an [`AppError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Stable error codes surfaced by the cart service and the checkout saga.
///
/// The serialized form (`snake_case`) is part of the external contract and
/// must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    ProductNotFound,
    InvalidPrice,
    CartFull,
    CartEmpty,
    InsufficientStock,
    InvalidQuantity,
    TransactionError,
    CreateOrderFailed,
    UpdateStockFailed,
    CreateOrderItemFailed,
    CommitFailed,
    GetFailed,
    UpdateFailed,
    RemoveFailed,
    ClearFailed,
    AddFailed,
    SaveCartFailed,
    GetCartFailed,
}

impl ErrorCode {
    /// Returns the wire representation of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::ProductNotFound => "product_not_found",
            ErrorCode::InvalidPrice => "invalid_price",
            ErrorCode::CartFull => "cart_full",
            ErrorCode::CartEmpty => "cart_empty",
            ErrorCode::InsufficientStock => "insufficient_stock",
            ErrorCode::InvalidQuantity => "invalid_quantity",
            ErrorCode::TransactionError => "transaction_error",
            ErrorCode::CreateOrderFailed => "create_order_failed",
            ErrorCode::UpdateStockFailed => "update_stock_failed",
            ErrorCode::CreateOrderItemFailed => "create_order_item_failed",
            ErrorCode::CommitFailed => "commit_failed",
            ErrorCode::GetFailed => "get_failed",
            ErrorCode::UpdateFailed => "update_failed",
            ErrorCode::RemoveFailed => "remove_failed",
            ErrorCode::ClearFailed => "clear_failed",
            ErrorCode::AddFailed => "add_failed",
            ErrorCode::SaveCartFailed => "save_cart_failed",
            ErrorCode::GetCartFailed => "get_cart_failed",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned by every operation of the cart service and the checkout
/// saga.
///
/// Carries a stable [`ErrorCode`], a human-readable message and, when a
/// collaborator failed, the original cause (reachable through
/// [`std::error::Error::source`]).
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct AppError {
    code: ErrorCode,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl AppError {
    /// Creates an error without an underlying cause.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error wrapping a collaborator failure.
    pub fn wrap(code: ErrorCode, message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::new(code, message).with_source(source)
    }

    /// Attaches the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Shorthand for an `invalid_request` error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Returns the stable error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the wrapped cause, if any.
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.source.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_code_wire_format_matches_serde() {
        for code in [
            ErrorCode::InvalidRequest,
            ErrorCode::CreateOrderItemFailed,
            ErrorCode::GetCartFailed,
            ErrorCode::InsufficientStock,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }

    #[test]
    fn test_display_includes_code_and_message() {
        let err = AppError::new(ErrorCode::CartEmpty, "cart is empty");
        assert_eq!(err.to_string(), "cart_empty: cart is empty");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_wrapped_cause_is_exposed_as_source() {
        let io = std::io::Error::other("connection reset");
        let err = AppError::wrap(ErrorCode::GetFailed, "failed to get cart", io);
        assert_eq!(err.code(), ErrorCode::GetFailed);
        assert_eq!(err.source().unwrap().to_string(), "connection reset");
        assert_eq!(err.cause().unwrap().to_string(), "connection reset");
    }
}
