//! Checkout inputs and two-phase results.

use common::{OrderId, SessionId, UserId};
use serde::Serialize;
use store::StoreError;

use crate::state::CheckoutState;

/// Message returned with every successful checkout.
pub const CHECKOUT_MESSAGE: &str = "Order created successfully";

/// The cart a checkout was started from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutSource {
    /// An authenticated user's persistent cart.
    User(UserId),
    /// A guest session's cart, ordered on behalf of `user_id`.
    Guest {
        session_id: SessionId,
        user_id: UserId,
    },
}

impl CheckoutSource {
    /// Returns the user the order is written for.
    pub fn user_id(&self) -> &UserId {
        match self {
            CheckoutSource::User(user_id) => user_id,
            CheckoutSource::Guest { user_id, .. } => user_id,
        }
    }

    /// Returns `"user"` or `"guest"`.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckoutSource::User(_) => "user",
            CheckoutSource::Guest { .. } => "guest",
        }
    }
}

/// The committed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutResult {
    pub order_id: OrderId,
    pub message: String,
}

/// Which cart a cleanup failure concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CartKind {
    Guest,
    User,
}

/// One failed post-commit cart clear.
#[derive(Debug)]
pub struct CleanupFailure {
    pub cart: CartKind,
    pub error: StoreError,
}

/// Post-commit cart cleanup that did not fully succeed.
///
/// The order is committed regardless; the source cart may still list the
/// purchased items.
#[derive(Debug)]
pub struct CleanupWarning {
    pub failures: Vec<CleanupFailure>,
}

impl std::fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "order committed but cart cleanup failed")?;
        for failure in &self.failures {
            write!(f, "; {:?} cart: {}", failure.cart, failure.error)?;
        }
        Ok(())
    }
}

/// Result of a successful checkout: the order, plus a warning when the
/// best-effort cart cleanup failed.
#[derive(Debug)]
pub struct CheckoutOutcome {
    pub result: CheckoutResult,
    pub state: CheckoutState,
    pub cleanup: Option<CleanupWarning>,
}

impl CheckoutOutcome {
    /// Returns the committed order's ID.
    pub fn order_id(&self) -> OrderId {
        self.result.order_id
    }

    /// Returns true if the source cart was cleared.
    pub fn cart_cleared(&self) -> bool {
        self.cleanup.is_none()
    }
}
