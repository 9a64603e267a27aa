//! Checkout state machine.

use serde::{Deserialize, Serialize};

/// The state of a checkout in its lifecycle.
///
/// State transitions:
/// ```text
/// Started ──► TxOpen ──► StockValidated ──► OrderCreated ──► ItemsWritten ──► Committed ──► CartCleared
///                │              │                 │                │
///                └──────────────┴─────────────────┴────────────────┴──► RolledBack
/// ```
///
/// `Committed` is a success: a failed cart cleanup leaves the checkout there
/// instead of moving it to `CartCleared`, and never back to `RolledBack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CheckoutState {
    /// Nothing has touched a store yet.
    #[default]
    Started,

    /// A relational transaction is open.
    TxOpen,

    /// Every line passed the read-only stock check.
    StockValidated,

    /// The order header has been written.
    OrderCreated,

    /// Stock has been decremented and every order line written.
    ItemsWritten,

    /// The transaction committed; the order exists.
    Committed,

    /// The source cart was cleared after commit (terminal state).
    CartCleared,

    /// The transaction was rolled back (terminal state).
    RolledBack,
}

impl CheckoutState {
    /// Returns true if `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: CheckoutState) -> bool {
        use CheckoutState::*;
        matches!(
            (self, next),
            (Started, TxOpen)
                | (TxOpen, StockValidated)
                | (StockValidated, OrderCreated)
                | (OrderCreated, ItemsWritten)
                | (ItemsWritten, Committed)
                | (Committed, CartCleared)
                | (TxOpen | StockValidated | OrderCreated | ItemsWritten, RolledBack)
        )
    }

    /// Returns true once the order is durable.
    pub fn is_committed(&self) -> bool {
        matches!(self, CheckoutState::Committed | CheckoutState::CartCleared)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::Started => "Started",
            CheckoutState::TxOpen => "TxOpen",
            CheckoutState::StockValidated => "StockValidated",
            CheckoutState::OrderCreated => "OrderCreated",
            CheckoutState::ItemsWritten => "ItemsWritten",
            CheckoutState::Committed => "Committed",
            CheckoutState::CartCleared => "CartCleared",
            CheckoutState::RolledBack => "RolledBack",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_started() {
        assert_eq!(CheckoutState::default(), CheckoutState::Started);
    }

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            CheckoutState::Started,
            CheckoutState::TxOpen,
            CheckoutState::StockValidated,
            CheckoutState::OrderCreated,
            CheckoutState::ItemsWritten,
            CheckoutState::Committed,
            CheckoutState::CartCleared,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_rollback_only_from_open_transaction() {
        assert!(!CheckoutState::Started.can_transition_to(CheckoutState::RolledBack));
        assert!(CheckoutState::TxOpen.can_transition_to(CheckoutState::RolledBack));
        assert!(CheckoutState::ItemsWritten.can_transition_to(CheckoutState::RolledBack));
        assert!(!CheckoutState::Committed.can_transition_to(CheckoutState::RolledBack));
    }

    #[test]
    fn test_no_skipping_validation() {
        assert!(!CheckoutState::TxOpen.can_transition_to(CheckoutState::OrderCreated));
        assert!(!CheckoutState::StockValidated.can_transition_to(CheckoutState::Committed));
    }

    #[test]
    fn test_committed_states() {
        assert!(CheckoutState::Committed.is_committed());
        assert!(CheckoutState::CartCleared.is_committed());
        assert!(!CheckoutState::ItemsWritten.is_committed());
        assert!(!CheckoutState::RolledBack.is_committed());
    }

    #[test]
    fn test_serialization() {
        let state = CheckoutState::StockValidated;
        let json = serde_json::to_string(&state).unwrap();
        let deserialized: CheckoutState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, deserialized);
    }
}
