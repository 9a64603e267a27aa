//! Checkout saga for cart-based ordering.
//!
//! This crate turns a guest or user cart into a committed order:
//!
//! 1. **Validate**: every line is checked against stock inside the
//!    transaction before anything is written
//! 2. **Write**: the order header, stock decrements and order lines
//! 3. **Commit**, or roll back on the first failure
//! 4. **Clean up**: the source cart is cleared; failures here are reported
//!    as a [`CleanupWarning`], never as a failed checkout
//!
//! The saga's progress is tracked as a [`CheckoutState`].

pub mod outcome;
pub mod saga;
pub mod state;

pub use outcome::{
    CHECKOUT_MESSAGE, CartKind, CheckoutOutcome, CheckoutResult, CheckoutSource, CleanupFailure,
    CleanupWarning,
};
pub use saga::CheckoutSaga;
pub use state::CheckoutState;
