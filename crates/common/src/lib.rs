//! Shared identifiers and limits for the cart and checkout crates.

pub mod limits;
pub mod types;

pub use limits::{CartLimits, GUEST_CART_TTL, MAX_CART_ITEMS, MAX_QUANTITY};
pub use types::{OrderId, ProductId, SessionId, UserId};
