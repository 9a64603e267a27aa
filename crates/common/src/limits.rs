//! Operator-tunable cart limits.

use std::time::Duration;

/// Largest quantity accepted for a single cart line.
pub const MAX_QUANTITY: i64 = 1000;

/// Largest number of distinct products a guest cart may hold.
pub const MAX_CART_ITEMS: usize = 50;

/// Sliding expiry of a guest cart, reset on every write.
pub const GUEST_CART_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Limits applied by the cart service and the guest cart store.
///
/// Injected at construction time; there is no global mutable copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLimits {
    pub max_quantity: i64,
    pub max_cart_items: usize,
    pub guest_cart_ttl: Duration,
}

impl Default for CartLimits {
    fn default() -> Self {
        Self {
            max_quantity: MAX_QUANTITY,
            max_cart_items: MAX_CART_ITEMS,
            guest_cart_ttl: GUEST_CART_TTL,
        }
    }
}
