//! Domain layer for cart checkout.
//!
//! This crate provides the types shared by the cart stores, the checkout
//! saga and the cart service:
//! - `Cart` and `CartItem`, the document stored for guests and users
//! - `Money`, decimal amounts with fixed two-decimal formatting
//! - the quantity guard and `safe_i32` conversion
//! - order records written inside the checkout transaction
//! - `AppError`, the typed error carrying a stable `ErrorCode`

pub mod cart;
pub mod error;
pub mod guard;
pub mod money;
pub mod order;

pub use cart::{Cart, CartItem};
pub use error::{AppError, BoxError, ErrorCode};
pub use guard::{require_identifier, safe_i32, validate_item_request, validate_quantity};
pub use money::Money;
pub use order::{NewOrder, NewOrderItem, OrderStatus, Product};
