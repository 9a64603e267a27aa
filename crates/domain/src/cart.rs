//! Shopping cart document shared by the guest and user cart stores.

use chrono::{DateTime, Utc};
use common::{ProductId, SessionId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, ErrorCode};
use crate::money::Money;

/// A line in a cart.
///
/// `price` and `name` are snapshots taken when the product was added; they
/// are not refreshed at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    /// Stored wide so that out-of-range values persisted by older writers
    /// survive deserialization and are rejected at checkout instead.
    pub quantity: i64,
    pub price: Money,
    pub name: String,
}

impl CartItem {
    /// Creates a new cart line.
    pub fn new(
        product_id: impl Into<ProductId>,
        name: impl Into<String>,
        quantity: i64,
        price: Money,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            price,
            name: name.into(),
        }
    }
}

/// A shopping cart.
///
/// `id` is the session ID for guest carts and the user ID for user carts.
/// Each product appears on at most one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Creates an empty guest cart with current timestamps.
    pub fn new_guest(session_id: &SessionId) -> Self {
        let now = Utc::now();
        Self {
            id: session_id.to_string(),
            user_id: None,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates an empty cart owned by a user.
    pub fn new_user(user_id: &UserId) -> Self {
        let now = Utc::now();
        Self {
            id: user_id.to_string(),
            user_id: Some(user_id.clone()),
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the number of distinct products in the cart.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the product already has a line in the cart.
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.items.iter().any(|i| &i.product_id == product_id)
    }

    /// Adds a line, merging with an existing line for the same product.
    ///
    /// A product new to the cart is rejected with `cart_full` once the cart
    /// holds `max_items` lines; more of an existing product is always accepted.
    pub fn add_item(&mut self, item: CartItem, max_items: usize) -> Result<(), AppError> {
        if !self.contains(&item.product_id) && self.items.len() >= max_items {
            return Err(AppError::new(
                ErrorCode::CartFull,
                format!("cart cannot hold more than {max_items} distinct items"),
            ));
        }
        self.merge_item(item);
        Ok(())
    }

    /// Adds a line without a capacity check, merging quantities on a
    /// duplicate product.
    ///
    /// The merged quantity is not re-capped at the per-request maximum, so a
    /// stored line may exceed it after repeated adds. Checkout converts it
    /// with `safe_i32`, which rejects anything past `i32::MAX`.
    pub fn merge_item(&mut self, item: CartItem) {
        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|i| i.product_id == item.product_id)
        {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
        } else {
            self.items.push(item);
        }
        self.touch();
    }

    /// Sets the quantity of an existing line.
    ///
    /// Returns false, leaving the cart untouched, if no line matches.
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: i64) -> bool {
        match self.items.iter_mut().find(|i| &i.product_id == product_id) {
            Some(item) => {
                item.quantity = quantity;
                self.touch();
                true
            }
            None => false,
        }
    }

    /// Removes the line for a product. Removing an absent product is a no-op.
    pub fn remove_item(&mut self, product_id: &ProductId) {
        self.items.retain(|i| &i.product_id != product_id);
        self.touch();
    }

    /// Removes every line.
    pub fn clear(&mut self) {
        self.items.clear();
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
