//! The cart service facade.

use checkout::{CheckoutOutcome, CheckoutSaga, CheckoutSource};
use common::{CartLimits, ProductId, SessionId, UserId};
use domain::{
    AppError, Cart, CartItem, ErrorCode, Money, require_identifier, validate_item_request,
};
use store::{CacheClient, GuestCartStore, ProductLookup, TransactionManager, UserCartStore};

use crate::owner::{CartHandle, CartOwner};

/// Facade over guest carts, user carts and the checkout saga.
///
/// Every method validates its input before touching a store and returns an
/// [`AppError`] whose code names the failing step.
pub struct CartService<D, C, U>
where
    D: TransactionManager + ProductLookup,
    C: CacheClient,
    U: UserCartStore,
{
    saga: CheckoutSaga<D, C, U>,
    limits: CartLimits,
}

impl<D, C, U> CartService<D, C, U>
where
    D: TransactionManager + ProductLookup,
    C: CacheClient,
    U: UserCartStore,
{
    /// Creates a new cart service around a checkout saga.
    pub fn new(saga: CheckoutSaga<D, C, U>, limits: CartLimits) -> Self {
        Self { saga, limits }
    }

    /// Wires a cart service from its stores, applying `limits.guest_cart_ttl`
    /// to guest carts.
    pub fn from_stores(db: D, cache: C, user_carts: U, limits: CartLimits) -> Self {
        let guest_carts = GuestCartStore::with_ttl(cache, limits.guest_cart_ttl);
        Self::new(CheckoutSaga::new(db, guest_carts, user_carts), limits)
    }

    fn handle<'a>(&'a self, owner: &'a CartOwner) -> CartHandle<'a, C, U> {
        match owner {
            CartOwner::Guest(session_id) => CartHandle::Guest {
                store: self.saga.guest_carts(),
                session_id,
            },
            CartOwner::User(user_id) => CartHandle::User {
                store: self.saga.user_carts(),
                user_id,
            },
        }
    }

    /// Adds `quantity` of a product, snapshotting its current name and price.
    ///
    /// Adding a product already in the cart increases that line's quantity.
    #[tracing::instrument(skip(self, owner), fields(owner = %owner))]
    pub async fn add_item(
        &self,
        owner: &CartOwner,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<(), AppError> {
        validate_item_request(owner.id(), product_id.as_str(), quantity, &self.limits)?;

        let product = self
            .saga
            .database()
            .get_by_id(product_id)
            .await
            .map_err(|e| {
                AppError::wrap(
                    ErrorCode::ProductNotFound,
                    format!("product {product_id} not found"),
                    e,
                )
            })?;

        let price = Money::parse(&product.price).map_err(|e| {
            AppError::wrap(
                ErrorCode::InvalidPrice,
                format!("product {product_id} has invalid price {:?}", product.price),
                e,
            )
        })?;
        if price.is_negative() {
            return Err(AppError::new(
                ErrorCode::InvalidPrice,
                format!("product {product_id} has negative price {price}"),
            ));
        }

        let item = CartItem::new(product_id.clone(), product.name, quantity, price);
        self.handle(owner)
            .add_item(item, self.limits.max_cart_items)
            .await?;

        metrics::counter!("cart_items_added_total", "owner" => owner.kind()).increment(1);
        Ok(())
    }

    /// Returns the owner's cart, empty if none is stored.
    #[tracing::instrument(skip(self, owner), fields(owner = %owner))]
    pub async fn get_cart(&self, owner: &CartOwner) -> Result<Cart, AppError> {
        require_identifier("cart owner id", owner.id())?;
        self.handle(owner)
            .get()
            .await
            .map_err(|e| AppError::wrap(ErrorCode::GetFailed, "failed to get cart", e))
    }

    /// Sets the quantity of a line already in the cart.
    #[tracing::instrument(skip(self, owner), fields(owner = %owner))]
    pub async fn update_quantity(
        &self,
        owner: &CartOwner,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<(), AppError> {
        validate_item_request(owner.id(), product_id.as_str(), quantity, &self.limits)?;
        self.handle(owner)
            .update_quantity(product_id, quantity)
            .await
            .map_err(|e| AppError::wrap(ErrorCode::UpdateFailed, "failed to update quantity", e))
    }

    /// Removes a product's line. Removing an absent product succeeds.
    #[tracing::instrument(skip(self, owner), fields(owner = %owner))]
    pub async fn remove_item(
        &self,
        owner: &CartOwner,
        product_id: &ProductId,
    ) -> Result<(), AppError> {
        require_identifier("cart owner id", owner.id())?;
        require_identifier("product id", product_id.as_str())?;
        self.handle(owner)
            .remove_item(product_id)
            .await
            .map_err(|e| AppError::wrap(ErrorCode::RemoveFailed, "failed to remove item", e))
    }

    /// Empties the owner's cart.
    #[tracing::instrument(skip(self, owner), fields(owner = %owner))]
    pub async fn clear_cart(&self, owner: &CartOwner) -> Result<(), AppError> {
        require_identifier("cart owner id", owner.id())?;
        self.handle(owner)
            .clear()
            .await
            .map_err(|e| AppError::wrap(ErrorCode::ClearFailed, "failed to clear cart", e))
    }

    /// Checks out the owner's cart.
    ///
    /// Guest checkout orders on behalf of `user_id`, which is then required.
    pub async fn checkout(
        &self,
        owner: &CartOwner,
        user_id: Option<&UserId>,
    ) -> Result<CheckoutOutcome, AppError> {
        match owner {
            CartOwner::User(owner_id) => self.checkout_user(owner_id).await,
            CartOwner::Guest(session_id) => {
                let user_id = user_id
                    .ok_or_else(|| AppError::invalid_request("user id is required"))?;
                self.checkout_guest(session_id, user_id).await
            }
        }
    }

    /// Checks out a user's persistent cart.
    #[tracing::instrument(skip(self))]
    pub async fn checkout_user(&self, user_id: &UserId) -> Result<CheckoutOutcome, AppError> {
        require_identifier("user id", user_id.as_str())?;

        let cart = self
            .saga
            .user_carts()
            .get_by_user(user_id)
            .await
            .map_err(|e| AppError::wrap(ErrorCode::GetCartFailed, "failed to get cart", e))?;
        let cart = non_empty(cart)?;

        self.saga
            .execute(&CheckoutSource::User(user_id.clone()), &cart)
            .await
    }

    /// Checks out a guest session's cart on behalf of `user_id`.
    ///
    /// On success the saga has already deleted the guest cart (best effort).
    #[tracing::instrument(skip(self))]
    pub async fn checkout_guest(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> Result<CheckoutOutcome, AppError> {
        require_identifier("session id", session_id.as_str())?;
        require_identifier("user id", user_id.as_str())?;

        let cart = self
            .saga
            .guest_carts()
            .get(session_id)
            .await
            .map_err(|e| AppError::wrap(ErrorCode::GetCartFailed, "failed to get cart", e))?;
        let cart = non_empty(Some(cart))?;

        let source = CheckoutSource::Guest {
            session_id: session_id.clone(),
            user_id: user_id.clone(),
        };
        self.saga.execute(&source, &cart).await
    }
}

fn non_empty(cart: Option<Cart>) -> Result<Cart, AppError> {
    match cart {
        Some(cart) if !cart.is_empty() => Ok(cart),
        _ => Err(AppError::new(ErrorCode::CartEmpty, "cart is empty")),
    }
}
