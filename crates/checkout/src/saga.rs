//! Checkout saga: cart to committed order in one relational transaction.

use chrono::Utc;
use common::{OrderId, ProductId, UserId};
use domain::{AppError, Cart, ErrorCode, Money, NewOrder, NewOrderItem, OrderStatus, safe_i32};
use store::{
    CacheClient, GuestCartStore, OrderWriter, Transaction, TransactionManager, UserCartStore,
};
use uuid::Uuid;

use crate::outcome::{
    CHECKOUT_MESSAGE, CartKind, CheckoutOutcome, CheckoutResult, CheckoutSource, CleanupFailure,
    CleanupWarning,
};
use crate::state::CheckoutState;

/// A cart line that passed the stock check.
struct ValidatedLine {
    product_id: ProductId,
    quantity: i32,
    price: Money,
}

/// Converts a cart into an order.
///
/// Phase one runs inside a single transaction: every line is checked
/// against stock before anything is written, then the order header, the
/// stock decrements and the order lines are written and committed. Any
/// failure rolls the transaction back. Dropping the future mid-flight drops
/// the transaction, which also rolls it back.
///
/// Phase two clears the source cart after commit. It is best effort: a
/// failure there is logged and reported on the outcome, never as an error.
///
/// The stock check takes no row locks, so concurrent checkouts of the same
/// product can both pass it and drive stock negative.
pub struct CheckoutSaga<D, C, U>
where
    D: TransactionManager,
    C: CacheClient,
    U: UserCartStore,
{
    db: D,
    guest_carts: GuestCartStore<C>,
    user_carts: U,
}

impl<D, C, U> CheckoutSaga<D, C, U>
where
    D: TransactionManager,
    C: CacheClient,
    U: UserCartStore,
{
    /// Creates a new checkout saga.
    pub fn new(db: D, guest_carts: GuestCartStore<C>, user_carts: U) -> Self {
        Self {
            db,
            guest_carts,
            user_carts,
        }
    }

    /// Returns the relational store.
    pub fn database(&self) -> &D {
        &self.db
    }

    /// Returns the guest cart repository.
    pub fn guest_carts(&self) -> &GuestCartStore<C> {
        &self.guest_carts
    }

    /// Returns the user cart store.
    pub fn user_carts(&self) -> &U {
        &self.user_carts
    }

    /// Places an order for every line of `cart` on behalf of the source's
    /// user, then clears the source cart.
    #[tracing::instrument(
        skip(self, cart),
        fields(source = source.kind(), user_id = %source.user_id(), items = cart.item_count())
    )]
    pub async fn execute(
        &self,
        source: &CheckoutSource,
        cart: &Cart,
    ) -> Result<CheckoutOutcome, AppError> {
        metrics::counter!("checkout_total").increment(1);
        let started = std::time::Instant::now();

        if cart.is_empty() {
            metrics::counter!("checkout_failed", "code" => ErrorCode::CartEmpty.as_str())
                .increment(1);
            return Err(AppError::new(ErrorCode::CartEmpty, "cart is empty"));
        }

        let mut state = CheckoutState::Started;
        let order_id = match self.place_order(source.user_id(), cart, &mut state).await {
            Ok(order_id) => order_id,
            Err(err) => {
                metrics::histogram!("checkout_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                metrics::counter!("checkout_failed", "code" => err.code().as_str()).increment(1);
                tracing::warn!(code = %err.code(), state = %state, error = %err, "checkout failed");
                return Err(err);
            }
        };

        let cleanup = self.clear_source_cart(source).await;
        if cleanup.is_none() {
            advance(&mut state, CheckoutState::CartCleared);
        }

        let duration = started.elapsed().as_secs_f64();
        metrics::histogram!("checkout_duration_seconds").record(duration);
        metrics::counter!("checkout_succeeded").increment(1);
        tracing::info!(%order_id, duration, "checkout completed");

        Ok(CheckoutOutcome {
            result: CheckoutResult {
                order_id,
                message: CHECKOUT_MESSAGE.to_string(),
            },
            state,
            cleanup,
        })
    }

    /// Phase one. On success the transaction has committed.
    async fn place_order(
        &self,
        user_id: &UserId,
        cart: &Cart,
        state: &mut CheckoutState,
    ) -> Result<OrderId, AppError> {
        let mut tx = self.db.begin().await.map_err(|e| {
            AppError::wrap(ErrorCode::TransactionError, "failed to begin transaction", e)
        })?;
        advance(state, CheckoutState::TxOpen);

        match self.write_order(&mut tx, user_id, cart, state).await {
            Ok(order_id) => {
                if let Err(e) = tx.commit().await {
                    advance(state, CheckoutState::RolledBack);
                    return Err(AppError::wrap(
                        ErrorCode::CommitFailed,
                        "failed to commit transaction",
                        e,
                    ));
                }
                advance(state, CheckoutState::Committed);
                Ok(order_id)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                advance(state, CheckoutState::RolledBack);
                Err(err)
            }
        }
    }

    async fn write_order(
        &self,
        tx: &mut D::Tx,
        user_id: &UserId,
        cart: &Cart,
        state: &mut CheckoutState,
    ) -> Result<OrderId, AppError> {
        let (lines, total) = validate_lines(tx, cart).await?;
        advance(state, CheckoutState::StockValidated);

        let now = Utc::now();
        let order = NewOrder {
            id: OrderId::new(),
            user_id: user_id.clone(),
            total_amount: total.to_fixed_2(),
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        tx.create_order(&order).await.map_err(|e| {
            AppError::wrap(ErrorCode::CreateOrderFailed, "failed to create order", e)
        })?;
        advance(state, CheckoutState::OrderCreated);

        for line in &lines {
            tx.adjust_stock(&line.product_id, -line.quantity)
                .await
                .map_err(|e| {
                    AppError::wrap(
                        ErrorCode::UpdateStockFailed,
                        format!("failed to update stock for product {}", line.product_id),
                        e,
                    )
                })?;

            let item = NewOrderItem {
                id: Uuid::new_v4(),
                order_id: order.id,
                product_id: line.product_id.clone(),
                quantity: line.quantity,
                price: line.price.to_fixed_2(),
                created_at: now,
                updated_at: now,
            };
            tx.create_order_item(&item).await.map_err(|e| {
                AppError::wrap(
                    ErrorCode::CreateOrderItemFailed,
                    format!("failed to create order item for product {}", line.product_id),
                    e,
                )
            })?;
        }
        advance(state, CheckoutState::ItemsWritten);

        Ok(order.id)
    }

    /// Phase two. Returns the failures, if any.
    async fn clear_source_cart(&self, source: &CheckoutSource) -> Option<CleanupWarning> {
        let mut failures = Vec::new();

        if let CheckoutSource::Guest { session_id, .. } = source
            && let Err(error) = self.guest_carts.delete(session_id).await
        {
            failures.push(CleanupFailure {
                cart: CartKind::Guest,
                error,
            });
        }

        if let Err(error) = self.user_carts.clear(source.user_id()).await {
            failures.push(CleanupFailure {
                cart: CartKind::User,
                error,
            });
        }

        if failures.is_empty() {
            return None;
        }

        let warning = CleanupWarning { failures };
        metrics::counter!("checkout_cleanup_failed").increment(1);
        tracing::warn!(warning = %warning, "cart cleanup after checkout failed");
        Some(warning)
    }
}

/// Read-only pass over every line: nothing is written unless all pass.
async fn validate_lines<T: Transaction>(
    tx: &mut T,
    cart: &Cart,
) -> Result<(Vec<ValidatedLine>, Money), AppError> {
    let mut lines = Vec::with_capacity(cart.items.len());
    let mut total = Money::zero();

    for item in &cart.items {
        let quantity = safe_i32(item.quantity)?;
        if quantity <= 0 {
            return Err(AppError::new(
                ErrorCode::InvalidQuantity,
                format!("invalid quantity {} for product {}", quantity, item.product_id),
            ));
        }

        let product = tx.get_product(&item.product_id).await.map_err(|e| {
            AppError::wrap(
                ErrorCode::ProductNotFound,
                format!("product {} not found", item.product_id),
                e,
            )
        })?;

        if product.stock < quantity {
            return Err(AppError::new(
                ErrorCode::InsufficientStock,
                format!(
                    "insufficient stock for product {}: requested {}, available {}",
                    item.product_id, quantity, product.stock
                ),
            ));
        }

        total = item
            .price
            .checked_multiply(quantity)
            .and_then(|line| total.checked_add(line))
            .ok_or_else(|| {
                AppError::new(
                    ErrorCode::InvalidPrice,
                    format!("order total overflows at product {}", item.product_id),
                )
            })?;
        lines.push(ValidatedLine {
            product_id: item.product_id.clone(),
            quantity,
            price: item.price,
        });
    }

    Ok((lines, total))
}

fn advance(state: &mut CheckoutState, next: CheckoutState) {
    debug_assert!(state.can_transition_to(next), "{state} -> {next}");
    tracing::debug!(from = %state, to = %next, "checkout state");
    *state = next;
}

#[cfg(test)]
mod tests {
    use domain::{CartItem, Product};
    use store::{FailPoint, InMemoryCache, InMemoryDatabase, InMemoryUserCartStore, UserCartStore};

    use super::*;

    type TestSaga = CheckoutSaga<InMemoryDatabase, InMemoryCache, InMemoryUserCartStore>;

    struct Harness {
        saga: TestSaga,
        db: InMemoryDatabase,
        cache: InMemoryCache,
        users: InMemoryUserCartStore,
    }

    async fn harness() -> Harness {
        let db = InMemoryDatabase::new();
        let cache = InMemoryCache::new();
        let users = InMemoryUserCartStore::new();
        for (id, price, stock) in [("P1", "10.00", 10), ("P2", "20.00", 5)] {
            db.insert_product(Product {
                id: ProductId::new(id),
                name: format!("Product {id}"),
                price: price.to_string(),
                stock,
            })
            .await;
        }
        let saga = CheckoutSaga::new(
            db.clone(),
            GuestCartStore::new(cache.clone()),
            users.clone(),
        );
        Harness {
            saga,
            db,
            cache,
            users,
        }
    }

    fn user() -> UserId {
        UserId::new("u-1")
    }

    fn two_line_cart() -> Cart {
        let mut cart = Cart::new_user(&user());
        cart.merge_item(CartItem::new("P1", "Product P1", 2, Money::from_cents(1000)));
        cart.merge_item(CartItem::new("P2", "Product P2", 1, Money::from_cents(2000)));
        cart
    }

    #[tokio::test]
    async fn test_two_line_order_totals_and_decrements() {
        let h = harness().await;

        let outcome = h
            .saga
            .execute(&CheckoutSource::User(user()), &two_line_cart())
            .await
            .unwrap();

        assert_eq!(outcome.result.message, CHECKOUT_MESSAGE);
        assert_eq!(outcome.state, CheckoutState::CartCleared);
        assert!(outcome.cart_cleared());

        let orders = h.db.orders().await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, outcome.order_id());
        assert_eq!(orders[0].total_amount, "40.00");
        assert_eq!(orders[0].status, OrderStatus::Pending);

        let items = h.db.order_items().await;
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.order_id == outcome.order_id()));
        assert_eq!(items[0].price, "10.00");
        assert_eq!(items[1].quantity, 1);

        assert_eq!(h.db.stock(&ProductId::new("P1")).await, Some(8));
        assert_eq!(h.db.stock(&ProductId::new("P2")).await, Some(4));
    }

    #[tokio::test]
    async fn test_insufficient_stock_writes_nothing() {
        let h = harness().await;
        let mut cart = two_line_cart();
        cart.merge_item(CartItem::new("P2", "Product P2", 9, Money::from_cents(2000)));

        let err = h
            .saga
            .execute(&CheckoutSource::User(user()), &cart)
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::InsufficientStock);
        assert!(h.db.orders().await.is_empty());
        assert!(h.db.order_items().await.is_empty());
        assert_eq!(h.db.stock(&ProductId::new("P1")).await, Some(10));
        assert_eq!(h.db.stock(&ProductId::new("P2")).await, Some(5));
        assert_eq!(h.db.rollback_count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let h = harness().await;
        let mut cart = Cart::new_user(&user());
        cart.merge_item(CartItem::new("P404", "Ghost", 1, Money::from_cents(100)));

        let err = h
            .saga
            .execute(&CheckoutSource::User(user()), &cart)
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::ProductNotFound);
        assert!(h.db.orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_quantity_beyond_i32_is_rejected_before_lookup() {
        let h = harness().await;
        let mut cart = Cart::new_user(&user());
        cart.merge_item(CartItem::new("P1", "Product P1", 1 << 31, Money::from_cents(1000)));

        let err = h
            .saga
            .execute(&CheckoutSource::User(user()), &cart)
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::InvalidQuantity);
        assert_eq!(h.db.lookup_count().await, 0);
    }

    #[tokio::test]
    async fn test_total_overflow_rolls_back_instead_of_panicking() {
        let h = harness().await;
        let huge = Money::parse("79228162514264337593543950335").unwrap();
        let mut cart = Cart::new_user(&user());
        cart.merge_item(CartItem::new("P1", "Product P1", 2, huge));

        let err = h
            .saga
            .execute(&CheckoutSource::User(user()), &cart)
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::InvalidPrice);
        assert!(h.db.orders().await.is_empty());
        assert_eq!(h.db.stock(&ProductId::new("P1")).await, Some(10));
        assert_eq!(h.db.rollback_count().await, 1);
    }

    #[tokio::test]
    async fn test_empty_cart() {
        let h = harness().await;
        let err = h
            .saga
            .execute(&CheckoutSource::User(user()), &Cart::new_user(&user()))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::CartEmpty);
        assert_eq!(h.db.commit_count().await, 0);
    }

    #[tokio::test]
    async fn test_each_failing_step_maps_to_its_code() {
        let cases = [
            (FailPoint::Begin, ErrorCode::TransactionError),
            (FailPoint::Lookup, ErrorCode::ProductNotFound),
            (FailPoint::CreateOrder, ErrorCode::CreateOrderFailed),
            (FailPoint::AdjustStock, ErrorCode::UpdateStockFailed),
            (FailPoint::CreateOrderItem, ErrorCode::CreateOrderItemFailed),
            (FailPoint::Commit, ErrorCode::CommitFailed),
        ];

        for (point, code) in cases {
            let h = harness().await;
            h.db.set_failure(point, true).await;

            let err = h
                .saga
                .execute(&CheckoutSource::User(user()), &two_line_cart())
                .await
                .unwrap_err();

            assert_eq!(err.code(), code, "{point:?}");
            assert!(err.cause().is_some(), "{point:?}");
            assert!(h.db.orders().await.is_empty(), "{point:?}");
            assert!(h.db.order_items().await.is_empty(), "{point:?}");
            assert_eq!(h.db.stock(&ProductId::new("P1")).await, Some(10));
        }
    }

    #[tokio::test]
    async fn test_guest_checkout_clears_both_carts() {
        let h = harness().await;
        let session = common::SessionId::new("sess-1");
        let guest_store = GuestCartStore::new(h.cache.clone());
        let mut cart = Cart::new_guest(&session);
        cart.merge_item(CartItem::new("P1", "Product P1", 1, Money::from_cents(1000)));
        guest_store.save(&session, &cart).await.unwrap();
        h.users
            .add_item(
                &user(),
                CartItem::new("P2", "Product P2", 1, Money::from_cents(2000)),
            )
            .await
            .unwrap();

        let source = CheckoutSource::Guest {
            session_id: session.clone(),
            user_id: user(),
        };
        let outcome = h.saga.execute(&source, &cart).await.unwrap();

        assert!(outcome.cart_cleared());
        assert!(!h.cache.contains_key("guest_cart:sess-1").await);
        assert!(h.users.get_by_user(&user()).await.unwrap().unwrap().is_empty());
        assert_eq!(h.db.orders().await[0].user_id, user());
    }

    #[tokio::test]
    async fn test_cleanup_failure_still_succeeds() {
        let h = harness().await;
        h.users.set_fail(true).await;

        let outcome = h
            .saga
            .execute(&CheckoutSource::User(user()), &two_line_cart())
            .await
            .unwrap();

        assert!(!outcome.order_id().to_string().is_empty());
        assert_eq!(outcome.state, CheckoutState::Committed);
        let warning = outcome.cleanup.unwrap();
        assert_eq!(warning.failures.len(), 1);
        assert_eq!(warning.failures[0].cart, CartKind::User);
        assert_eq!(h.db.commit_count().await, 1);
        assert_eq!(h.db.rollback_count().await, 0);
    }

    #[tokio::test]
    async fn test_guest_cleanup_reports_each_failed_cart() {
        let h = harness().await;
        h.cache.set_fail_on_delete(true).await;
        h.users.set_fail(true).await;
        let source = CheckoutSource::Guest {
            session_id: common::SessionId::new("sess-1"),
            user_id: user(),
        };

        let outcome = h.saga.execute(&source, &two_line_cart()).await.unwrap();

        let carts: Vec<CartKind> = outcome
            .cleanup
            .unwrap()
            .failures
            .iter()
            .map(|f| f.cart)
            .collect();
        assert_eq!(carts, vec![CartKind::Guest, CartKind::User]);
        assert_eq!(h.db.orders().await.len(), 1);
    }
}
