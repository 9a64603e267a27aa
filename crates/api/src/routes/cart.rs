//! Cart and checkout endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::CheckoutOutcome;
use common::{OrderId, ProductId, UserId};
use domain::Cart;
use serde::{Deserialize, Serialize};
use service::CartService;
use store::{CacheClient, ProductLookup, TransactionManager, UserCartStore};

use crate::error::ApiError;
use crate::routes::identity::Identity;

/// Shared application state accessible from all handlers.
pub struct AppState<D, C, U>
where
    D: TransactionManager + ProductLookup,
    C: CacheClient,
    U: UserCartStore,
{
    pub cart_service: CartService<D, C, U>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

#[derive(Deserialize, Default)]
pub struct CheckoutRequest {
    /// Required for guest checkout: the user the order is placed for.
    pub user_id: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub order_id: OrderId,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup_warning: Option<String>,
}

impl From<CheckoutOutcome> for CheckoutResponse {
    fn from(outcome: CheckoutOutcome) -> Self {
        Self {
            order_id: outcome.result.order_id,
            message: outcome.result.message,
            cleanup_warning: outcome.cleanup.map(|w| w.to_string()),
        }
    }
}

// -- Handlers --

/// GET /cart: the caller's cart, empty if none is stored.
#[tracing::instrument(skip(state))]
pub async fn get<D, C, U>(
    State(state): State<Arc<AppState<D, C, U>>>,
    Identity(owner): Identity,
) -> Result<Json<Cart>, ApiError>
where
    D: TransactionManager + ProductLookup,
    C: CacheClient,
    U: UserCartStore,
{
    let cart = state.cart_service.get_cart(&owner).await?;
    Ok(Json(cart))
}

/// DELETE /cart: empty the caller's cart.
#[tracing::instrument(skip(state))]
pub async fn clear<D, C, U>(
    State(state): State<Arc<AppState<D, C, U>>>,
    Identity(owner): Identity,
) -> Result<StatusCode, ApiError>
where
    D: TransactionManager + ProductLookup,
    C: CacheClient,
    U: UserCartStore,
{
    state.cart_service.clear_cart(&owner).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /cart/items: add a product, returning the updated cart.
#[tracing::instrument(skip(state, req))]
pub async fn add_item<D, C, U>(
    State(state): State<Arc<AppState<D, C, U>>>,
    Identity(owner): Identity,
    Json(req): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<Cart>), ApiError>
where
    D: TransactionManager + ProductLookup,
    C: CacheClient,
    U: UserCartStore,
{
    let product_id = ProductId::new(req.product_id);
    state
        .cart_service
        .add_item(&owner, &product_id, req.quantity)
        .await?;
    let cart = state.cart_service.get_cart(&owner).await?;
    Ok((StatusCode::CREATED, Json(cart)))
}

/// PUT /cart/items/{product_id}: set a line's quantity.
#[tracing::instrument(skip(state, req))]
pub async fn update_item<D, C, U>(
    State(state): State<Arc<AppState<D, C, U>>>,
    Identity(owner): Identity,
    Path(product_id): Path<String>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Json<Cart>, ApiError>
where
    D: TransactionManager + ProductLookup,
    C: CacheClient,
    U: UserCartStore,
{
    let product_id = ProductId::new(product_id);
    state
        .cart_service
        .update_quantity(&owner, &product_id, req.quantity)
        .await?;
    let cart = state.cart_service.get_cart(&owner).await?;
    Ok(Json(cart))
}

/// DELETE /cart/items/{product_id}: remove a line.
#[tracing::instrument(skip(state))]
pub async fn remove_item<D, C, U>(
    State(state): State<Arc<AppState<D, C, U>>>,
    Identity(owner): Identity,
    Path(product_id): Path<String>,
) -> Result<StatusCode, ApiError>
where
    D: TransactionManager + ProductLookup,
    C: CacheClient,
    U: UserCartStore,
{
    state
        .cart_service
        .remove_item(&owner, &ProductId::new(product_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /cart/checkout: turn the caller's cart into an order.
///
/// Guest callers must name the ordering user in the body. A failed cart
/// cleanup after commit is still a success, reported in `cleanup_warning`.
#[tracing::instrument(skip(state, req))]
pub async fn checkout<D, C, U>(
    State(state): State<Arc<AppState<D, C, U>>>,
    Identity(owner): Identity,
    req: Option<Json<CheckoutRequest>>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError>
where
    D: TransactionManager + ProductLookup,
    C: CacheClient,
    U: UserCartStore,
{
    let req = req.map(|Json(req)| req).unwrap_or_default();
    let user_id = req.user_id.map(UserId::new);
    let outcome = state
        .cart_service
        .checkout(&owner, user_id.as_ref())
        .await?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}
