//! HTTP API server for guest and user carts and checkout.
//!
//! Provides REST endpoints over the cart service facade, with structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use common::{CartLimits, ProductId};
use domain::Product;
use metrics_exporter_prometheus::PrometheusHandle;
use service::CartService;
use store::{
    CacheClient, InMemoryCache, InMemoryDatabase, InMemoryUserCartStore, ProductLookup,
    TransactionManager, UserCartStore,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::cart::AppState;

/// Application state on the in-memory stores.
pub type InMemoryState = AppState<InMemoryDatabase, InMemoryCache, InMemoryUserCartStore>;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<D, C, U>(state: Arc<AppState<D, C, U>>, metrics_handle: PrometheusHandle) -> Router
where
    D: TransactionManager + ProductLookup + 'static,
    C: CacheClient + 'static,
    U: UserCartStore + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/cart",
            get(routes::cart::get::<D, C, U>).delete(routes::cart::clear::<D, C, U>),
        )
        .route("/cart/items", post(routes::cart::add_item::<D, C, U>))
        .route(
            "/cart/items/{product_id}",
            put(routes::cart::update_item::<D, C, U>).delete(routes::cart::remove_item::<D, C, U>),
        )
        .route("/cart/checkout", post(routes::cart::checkout::<D, C, U>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state on in-memory stores.
///
/// Returns the database handle as well so callers can seed products.
pub fn create_in_memory_state(limits: CartLimits) -> (Arc<InMemoryState>, InMemoryDatabase) {
    let db = InMemoryDatabase::new();
    let cart_service = CartService::from_stores(
        db.clone(),
        InMemoryCache::new(),
        InMemoryUserCartStore::new(),
        limits,
    );
    (Arc::new(AppState { cart_service }), db)
}

/// Inserts a small demo catalog into an in-memory database.
pub async fn seed_catalog(db: &InMemoryDatabase) {
    let catalog = [
        ("SKU-001", "Widget", "10.00", 100),
        ("SKU-002", "Gadget", "20.00", 50),
        ("SKU-003", "Gizmo", "4.99", 10),
    ];
    for (id, name, price, stock) in catalog {
        db.insert_product(Product {
            id: ProductId::new(id),
            name: name.to_string(),
            price: price.to_string(),
            stock,
        })
        .await;
    }
}
