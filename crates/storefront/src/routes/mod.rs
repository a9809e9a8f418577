//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                       - Liveness check
//! GET    /health/ready                 - Readiness check (database ping)
//!
//! # Cart (requires auth)
//! GET    /api/cart                     - Cart with live prices and total
//! POST   /api/cart                     - Add product (merges with existing line)
//! DELETE /api/cart                     - Empty the cart
//! PUT    /api/cart/{id}                - Set line quantity
//! DELETE /api/cart/{id}                - Remove line
//!
//! # Orders (requires auth)
//! POST   /api/orders                   - Check out the cart
//! GET    /api/orders                   - Own orders
//! GET    /api/orders/{id}              - One order (owner or admin)
//!
//! # Admin (requires admin role)
//! GET    /api/admin/orders             - Every order
//! PUT    /api/admin/orders/{id}/status - Status transition
//! GET    /api/admin/stats              - Dashboard counters
//! ```

pub mod admin;
pub mod cart;
pub mod orders;

use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    routing::{get, put},
};
use tower_http::trace::TraceLayer;

use crate::db::Store;
use crate::middleware::request_id_middleware;
use crate::services::PaymentGateway;
use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes<S: Store, P: PaymentGateway>() -> Router<AppState<S, P>> {
    Router::new()
        .route(
            "/",
            get(cart::show::<S, P>)
                .post(cart::add::<S, P>)
                .delete(cart::clear::<S, P>),
        )
        .route(
            "/{id}",
            put(cart::update::<S, P>).delete(cart::remove::<S, P>),
        )
}

/// Create the order routes router.
pub fn order_routes<S: Store, P: PaymentGateway>() -> Router<AppState<S, P>> {
    Router::new()
        .route("/", get(orders::index::<S, P>).post(orders::create::<S, P>))
        .route("/{id}", get(orders::show::<S, P>))
}

/// Create the admin routes router.
pub fn admin_routes<S: Store, P: PaymentGateway>() -> Router<AppState<S, P>> {
    Router::new()
        .route("/orders", get(admin::orders::<S, P>))
        .route("/orders/{id}/status", put(admin::update_status::<S, P>))
        .route("/stats", get(admin::stats::<S, P>))
}

/// Create all routes for the storefront, with request tracing.
pub fn router<S: Store, P: PaymentGateway>(state: AppState<S, P>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness::<S, P>))
        .nest("/api/cart", cart_routes())
        .nest("/api/orders", order_routes())
        .nest("/api/admin", admin_routes())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
                user_id = tracing::field::Empty,
            )
        }))
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness<S: Store, P: PaymentGateway>(State(state): State<AppState<S, P>>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
