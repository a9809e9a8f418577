//! Administrative order routes.
//!
//! All handlers require the admin role.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tracing::instrument;

use edubook_core::{OrderId, OrderStatus};

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Order, OrderDetail, StoreStats};
use crate::services::PaymentGateway;
use crate::state::AppState;

/// Status update form data.
#[derive(Debug, Deserialize)]
pub struct StatusUpdateInput {
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Every order in the store, newest first.
#[instrument(skip(state, admin), fields(user_id = %admin.id))]
pub async fn orders<S: Store, P: PaymentGateway>(
    State(state): State<AppState<S, P>>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Json<Vec<OrderDetail>>> {
    let orders = state.orders().list_orders(&admin).await?;
    Ok(Json(orders))
}

/// Move an order along its lifecycle.
#[instrument(skip(state, admin, input), fields(user_id = %admin.id, status = %input.status))]
pub async fn update_status<S: Store, P: PaymentGateway>(
    State(state): State<AppState<S, P>>,
    RequireAdmin(admin): RequireAdmin,
    Path(order_id): Path<OrderId>,
    Json(input): Json<StatusUpdateInput>,
) -> Result<Json<Order>> {
    let status = input
        .status
        .parse::<OrderStatus>()
        .map_err(AppError::Validation)?;
    let reason = input
        .reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    let order = state
        .orders()
        .update_order_status(&admin, order_id, status, reason)
        .await?;
    Ok(Json(order))
}

/// Dashboard counters.
#[instrument(skip(state, admin), fields(user_id = %admin.id))]
pub async fn stats<S: Store, P: PaymentGateway>(
    State(state): State<AppState<S, P>>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<Json<StoreStats>> {
    let stats = state.orders().stats(&admin).await?;
    Ok(Json(stats))
}
