//! Order route handlers for customers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::instrument;

use edubook_core::OrderId;

use crate::db::Store;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{OrderDetail, ShippingForm};
use crate::services::{CheckoutReceipt, PaymentGateway};
use crate::state::AppState;

/// A freshly created order and the secret the client confirms payment with.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    pub order: OrderDetail,
    pub client_secret: String,
}

impl From<CheckoutReceipt> for CheckoutView {
    fn from(receipt: CheckoutReceipt) -> Self {
        Self {
            client_secret: receipt.client_secret.expose_secret().to_owned(),
            order: receipt.order,
        }
    }
}

/// Check out the principal's cart.
#[instrument(skip(state, principal, form), fields(user_id = %principal.id))]
pub async fn create<S: Store, P: PaymentGateway>(
    State(state): State<AppState<S, P>>,
    RequireAuth(principal): RequireAuth,
    Json(form): Json<ShippingForm>,
) -> Result<(StatusCode, Json<CheckoutView>)> {
    let receipt = state.checkout().create_order(&principal, form).await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

/// The principal's own orders, newest first.
#[instrument(skip(state, principal), fields(user_id = %principal.id))]
pub async fn index<S: Store, P: PaymentGateway>(
    State(state): State<AppState<S, P>>,
    RequireAuth(principal): RequireAuth,
) -> Result<Json<Vec<OrderDetail>>> {
    let orders = state.orders().list_orders(&principal.as_customer()).await?;
    Ok(Json(orders))
}

/// One order, if the principal owns it or is an admin.
#[instrument(skip(state, principal), fields(user_id = %principal.id))]
pub async fn show<S: Store, P: PaymentGateway>(
    State(state): State<AppState<S, P>>,
    RequireAuth(principal): RequireAuth,
    Path(order_id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    let order = state.orders().get_order(&principal, order_id).await?;
    Ok(Json(order))
}
