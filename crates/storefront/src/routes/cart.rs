//! Cart route handlers.
//!
//! Every handler acts on the authenticated principal's own cart. Prices in
//! the view are live catalog prices; `observedPrice` is what the product cost
//! when the line was last written.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use edubook_core::{CartLineId, ProductId};

use crate::db::Store;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{CartItem, CartLine, CartSnapshot};
use crate::services::PaymentGateway;
use crate::state::AppState;

/// One cart line as returned to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineView {
    #[serde(flatten)]
    pub line: CartLine,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Cart display data.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub total: Decimal,
    pub item_count: u32,
}

impl From<CartSnapshot> for CartView {
    fn from(snapshot: CartSnapshot) -> Self {
        let total = snapshot.total();
        let item_count = snapshot.item_count();
        let items = snapshot
            .lines
            .into_iter()
            .map(|line| CartLineView {
                unit_price: line.unit_price(),
                line_total: line.line_total(),
                line,
            })
            .collect();
        Self {
            items,
            total,
            item_count,
        }
    }
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartInput {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

const fn default_quantity() -> i64 {
    1
}

/// Update quantity form data.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityInput {
    pub quantity: i64,
}

/// Response to clearing the cart.
#[derive(Debug, Serialize)]
pub struct ClearedView {
    pub removed: u64,
}

/// Show the cart.
#[instrument(skip(state, principal), fields(user_id = %principal.id))]
pub async fn show<S: Store, P: PaymentGateway>(
    State(state): State<AppState<S, P>>,
    RequireAuth(principal): RequireAuth,
) -> Result<Json<CartView>> {
    let snapshot = state.cart().snapshot(&principal).await?;
    Ok(Json(snapshot.into()))
}

/// Add item to cart, merging with an existing line for the same product.
#[instrument(skip(state, principal), fields(user_id = %principal.id))]
pub async fn add<S: Store, P: PaymentGateway>(
    State(state): State<AppState<S, P>>,
    RequireAuth(principal): RequireAuth,
    Json(input): Json<AddToCartInput>,
) -> Result<(StatusCode, Json<CartItem>)> {
    let item = state
        .cart()
        .add_item(&principal, input.product_id, input.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Set the quantity of one line.
#[instrument(skip(state, principal), fields(user_id = %principal.id))]
pub async fn update<S: Store, P: PaymentGateway>(
    State(state): State<AppState<S, P>>,
    RequireAuth(principal): RequireAuth,
    Path(line_id): Path<CartLineId>,
    Json(input): Json<UpdateQuantityInput>,
) -> Result<Json<CartItem>> {
    let item = state
        .cart()
        .update_quantity(&principal, line_id, input.quantity)
        .await?;
    Ok(Json(item))
}

/// Remove one line.
#[instrument(skip(state, principal), fields(user_id = %principal.id))]
pub async fn remove<S: Store, P: PaymentGateway>(
    State(state): State<AppState<S, P>>,
    RequireAuth(principal): RequireAuth,
    Path(line_id): Path<CartLineId>,
) -> Result<StatusCode> {
    state.cart().remove_item(&principal, line_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Empty the cart.
#[instrument(skip(state, principal), fields(user_id = %principal.id))]
pub async fn clear<S: Store, P: PaymentGateway>(
    State(state): State<AppState<S, P>>,
    RequireAuth(principal): RequireAuth,
) -> Result<Json<ClearedView>> {
    let removed = state.cart().clear(&principal).await?;
    Ok(Json(ClearedView { removed }))
}
