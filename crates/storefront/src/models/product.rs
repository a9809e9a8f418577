//! Catalog product as seen by cart and checkout.

use rust_decimal::Decimal;
use serde::Serialize;

use edubook_core::ProductId;

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Current catalog price, never negative.
    pub price: Decimal,
    pub thumbnail: Option<String>,
    pub stock: i32,
    /// Inactive products cannot be added to a cart.
    pub is_active: bool,
}
