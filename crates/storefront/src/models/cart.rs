//! Cart domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use edubook_core::{CartLineId, ProductId, Quantity, UserId};

use super::Product;

/// A stored cart row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: CartLineId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    /// Catalog price when the line was last added to. Informational only.
    pub observed_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cart row joined with the live product it refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: CartLineId,
    pub product: Product,
    pub quantity: Quantity,
    pub observed_price: Decimal,
}

impl CartLine {
    /// Live catalog price of one unit.
    #[must_use]
    pub const fn unit_price(&self) -> Decimal {
        self.product.price
    }

    /// `quantity * live price`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.quantity.times(self.product.price)
    }
}

/// Everything in one principal's cart, priced from the live catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    pub owner: UserId,
    pub lines: Vec<CartLine>,
}

impl CartSnapshot {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of line totals at live prices.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .map(|line| u32::from(line.quantity.get()))
            .sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: i64, price: i64, observed: i64, qty: i64) -> CartLine {
        CartLine {
            id: CartLineId::new(id),
            product: Product {
                id: ProductId::new(id),
                name: format!("Book {id}"),
                price: Decimal::new(price, 0),
                thumbnail: None,
                stock: 10,
                is_active: true,
            },
            quantity: Quantity::new(qty).unwrap(),
            observed_price: Decimal::new(observed, 0),
        }
    }

    #[test]
    fn test_total_uses_live_price() {
        let snapshot = CartSnapshot {
            owner: UserId::new(1),
            // Observed prices are stale; totals must ignore them
            lines: vec![line(1, 100_000, 90_000, 2), line(2, 50_000, 1, 1)],
        };
        assert_eq!(snapshot.total(), Decimal::new(250_000, 0));
        assert_eq!(snapshot.item_count(), 3);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = CartSnapshot {
            owner: UserId::new(1),
            lines: Vec::new(),
        };
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.total(), Decimal::ZERO);
    }
}
