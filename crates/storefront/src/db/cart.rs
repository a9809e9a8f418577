//! Cart persistence for `PostgreSQL`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use edubook_core::{CartLineId, ProductId, Quantity, UserId};

use super::products::ProductRow;
use super::{CartStore, PgStore, RepositoryError, stored_quantity};
use crate::models::{CartItem, CartLine, Product};

/// Cart lines joined with their product, oldest first.
pub(super) const SELECT_CART_LINES: &str = r"
    SELECT c.id AS line_id, c.quantity, c.price AS observed_price,
           p.id, p.name, p.price, p.thumbnail, p.stock, p.is_active
    FROM cart_items c
    JOIN products p ON p.id = c.product_id
    WHERE c.user_id = $1
    ORDER BY c.created_at, c.id
";

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    id: CartLineId,
    user_id: UserId,
    product_id: ProductId,
    quantity: i32,
    price: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = RepositoryError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            product_id: row.product_id,
            quantity: stored_quantity(row.quantity)?,
            observed_price: row.price,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct CartLineRow {
    line_id: CartLineId,
    quantity: i32,
    observed_price: Decimal,
    #[sqlx(flatten)]
    product: ProductRow,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.line_id,
            product: Product::try_from(row.product)?,
            quantity: stored_quantity(row.quantity)?,
            observed_price: row.observed_price,
        })
    }
}

impl CartStore for PgStore {
    async fn principal_exists(&self, user: UserId) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(user)
            .fetch_one(self.pool())
            .await?;
        Ok(exists)
    }

    async fn cart_lines(&self, user: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        sqlx::query_as::<_, CartLineRow>(SELECT_CART_LINES)
            .bind(user)
            .fetch_all(self.pool())
            .await?
            .into_iter()
            .map(CartLine::try_from)
            .collect()
    }

    async fn add_quantity(
        &self,
        user: UserId,
        product: &Product,
        quantity: Quantity,
    ) -> Result<Option<CartItem>, RepositoryError> {
        // The WHERE on the conflict branch skips the update (and returns no
        // row) when the merged quantity would pass the cap.
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            INSERT INTO cart_items (user_id, product_id, quantity, price)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, product_id) DO UPDATE
                SET quantity = cart_items.quantity + EXCLUDED.quantity,
                    price = EXCLUDED.price,
                    updated_at = NOW()
                WHERE cart_items.quantity + EXCLUDED.quantity <= $5
            RETURNING id, user_id, product_id, quantity, price, created_at, updated_at
            ",
        )
        .bind(user)
        .bind(product.id)
        .bind(quantity.as_i32())
        .bind(product.price)
        .bind(i32::from(Quantity::MAX))
        .fetch_optional(self.pool())
        .await?;

        row.map(CartItem::try_from).transpose()
    }

    async fn set_quantity(
        &self,
        user: UserId,
        line: CartLineId,
        quantity: Quantity,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(
            r"
            UPDATE cart_items
            SET quantity = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, product_id, quantity, price, created_at, updated_at
            ",
        )
        .bind(line)
        .bind(user)
        .bind(quantity.as_i32())
        .fetch_optional(self.pool())
        .await?;

        row.map(CartItem::try_from).transpose()
    }

    async fn remove_line(&self, user: UserId, line: CartLineId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
            .bind(line)
            .bind(user)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self, user: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
