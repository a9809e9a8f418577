//! Checkout transaction for `PostgreSQL`.
//!
//! The cart rows are read with `FOR UPDATE`, so a second checkout for the
//! same user blocks on `load_cart` until the first one commits (and then
//! sees an empty cart) or rolls back. Lines inserted after the lock was taken
//! are not covered by it, which is why `clear_cart` deletes by id.

use sqlx::{Acquire, Postgres, Transaction};

use edubook_core::{CartLineId, OrderId, UserId};

use super::cart::{CartLineRow, SELECT_CART_LINES};
use super::orders::{OrderItemRow, OrderRow};
use super::{CheckoutStore, CheckoutTx, PgStore, RepositoryError, conflict_on_unique};
use crate::models::{CartLine, NewOrder, NewOrderItem, Order, OrderItem};

/// An open checkout transaction. Rolls back on drop.
pub struct PgCheckoutTx {
    tx: Transaction<'static, Postgres>,
}

impl CheckoutStore for PgStore {
    type Tx = PgCheckoutTx;

    async fn begin(&self) -> Result<PgCheckoutTx, RepositoryError> {
        let tx = self.pool().begin().await?;
        Ok(PgCheckoutTx { tx })
    }
}

impl CheckoutTx for PgCheckoutTx {
    async fn load_cart(&mut self, user: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let sql = format!("{SELECT_CART_LINES} FOR UPDATE OF c");
        sqlx::query_as::<_, CartLineRow>(&sql)
            .bind(user)
            .fetch_all(&mut *self.tx)
            .await?
            .into_iter()
            .map(CartLine::try_from)
            .collect()
    }

    async fn save_order(&mut self, order: &NewOrder) -> Result<Order, RepositoryError> {
        // Savepoint, so an order number collision leaves the outer transaction usable.
        let mut savepoint = Acquire::begin(&mut self.tx).await?;
        let shipping = &order.shipping;
        let row = sqlx::query_as::<_, OrderRow>(concat!(
            r"
            INSERT INTO orders (
                order_number, user_id, payment_method,
                subtotal, shipping_fee, discount, total,
                shipping_name, shipping_phone, shipping_email, shipping_address,
                shipping_city, shipping_district, shipping_ward, note
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING ",
            order_columns!()
        ))
        .bind(&order.order_number)
        .bind(order.user_id)
        .bind(order.payment_method)
        .bind(order.totals.subtotal())
        .bind(order.totals.shipping_fee())
        .bind(order.totals.discount())
        .bind(order.totals.total())
        .bind(&shipping.shipping_name)
        .bind(&shipping.shipping_phone)
        .bind(shipping.shipping_email.as_deref())
        .bind(&shipping.shipping_address)
        .bind(shipping.shipping_city.as_deref())
        .bind(shipping.shipping_district.as_deref())
        .bind(shipping.shipping_ward.as_deref())
        .bind(shipping.note.as_deref())
        .fetch_one(&mut *savepoint)
        .await
        .map_err(|e| conflict_on_unique(e, "order number"))?;
        savepoint.commit().await?;

        Order::try_from(row)
    }

    async fn save_order_items(
        &mut self,
        order: OrderId,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>, RepositoryError> {
        let mut saved = Vec::with_capacity(items.len());
        for item in items {
            let row = sqlx::query_as::<_, OrderItemRow>(concat!(
                r"
                INSERT INTO order_items
                    (order_id, product_id, product_name, product_thumbnail, price, quantity)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING ",
                order_item_columns!()
            ))
            .bind(order)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(item.product_thumbnail.as_deref())
            .bind(item.price)
            .bind(item.quantity.as_i32())
            .fetch_one(&mut *self.tx)
            .await?;
            saved.push(OrderItem::try_from(row)?);
        }
        Ok(saved)
    }

    async fn attach_authorization(
        &mut self,
        order: OrderId,
        reference: &str,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(concat!(
            r"
            UPDATE orders
            SET payment_intent_id = $2, updated_at = NOW()
            WHERE id = $1 AND payment_intent_id IS NULL AND payment_status = 'unpaid'
            RETURNING ",
            order_columns!()
        ))
        .bind(order)
        .bind(reference)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => Order::try_from(row),
            None => Err(RepositoryError::Conflict(format!(
                "order {order} already has a payment authorization"
            ))),
        }
    }

    async fn clear_cart(
        &mut self,
        user: UserId,
        lines: &[CartLineId],
    ) -> Result<u64, RepositoryError> {
        let ids: Vec<i64> = lines.iter().map(CartLineId::as_i64).collect();
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND id = ANY($2)")
            .bind(user)
            .bind(&ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }
}
