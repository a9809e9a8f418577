//! Order reads and status updates for `PostgreSQL`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use edubook_core::{
    OrderId, OrderItemId, OrderNumber, OrderStatus, OrderTotals, PaymentMethod, PaymentStatus,
    ProductId, UserId,
};

use super::{OrderStore, PgStore, RepositoryError, stored_quantity};
use crate::models::{
    Order, OrderDetail, OrderItem, ShippingDetails, StatusChange, StoreStats,
};

#[derive(Debug, sqlx::FromRow)]
pub(super) struct OrderRow {
    id: OrderId,
    order_number: OrderNumber,
    user_id: UserId,
    status: OrderStatus,
    payment_status: PaymentStatus,
    payment_method: PaymentMethod,
    subtotal: Decimal,
    shipping_fee: Decimal,
    discount: Decimal,
    total: Decimal,
    shipping_name: String,
    shipping_phone: String,
    shipping_email: Option<String>,
    shipping_address: String,
    shipping_city: Option<String>,
    shipping_district: Option<String>,
    shipping_ward: Option<String>,
    note: Option<String>,
    payment_intent_id: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancel_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let totals =
            OrderTotals::from_stored(row.subtotal, row.shipping_fee, row.discount, row.total)
                .map_err(|e| {
                    RepositoryError::DataCorruption(format!(
                        "inconsistent totals on order {}: {e}",
                        row.order_number
                    ))
                })?;

        Ok(Self {
            id: row.id,
            order_number: row.order_number,
            user_id: row.user_id,
            status: row.status,
            payment_status: row.payment_status,
            payment_method: row.payment_method,
            totals,
            shipping: ShippingDetails {
                shipping_name: row.shipping_name,
                shipping_phone: row.shipping_phone,
                shipping_email: row.shipping_email,
                shipping_address: row.shipping_address,
                shipping_city: row.shipping_city,
                shipping_district: row.shipping_district,
                shipping_ward: row.shipping_ward,
                note: row.note,
            },
            payment_intent_id: row.payment_intent_id,
            paid_at: row.paid_at,
            shipped_at: row.shipped_at,
            delivered_at: row.delivered_at,
            cancelled_at: row.cancelled_at,
            cancel_reason: row.cancel_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: Option<ProductId>,
    product_name: String,
    product_thumbnail: Option<String>,
    price: Decimal,
    quantity: i32,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            product_name: row.product_name,
            product_thumbnail: row.product_thumbnail,
            price: row.price,
            quantity: stored_quantity(row.quantity)?,
        })
    }
}

impl PgStore {
    async fn items_for(
        &self,
        orders: &[OrderId],
    ) -> Result<HashMap<OrderId, Vec<OrderItem>>, RepositoryError> {
        let ids: Vec<i64> = orders.iter().map(OrderId::as_i64).collect();
        let rows = sqlx::query_as::<_, OrderItemRow>(concat!(
            "SELECT ",
            order_item_columns!(),
            " FROM order_items WHERE order_id = ANY($1) ORDER BY id"
        ))
        .bind(ids)
        .fetch_all(self.pool())
        .await?;

        let mut grouped: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            let item = OrderItem::try_from(row)?;
            grouped.entry(item.order_id).or_default().push(item);
        }
        Ok(grouped)
    }
}

impl OrderStore for PgStore {
    async fn list_orders(
        &self,
        owner: Option<UserId>,
    ) -> Result<Vec<OrderDetail>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE ($1::BIGINT IS NULL OR user_id = $1)",
            " ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner)
        .fetch_all(self.pool())
        .await?;

        let orders = rows
            .into_iter()
            .map(Order::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let ids: Vec<OrderId> = orders.iter().map(|o| o.id).collect();
        let mut items = self.items_for(&ids).await?;

        Ok(orders
            .into_iter()
            .map(|order| OrderDetail {
                items: items.remove(&order.id).unwrap_or_default(),
                order,
            })
            .collect())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderDetail>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let order = Order::try_from(row)?;
        let items = self
            .items_for(&[order.id])
            .await?
            .remove(&order.id)
            .unwrap_or_default();

        Ok(Some(OrderDetail { order, items }))
    }

    async fn transition_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        change: &StatusChange,
    ) -> Result<Option<Order>, RepositoryError> {
        let stamp = |status: OrderStatus| (change.to == status).then_some(change.at);

        let row = sqlx::query_as::<_, OrderRow>(concat!(
            r"
            UPDATE orders
            SET status = $3,
                updated_at = $4,
                shipped_at = COALESCE($5, shipped_at),
                delivered_at = COALESCE($6, delivered_at),
                cancelled_at = COALESCE($7, cancelled_at),
                cancel_reason = COALESCE($8, cancel_reason)
            WHERE id = $1 AND status = $2
            RETURNING ",
            order_columns!()
        ))
        .bind(id)
        .bind(from)
        .bind(change.to)
        .bind(change.at)
        .bind(stamp(OrderStatus::Shipping))
        .bind(stamp(OrderStatus::Delivered))
        .bind(stamp(OrderStatus::Cancelled))
        .bind(change.reason.as_deref())
        .fetch_optional(self.pool())
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn stats(&self) -> Result<StoreStats, RepositoryError> {
        let (users, products, orders): (i64, i64, i64) = sqlx::query_as(
            r"
            SELECT (SELECT COUNT(*) FROM users),
                   (SELECT COUNT(*) FROM products),
                   (SELECT COUNT(*) FROM orders)
            ",
        )
        .fetch_one(self.pool())
        .await?;

        let by_status: Vec<(OrderStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM orders GROUP BY status")
                .fetch_all(self.pool())
                .await?;

        Ok(StoreStats::new(users, products, orders, &by_status))
    }
}
