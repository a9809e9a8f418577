//! Order domain types.
//!
//! An [`Order`] is written once at checkout and afterwards only changes
//! through status transitions. Its [`OrderItem`]s copy product name, price
//! and thumbnail at checkout time so later catalog edits never rewrite
//! history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use edubook_core::{
    OrderId, OrderItemId, OrderNumber, OrderStatus, OrderTotals, PaymentMethod, PaymentStatus,
    ProductId, Quantity, UserId,
};

use super::CartLine;

const MAX_NAME_LEN: usize = 100;
const MAX_PHONE_LEN: usize = 20;
const MAX_EMAIL_LEN: usize = 255;
const MAX_REGION_LEN: usize = 100;

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    #[serde(flatten)]
    pub totals: OrderTotals,
    #[serde(flatten)]
    pub shipping: ShippingDetails,
    /// Processor authorization reference, attached once during checkout.
    pub payment_intent_id: Option<String>,
    /// Stamped alongside `PaymentStatus::Paid` when the processor confirms
    /// the charge. Checkout never sets it.
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A frozen order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    /// `None` once the product has been deleted from the catalog.
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub product_thumbnail: Option<String>,
    /// Unit price at checkout.
    pub price: Decimal,
    pub quantity: Quantity,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.quantity.times(self.price)
    }
}

/// An order together with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl OrderDetail {
    /// Sum of frozen item prices times quantities.
    ///
    /// Always equal to `order.totals.subtotal()` for a consistent order.
    #[must_use]
    pub fn items_subtotal(&self) -> Decimal {
        self.items.iter().map(OrderItem::line_total).sum()
    }
}

/// Values for a new order row.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub payment_method: PaymentMethod,
    pub totals: OrderTotals,
    pub shipping: ShippingDetails,
}

/// Values for a new order item row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_thumbnail: Option<String>,
    pub price: Decimal,
    pub quantity: Quantity,
}

impl NewOrderItem {
    /// Copy the live product data of a cart line.
    #[must_use]
    pub fn freeze(line: &CartLine) -> Self {
        Self {
            product_id: line.product.id,
            product_name: line.product.name.clone(),
            product_thumbnail: line.product.thumbnail.clone(),
            price: line.unit_price(),
            quantity: line.quantity,
        }
    }
}

/// Validated delivery details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingDetails {
    pub shipping_name: String,
    pub shipping_phone: String,
    pub shipping_email: Option<String>,
    pub shipping_address: String,
    pub shipping_city: Option<String>,
    pub shipping_district: Option<String>,
    pub shipping_ward: Option<String>,
    pub note: Option<String>,
}

/// Delivery details as submitted by the client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    pub email: Option<String>,
    #[serde(default)]
    pub address: String,
    pub city: Option<String>,
    pub district: Option<String>,
    pub ward: Option<String>,
    pub note: Option<String>,
}

impl ShippingForm {
    /// Trim and validate the submitted fields.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message naming the first invalid field.
    pub fn validate(self) -> Result<ShippingDetails, String> {
        let name = required("name", &self.name, MAX_NAME_LEN)?;
        let phone = required("phone", &self.phone, MAX_PHONE_LEN)?;
        if !phone
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '.' | '(' | ')'))
        {
            return Err("phone may only contain digits, spaces and + - . ( )".to_string());
        }
        let address = required("address", &self.address, usize::MAX)?;

        let email = optional("email", self.email.as_deref(), MAX_EMAIL_LEN)?;
        if let Some(email) = &email
            && !is_plausible_email(email)
        {
            return Err("email is not a valid address".to_string());
        }

        Ok(ShippingDetails {
            shipping_name: name,
            shipping_phone: phone,
            shipping_email: email,
            shipping_address: address,
            shipping_city: optional("city", self.city.as_deref(), MAX_REGION_LEN)?,
            shipping_district: optional("district", self.district.as_deref(), MAX_REGION_LEN)?,
            shipping_ward: optional("ward", self.ward.as_deref(), MAX_REGION_LEN)?,
            note: optional("note", self.note.as_deref(), usize::MAX)?,
        })
    }
}

fn required(field: &str, value: &str, max_len: usize) -> Result<String, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(format!("{field} is required"));
    }
    if value.chars().count() > max_len {
        return Err(format!("{field} must be at most {max_len} characters"));
    }
    Ok(value.to_string())
}

fn optional(field: &str, value: Option<&str>, max_len: usize) -> Result<Option<String>, String> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => required(field, v, max_len).map(Some),
    }
}

fn is_plausible_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

/// A requested status transition, with the timestamp it should be stamped at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub to: OrderStatus,
    pub at: DateTime<Utc>,
    /// Only recorded when `to` is `Cancelled`.
    pub reason: Option<String>,
}

impl StatusChange {
    #[must_use]
    pub fn new(to: OrderStatus, at: DateTime<Utc>, reason: Option<String>) -> Self {
        let reason = if to == OrderStatus::Cancelled {
            reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
        } else {
            None
        };
        Self { to, at, reason }
    }

    /// Apply the change to an in-memory order.
    ///
    /// Stamps the timestamp column that belongs to the new status.
    pub fn apply(&self, order: &mut Order) {
        order.status = self.to;
        order.updated_at = self.at;
        match self.to {
            OrderStatus::Shipping => order.shipped_at = Some(self.at),
            OrderStatus::Delivered => order.delivered_at = Some(self.at),
            OrderStatus::Cancelled => {
                order.cancelled_at = Some(self.at);
                order.cancel_reason.clone_from(&self.reason);
            }
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Processing => {}
        }
    }
}

/// Number of orders in one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

/// Dashboard counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub user_count: i64,
    pub product_count: i64,
    pub order_count: i64,
    /// One entry per status, in lifecycle order, including zero counts.
    pub orders_by_status: Vec<StatusCount>,
}

impl StoreStats {
    /// Fill in zero counts for statuses with no orders.
    #[must_use]
    pub fn new(
        user_count: i64,
        product_count: i64,
        order_count: i64,
        counted: &[(OrderStatus, i64)],
    ) -> Self {
        let orders_by_status = OrderStatus::ALL
            .into_iter()
            .map(|status| StatusCount {
                status,
                count: counted
                    .iter()
                    .filter(|(s, _)| *s == status)
                    .map(|(_, c)| *c)
                    .sum(),
            })
            .collect();
        Self {
            user_count,
            product_count,
            order_count,
            orders_by_status,
        }
    }
}
