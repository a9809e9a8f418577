//! Order administration commands.
//!
//! # Usage
//!
//! ```bash
//! # Move an order to the next status
//! edubook-cli orders set-status 42 confirmed --admin 1
//!
//! # Cancel with a reason
//! edubook-cli orders set-status 42 cancelled --admin 1 --reason "out of stock"
//! ```
//!
//! Transitions go through the same service as the HTTP API, so the lifecycle
//! rules and compare-and-set apply unchanged.

use edubook_core::{OrderId, OrderStatus, UserId};
use edubook_storefront::db::{PgStore, create_pool};
use edubook_storefront::models::Principal;
use edubook_storefront::services::OrderService;

use super::{CommandError, database_url};

/// Change the status of an order on behalf of an admin.
///
/// # Arguments
///
/// * `order_id` - Order to update
/// * `status` - Target status (`confirmed`, `processing`, `shipping`, `delivered`, `cancelled`)
/// * `admin_id` - User id recorded as the acting admin
/// * `reason` - Cancellation reason, ignored for other statuses
///
/// # Errors
///
/// Returns `CommandError::InvalidArgument` for an unknown status and
/// `CommandError::Order` if the transition is rejected.
pub async fn set_status(
    order_id: i64,
    status: &str,
    admin_id: i64,
    reason: Option<String>,
) -> Result<OrderStatus, CommandError> {
    let status: OrderStatus = status.parse().map_err(CommandError::InvalidArgument)?;

    let pool = create_pool(&database_url()?).await?;
    let service = OrderService::new(PgStore::new(pool));
    let admin = Principal::admin(UserId::new(admin_id));

    let order = service
        .update_order_status(&admin, OrderId::new(order_id), status, reason)
        .await?;

    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        status = %order.status,
        "Order status updated"
    );
    Ok(order.status)
}
