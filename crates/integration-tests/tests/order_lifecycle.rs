//! Integration tests for the administrative order status lifecycle.

#![allow(clippy::unwrap_used)]

use edubook_core::{OrderId, OrderStatus, TransitionError};
use edubook_integration_tests::{Shop, shipping};
use edubook_storefront::services::OrderError;

/// A shop with one pending order for its customer.
async fn shop_with_order() -> (Shop, OrderId) {
    let shop = Shop::new().await;
    let book = shop.product("Co hoc luong tu", 210_000).await;
    shop.add_to_cart(&shop.customer, &book, 1).await;
    let receipt = shop
        .checkout
        .create_order(&shop.customer, shipping())
        .await
        .unwrap();
    (shop, receipt.order.order.id)
}

// =============================================================================
// Transitions
// =============================================================================

#[tokio::test]
async fn test_full_path_to_delivered_stamps_timestamps() {
    let (shop, id) = shop_with_order().await;

    for status in [
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipping,
        OrderStatus::Delivered,
    ] {
        let order = shop
            .orders
            .update_order_status(&shop.admin, id, status, None)
            .await
            .unwrap();
        assert_eq!(order.status, status);
    }

    let order = shop.orders.get_order(&shop.admin, id).await.unwrap().order;
    assert!(order.shipped_at.is_some());
    assert!(order.delivered_at.is_some());
    assert!(order.cancelled_at.is_none());
    assert!(order.shipped_at <= order.delivered_at);
}

#[tokio::test]
async fn test_pending_cannot_jump_to_shipping() {
    let (shop, id) = shop_with_order().await;

    let err = shop
        .orders
        .update_order_status(&shop.admin, id, OrderStatus::Shipping, None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrderError::InvalidTransition(TransitionError::NotAllowed {
            from: OrderStatus::Pending,
            to: OrderStatus::Shipping,
        })
    ));
    let order = shop.orders.get_order(&shop.admin, id).await.unwrap().order;
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.shipped_at.is_none());
}

#[tokio::test]
async fn test_delivered_is_terminal() {
    let (shop, id) = shop_with_order().await;
    for status in [
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipping,
        OrderStatus::Delivered,
    ] {
        shop.orders
            .update_order_status(&shop.admin, id, status, None)
            .await
            .unwrap();
    }

    for target in OrderStatus::ALL {
        let err = shop
            .orders
            .update_order_status(&shop.admin, id, target, None)
            .await
            .unwrap_err();
        assert!(
            matches!(err, OrderError::InvalidTransition(_)),
            "delivered -> {target} should be rejected"
        );
    }
}

#[tokio::test]
async fn test_cancellation_records_reason_and_is_terminal() {
    let (shop, id) = shop_with_order().await;
    shop.orders
        .update_order_status(&shop.admin, id, OrderStatus::Confirmed, None)
        .await
        .unwrap();

    let order = shop
        .orders
        .update_order_status(
            &shop.admin,
            id,
            OrderStatus::Cancelled,
            Some("Khach hang yeu cau huy".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Cancelled);
    assert!(order.cancelled_at.is_some());
    assert_eq!(order.cancel_reason.as_deref(), Some("Khach hang yeu cau huy"));

    let err = shop
        .orders
        .update_order_status(&shop.admin, id, OrderStatus::Processing, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::InvalidTransition(TransitionError::Terminal {
            from: OrderStatus::Cancelled
        })
    ));
}

#[tokio::test]
async fn test_reason_is_ignored_for_non_cancellation() {
    let (shop, id) = shop_with_order().await;

    let order = shop
        .orders
        .update_order_status(
            &shop.admin,
            id,
            OrderStatus::Confirmed,
            Some("not a cancellation".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(order.cancel_reason, None);
}

// =============================================================================
// Authorization and Visibility
// =============================================================================

#[tokio::test]
async fn test_customers_cannot_change_status() {
    let (shop, id) = shop_with_order().await;

    let err = shop
        .orders
        .update_order_status(&shop.customer, id, OrderStatus::Confirmed, None)
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::Forbidden));
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let shop = Shop::new().await;

    let err = shop
        .orders
        .update_order_status(&shop.admin, OrderId::new(9_999), OrderStatus::Confirmed, None)
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::NotFound));
}

#[tokio::test]
async fn test_orders_are_visible_to_owner_and_admin_only() {
    let (shop, id) = shop_with_order().await;
    let stranger = shop.new_customer().await;

    assert!(shop.orders.get_order(&shop.customer, id).await.is_ok());
    assert!(shop.orders.get_order(&shop.admin, id).await.is_ok());
    assert!(matches!(
        shop.orders.get_order(&stranger, id).await,
        Err(OrderError::Forbidden)
    ));

    assert_eq!(shop.orders.list_orders(&shop.customer).await.unwrap().len(), 1);
    assert!(shop.orders.list_orders(&stranger).await.unwrap().is_empty());
    assert_eq!(shop.orders.list_orders(&shop.admin).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_stats_count_orders_by_status() {
    let (shop, id) = shop_with_order().await;
    shop.orders
        .update_order_status(&shop.admin, id, OrderStatus::Confirmed, None)
        .await
        .unwrap();

    let stats = shop.orders.stats(&shop.admin).await.unwrap();
    assert_eq!(stats.user_count, 2);
    assert_eq!(stats.product_count, 1);
    assert_eq!(stats.order_count, 1);

    let confirmed = stats
        .orders_by_status
        .iter()
        .find(|count| count.status == OrderStatus::Confirmed)
        .unwrap();
    assert_eq!(confirmed.count, 1);
    assert_eq!(stats.orders_by_status.len(), OrderStatus::ALL.len());

    assert!(matches!(
        shop.orders.stats(&shop.customer).await,
        Err(OrderError::Forbidden)
    ));
}
