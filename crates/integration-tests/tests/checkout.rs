//! Integration tests for checkout: cart snapshot to persisted order.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::ExposeSecret;

use edubook_core::{OrderStatus, PaymentStatus};
use edubook_integration_tests::{CartWritingGateway, Outcome, ScriptedGateway, Shop, shipping};
use edubook_storefront::models::ShippingForm;
use edubook_storefront::services::{
    CheckoutError, CheckoutService, CheckoutSettings, PaymentError,
};

// =============================================================================
// Happy Path
// =============================================================================

#[tokio::test]
async fn test_two_line_cart_becomes_order() {
    let shop = Shop::new().await;
    let a = shop.product("Toan cao cap", 100_000).await;
    let b = shop.product("Vat ly dai cuong", 50_000).await;
    shop.add_to_cart(&shop.customer, &a, 2).await;
    shop.add_to_cart(&shop.customer, &b, 1).await;

    let receipt = shop
        .checkout
        .create_order(&shop.customer, shipping())
        .await
        .unwrap();
    let order = &receipt.order.order;

    assert_eq!(order.totals.subtotal(), Decimal::from(250_000));
    assert_eq!(order.totals.total(), Decimal::from(250_000));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Unpaid);
    assert_eq!(order.paid_at, None);
    assert_eq!(order.user_id, shop.customer.id);
    assert!(order.order_number.as_str().starts_with("EB"));
    assert_eq!(
        order.payment_intent_id.as_deref(),
        Some(format!("pi_{}", order.order_number).as_str())
    );
    assert!(
        receipt
            .client_secret
            .expose_secret()
            .starts_with("pi_EB")
    );

    let mut prices: Vec<_> = receipt
        .order
        .items
        .iter()
        .map(|item| (item.product_name.clone(), item.price, item.quantity.get()))
        .collect();
    prices.sort();
    assert_eq!(
        prices,
        vec![
            ("Toan cao cap".to_string(), Decimal::from(100_000), 2),
            ("Vat ly dai cuong".to_string(), Decimal::from(50_000), 1),
        ]
    );

    let cart = shop.cart.snapshot(&shop.customer).await.unwrap();
    assert!(cart.is_empty());
    assert_eq!(shop.gateway.calls(), 1);
}

#[tokio::test]
async fn test_shipping_fee_is_added_to_total() {
    let settings = CheckoutSettings {
        shipping_fee: Decimal::from(30_000),
        ..CheckoutSettings::default()
    };
    let shop = Shop::with(ScriptedGateway::default(), settings).await;
    let book = shop.product("Hoa hoc", 120_000).await;
    shop.add_to_cart(&shop.customer, &book, 1).await;

    let receipt = shop
        .checkout
        .create_order(&shop.customer, shipping())
        .await
        .unwrap();

    let totals = receipt.order.order.totals;
    assert_eq!(totals.subtotal(), Decimal::from(120_000));
    assert_eq!(totals.shipping_fee(), Decimal::from(30_000));
    assert_eq!(totals.total(), Decimal::from(150_000));
}

#[tokio::test]
async fn test_totals_use_live_price_not_observed_price() {
    let shop = Shop::new().await;
    let book = shop.product("Sinh hoc", 80_000).await;
    shop.add_to_cart(&shop.customer, &book, 3).await;
    shop.store
        .set_product_price(book.id, Decimal::from(90_000))
        .await
        .unwrap();

    let receipt = shop
        .checkout
        .create_order(&shop.customer, shipping())
        .await
        .unwrap();

    assert_eq!(receipt.order.order.totals.subtotal(), Decimal::from(270_000));
    assert_eq!(receipt.order.items.first().unwrap().price, Decimal::from(90_000));
}

#[tokio::test]
async fn test_subtotal_matches_items_after_reload() {
    let shop = Shop::new().await;
    for (name, price, quantity) in [("Van", 45_500, 3), ("Su", 60_000, 2), ("Dia", 12_345, 7)] {
        let product = shop.product(name, price).await;
        shop.add_to_cart(&shop.customer, &product, quantity).await;
    }

    let receipt = shop
        .checkout
        .create_order(&shop.customer, shipping())
        .await
        .unwrap();
    let reloaded = shop
        .orders
        .get_order(&shop.customer, receipt.order.order.id)
        .await
        .unwrap();

    assert_eq!(reloaded, receipt.order);
    assert_eq!(reloaded.items_subtotal(), reloaded.order.totals.subtotal());
    assert_eq!(reloaded.items.len(), 3);
}

// =============================================================================
// Isolation and Frozen History
// =============================================================================

#[tokio::test]
async fn test_only_the_principals_cart_is_cleared() {
    let shop = Shop::new().await;
    let other = shop.new_customer().await;
    let book = shop.product("Tin hoc", 70_000).await;
    shop.add_to_cart(&shop.customer, &book, 1).await;
    shop.add_to_cart(&other, &book, 4).await;

    shop.checkout
        .create_order(&shop.customer, shipping())
        .await
        .unwrap();

    let theirs = shop.cart.snapshot(&other).await.unwrap();
    assert_eq!(theirs.item_count(), 4);
    assert!(shop.cart.snapshot(&shop.customer).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_order_items_survive_catalog_changes() {
    let shop = Shop::new().await;
    let kept = shop.product("Ngu van", 40_000).await;
    let removed = shop.product("Lich su", 55_000).await;
    shop.add_to_cart(&shop.customer, &kept, 1).await;
    shop.add_to_cart(&shop.customer, &removed, 1).await;

    let receipt = shop
        .checkout
        .create_order(&shop.customer, shipping())
        .await
        .unwrap();

    shop.store
        .set_product_price(kept.id, Decimal::from(99_000))
        .await
        .unwrap();
    shop.store.delete_product(removed.id).await;

    let reloaded = shop
        .orders
        .get_order(&shop.customer, receipt.order.order.id)
        .await
        .unwrap();
    let kept_item = reloaded
        .items
        .iter()
        .find(|item| item.product_name == "Ngu van")
        .unwrap();
    let removed_item = reloaded
        .items
        .iter()
        .find(|item| item.product_name == "Lich su")
        .unwrap();

    assert_eq!(kept_item.price, Decimal::from(40_000));
    assert_eq!(kept_item.product_id, Some(kept.id));
    assert_eq!(removed_item.price, Decimal::from(55_000));
    assert_eq!(removed_item.product_id, None);
    assert_eq!(reloaded.order.totals.subtotal(), Decimal::from(95_000));
}

#[tokio::test]
async fn test_line_added_during_payment_stays_in_cart() {
    let shop = Shop::new().await;
    let ordered = shop.product("Toan roi rac", 90_000).await;
    let late = shop.product("Xac suat thong ke", 75_000).await;
    shop.add_to_cart(&shop.customer, &ordered, 2).await;

    let checkout = CheckoutService::new(
        shop.store.clone(),
        CartWritingGateway::new(shop.store.clone(), late),
        CheckoutSettings::default(),
    );
    let receipt = checkout
        .create_order(&shop.customer, shipping())
        .await
        .unwrap();

    let ordered_names: Vec<_> = receipt
        .order
        .items
        .iter()
        .map(|item| item.product_name.as_str())
        .collect();
    assert_eq!(ordered_names, ["Toan roi rac"]);
    assert_eq!(receipt.order.order.totals.subtotal(), Decimal::from(180_000));

    let cart = shop.cart.snapshot(&shop.customer).await.unwrap();
    let left: Vec<_> = cart
        .lines
        .iter()
        .map(|line| (line.product.name.as_str(), line.quantity.get()))
        .collect();
    assert_eq!(left, [("Xac suat thong ke", 1)]);
}

// =============================================================================
// Failure Paths
// =============================================================================

#[tokio::test]
async fn test_empty_cart_creates_nothing() {
    let shop = Shop::new().await;

    let err = shop
        .checkout
        .create_order(&shop.customer, shipping())
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::EmptyCart));
    assert_eq!(shop.store.order_count().await, 0);
    assert_eq!(shop.store.order_item_count().await, 0);
    assert_eq!(shop.gateway.calls(), 0);
}

#[tokio::test]
async fn test_invalid_shipping_is_rejected_before_anything_runs() {
    let shop = Shop::new().await;
    let book = shop.product("Dia ly", 30_000).await;
    shop.add_to_cart(&shop.customer, &book, 1).await;

    let form = ShippingForm {
        phone: "call me maybe".into(),
        ..shipping()
    };
    let err = shop
        .checkout
        .create_order(&shop.customer, form)
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::Validation(_)));
    assert_eq!(shop.store.order_count().await, 0);
    assert_eq!(shop.cart.snapshot(&shop.customer).await.unwrap().item_count(), 1);
}

#[tokio::test]
async fn test_order_too_large_for_money_columns_is_rejected() {
    let shop = Shop::new().await;
    let atlas = shop.product("Bo atlas suu tam", 20_000_000).await;
    shop.add_to_cart(&shop.customer, &atlas, 999).await;

    let err = shop
        .checkout
        .create_order(&shop.customer, shipping())
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::Validation(_)));
    assert_eq!(shop.store.order_count().await, 0);
    assert_eq!(shop.gateway.calls(), 0);
}

#[tokio::test]
async fn test_declined_payment_rolls_back_everything() {
    let shop = Shop::with(
        ScriptedGateway::new([Outcome::Decline]),
        CheckoutSettings::default(),
    )
    .await;
    let a = shop.product("Toan cao cap", 100_000).await;
    let b = shop.product("Vat ly dai cuong", 50_000).await;
    shop.add_to_cart(&shop.customer, &a, 2).await;
    shop.add_to_cart(&shop.customer, &b, 1).await;

    let err = shop
        .checkout
        .create_order(&shop.customer, shipping())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::Payment(PaymentError::Declined(_))
    ));
    assert_eq!(shop.store.order_count().await, 0);
    assert_eq!(shop.store.order_item_count().await, 0);

    let cart = shop.cart.snapshot(&shop.customer).await.unwrap();
    assert_eq!(cart.lines.len(), 2);
    assert_eq!(cart.total(), Decimal::from(250_000));

    // The next attempt goes through with the untouched cart.
    let receipt = shop
        .checkout
        .create_order(&shop.customer, shipping())
        .await
        .unwrap();
    assert_eq!(receipt.order.order.totals.subtotal(), Decimal::from(250_000));
}

#[tokio::test(start_paused = true)]
async fn test_slow_gateway_times_out_and_rolls_back() {
    let settings = CheckoutSettings {
        payment_timeout: Duration::from_secs(10),
        ..CheckoutSettings::default()
    };
    let shop = Shop::with(
        ScriptedGateway::new([Outcome::Delay(Duration::from_secs(60))]),
        settings,
    )
    .await;
    let book = shop.product("Triet hoc", 65_000).await;
    shop.add_to_cart(&shop.customer, &book, 1).await;

    let err = shop
        .checkout
        .create_order(&shop.customer, shipping())
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::Payment(PaymentError::Timeout(_))));
    assert_eq!(shop.store.order_count().await, 0);
    assert_eq!(shop.cart.snapshot(&shop.customer).await.unwrap().item_count(), 1);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_double_submit_creates_one_order() {
    let shop = Shop::with(
        ScriptedGateway::new([Outcome::Delay(Duration::from_millis(20))]),
        CheckoutSettings::default(),
    )
    .await;
    let book = shop.product("Kinh te hoc", 150_000).await;
    shop.add_to_cart(&shop.customer, &book, 1).await;

    let (first, second) = tokio::join!(
        shop.checkout.create_order(&shop.customer, shipping()),
        shop.checkout.create_order(&shop.customer, shipping()),
    );

    let results = [first, second];
    let created = results.iter().filter(|r| r.is_ok()).count();
    let empty = results
        .iter()
        .filter(|r| matches!(r, Err(CheckoutError::EmptyCart)))
        .count();

    assert_eq!(created, 1);
    assert_eq!(empty, 1);
    assert_eq!(shop.store.order_count().await, 1);
    assert_eq!(shop.gateway.calls(), 1);
}
