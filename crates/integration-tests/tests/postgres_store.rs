//! Checkout and status lifecycle against `PostgreSQL`.
//!
//! These exercise the row locks, guarded updates and upserts that the
//! in-memory store cannot. Every test creates its own users and products,
//! so they can share one database.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use secrecy::SecretString;
use uuid::Uuid;

use edubook_core::{
    OrderId, OrderNumber, OrderStatus, OrderTotals, PaymentMethod, ProductId, Quantity, Role,
    TransitionError, UserId,
};
use edubook_integration_tests::{CartWritingGateway, Outcome, ScriptedGateway, shipping};
use edubook_storefront::db::{
    CartStore, CatalogStore, CheckoutStore, CheckoutTx, OrderStore, PgStore, RepositoryError,
    create_pool,
};
use edubook_storefront::models::{NewOrder, Principal, Product, StatusChange};
use edubook_storefront::services::{
    CheckoutError, CheckoutService, CheckoutSettings, OrderError, OrderService, PaymentError,
    PaymentGateway,
};

// =============================================================================
// Helpers
// =============================================================================

async fn store() -> PgStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = create_pool(&SecretString::from(url))
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("../storefront/migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    PgStore::new(pool)
}

async fn user(store: &PgStore, role: Role) -> UserId {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO users (email, full_name, role) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(format!("{}@test.edubook.vn", Uuid::new_v4()))
    .bind("Test User")
    .bind(role)
    .fetch_one(store.pool())
    .await
    .unwrap();
    UserId::new(id)
}

async fn product(store: &PgStore, name: &str, price: i64) -> Product {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO products (name, price, stock) VALUES ($1, $2, 100) RETURNING id",
    )
    .bind(name)
    .bind(Decimal::from(price))
    .fetch_one(store.pool())
    .await
    .unwrap();
    store.get_product(ProductId::new(id)).await.unwrap().unwrap()
}

async fn add(store: &PgStore, user: UserId, product: &Product, quantity: i64) {
    store
        .add_quantity(user, product, Quantity::new(quantity).unwrap())
        .await
        .unwrap()
        .unwrap();
}

fn checkout<P: PaymentGateway>(
    store: &PgStore,
    gateway: P,
) -> CheckoutService<PgStore, P> {
    CheckoutService::new(store.clone(), gateway, CheckoutSettings::default())
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
#[ignore = "Requires running database"]
async fn test_pg_subtotal_matches_items_after_reload() {
    let store = store().await;
    let customer = Principal::user(user(&store, Role::User).await);
    let a = product(&store, "Toan cao cap", 100_000).await;
    let b = product(&store, "Vat ly dai cuong", 50_000).await;
    add(&store, customer.id, &a, 2).await;
    add(&store, customer.id, &b, 1).await;

    let receipt = checkout(&store, ScriptedGateway::default())
        .create_order(&customer, shipping())
        .await
        .unwrap();

    let reloaded = store
        .get_order(receipt.order.order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.order.totals.subtotal(), Decimal::from(250_000));
    assert_eq!(reloaded.items_subtotal(), reloaded.order.totals.subtotal());
    assert_eq!(reloaded.items.len(), 2);
    assert_eq!(
        reloaded.order.payment_intent_id.as_deref(),
        Some(format!("pi_{}", reloaded.order.order_number).as_str())
    );
    assert!(store.cart_lines(customer.id).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires running database"]
async fn test_pg_line_added_during_payment_stays_in_cart() {
    let store = store().await;
    let customer = Principal::user(user(&store, Role::User).await);
    let ordered = product(&store, "Toan roi rac", 90_000).await;
    let late = product(&store, "Xac suat thong ke", 75_000).await;
    add(&store, customer.id, &ordered, 2).await;

    let receipt = checkout(&store, CartWritingGateway::new(store.clone(), late.clone()))
        .create_order(&customer, shipping())
        .await
        .unwrap();

    let ordered_ids: Vec<_> = receipt
        .order
        .items
        .iter()
        .map(|item| item.product_id)
        .collect();
    assert_eq!(ordered_ids, [Some(ordered.id)]);

    let left: Vec<_> = store
        .cart_lines(customer.id)
        .await
        .unwrap()
        .into_iter()
        .map(|line| (line.product.id, line.quantity.get()))
        .collect();
    assert_eq!(left, [(late.id, 1)]);
}

#[tokio::test]
#[ignore = "Requires running database"]
async fn test_pg_concurrent_double_submit_creates_one_order() {
    let store = store().await;
    let customer = Principal::user(user(&store, Role::User).await);
    let book = product(&store, "Kinh te hoc", 150_000).await;
    add(&store, customer.id, &book, 1).await;

    let gateway = ScriptedGateway::new([Outcome::Delay(Duration::from_millis(200))]);
    let service = checkout(&store, gateway.clone());

    let (first, second) = tokio::join!(
        service.create_order(&customer, shipping()),
        service.create_order(&customer, shipping()),
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(CheckoutError::EmptyCart)))
            .count(),
        1
    );
    assert_eq!(store.list_orders(Some(customer.id)).await.unwrap().len(), 1);
    assert_eq!(gateway.calls(), 1);
}

#[tokio::test]
#[ignore = "Requires running database"]
async fn test_pg_declined_payment_rolls_back() {
    let store = store().await;
    let customer = Principal::user(user(&store, Role::User).await);
    let book = product(&store, "Hoa hoc", 120_000).await;
    add(&store, customer.id, &book, 3).await;

    let err = checkout(&store, ScriptedGateway::new([Outcome::Decline]))
        .create_order(&customer, shipping())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::Payment(PaymentError::Declined(_))
    ));
    assert!(store.list_orders(Some(customer.id)).await.unwrap().is_empty());
    let cart = store.cart_lines(customer.id).await.unwrap();
    assert_eq!(cart.first().unwrap().quantity.get(), 3);
}

#[tokio::test]
#[ignore = "Requires running database"]
async fn test_pg_authorization_is_attached_once() {
    let store = store().await;
    let owner = user(&store, Role::User).await;

    let mut tx = store.begin().await.unwrap();
    let order = tx
        .save_order(&NewOrder {
            order_number: OrderNumber::generate(),
            user_id: owner,
            payment_method: PaymentMethod::Stripe,
            totals: OrderTotals::new(Decimal::from(10_000), Decimal::ZERO, Decimal::ZERO)
                .unwrap(),
            shipping: shipping().validate().unwrap(),
        })
        .await
        .unwrap();

    tx.attach_authorization(order.id, "pi_first").await.unwrap();
    assert!(matches!(
        tx.attach_authorization(order.id, "pi_second").await,
        Err(RepositoryError::Conflict(_))
    ));
}

#[tokio::test]
#[ignore = "Requires running database"]
async fn test_pg_duplicate_order_number_leaves_transaction_usable() {
    let store = store().await;
    let owner = user(&store, Role::User).await;
    let number = OrderNumber::generate();
    let new_order = |order_number: OrderNumber| NewOrder {
        order_number,
        user_id: owner,
        payment_method: PaymentMethod::Stripe,
        totals: OrderTotals::new(Decimal::from(10_000), Decimal::ZERO, Decimal::ZERO).unwrap(),
        shipping: shipping().validate().unwrap(),
    };

    let mut tx = store.begin().await.unwrap();
    tx.save_order(&new_order(number.clone())).await.unwrap();
    assert!(matches!(
        tx.save_order(&new_order(number)).await,
        Err(RepositoryError::Conflict(_))
    ));
    tx.save_order(&new_order(OrderNumber::generate()))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(store.list_orders(Some(owner)).await.unwrap().len(), 2);
}

// =============================================================================
// Cart
// =============================================================================

#[tokio::test]
#[ignore = "Requires running database"]
async fn test_pg_add_merges_up_to_cap() {
    let store = store().await;
    let customer = user(&store, Role::User).await;
    let book = product(&store, "Ngu phap", 80_000).await;

    add(&store, customer, &book, 500).await;
    let merged = store
        .add_quantity(customer, &book, Quantity::new(499).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(merged.quantity.get(), 999);

    let over = store
        .add_quantity(customer, &book, Quantity::new(1).unwrap())
        .await
        .unwrap();
    assert!(over.is_none());

    let lines = store.cart_lines(customer).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines.first().unwrap().quantity.get(), 999);
}

// =============================================================================
// Status Lifecycle
// =============================================================================

async fn placed_order(store: &PgStore) -> (Principal, OrderId) {
    let customer = Principal::user(user(store, Role::User).await);
    let book = product(store, "Co hoc luong tu", 210_000).await;
    add(store, customer.id, &book, 1).await;
    let receipt = checkout(store, ScriptedGateway::default())
        .create_order(&customer, shipping())
        .await
        .unwrap();
    (customer, receipt.order.order.id)
}

#[tokio::test]
#[ignore = "Requires running database"]
async fn test_pg_status_update_is_compare_and_set() {
    let store = store().await;
    let (_, id) = placed_order(&store).await;
    let change = StatusChange::new(OrderStatus::Confirmed, Utc::now(), None);

    let first = store
        .transition_status(id, OrderStatus::Pending, &change)
        .await
        .unwrap();
    assert_eq!(first.unwrap().status, OrderStatus::Confirmed);

    let stale = store
        .transition_status(id, OrderStatus::Pending, &change)
        .await
        .unwrap();
    assert!(stale.is_none());
}

#[tokio::test]
#[ignore = "Requires running database"]
async fn test_pg_lifecycle_enforces_transition_table() {
    let store = store().await;
    let (customer, id) = placed_order(&store).await;
    let admin = Principal::admin(user(&store, Role::Admin).await);
    let orders = OrderService::new(store.clone());

    assert!(matches!(
        orders
            .update_order_status(&admin, id, OrderStatus::Shipping, None)
            .await,
        Err(OrderError::InvalidTransition(TransitionError::NotAllowed { .. }))
    ));
    assert!(matches!(
        orders
            .update_order_status(&customer, id, OrderStatus::Confirmed, None)
            .await,
        Err(OrderError::Forbidden)
    ));

    for status in [
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipping,
        OrderStatus::Delivered,
    ] {
        orders
            .update_order_status(&admin, id, status, None)
            .await
            .unwrap();
    }

    let order = orders.get_order(&customer, id).await.unwrap().order;
    assert!(order.shipped_at.is_some());
    assert!(order.delivered_at.is_some());
    assert!(matches!(
        orders
            .update_order_status(&admin, id, OrderStatus::Cancelled, None)
            .await,
        Err(OrderError::InvalidTransition(TransitionError::Terminal {
            from: OrderStatus::Delivered
        }))
    ));
}
