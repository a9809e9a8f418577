//! Database operations for the storefront.
//!
//! # Tables
//!
//! - `users` - Accounts referenced by bearer tokens
//! - `products` - Catalog (owned by the catalog collaborator, read here)
//! - `cart_items` - One row per (user, product)
//! - `orders` - Checkout results, never deleted
//! - `order_items` - Frozen order lines
//!
//! # Stores
//!
//! Services talk to storage through the traits below. [`PgStore`] is the
//! production implementation; [`MemoryStore`] backs tests and local demos.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p edubook-cli -- migrate
//! ```

/// Column list shared by every query returning an order row.
macro_rules! order_columns {
    () => {
        r"id, order_number, user_id, status, payment_status, payment_method,
          subtotal, shipping_fee, discount, total,
          shipping_name, shipping_phone, shipping_email, shipping_address,
          shipping_city, shipping_district, shipping_ward, note,
          payment_intent_id, paid_at, shipped_at, delivered_at, cancelled_at,
          cancel_reason, created_at, updated_at"
    };
}

/// Column list shared by every query returning an order item row.
macro_rules! order_item_columns {
    () => {
        r"id, order_id, product_id, product_name, product_thumbnail, price, quantity"
    };
}

pub mod cart;
pub mod checkout;
pub mod memory;
pub mod orders;
pub mod products;

use std::future::Future;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use edubook_core::{CartLineId, OrderId, OrderStatus, ProductId, Quantity, UserId};

use crate::models::{
    CartItem, CartLine, NewOrder, NewOrderItem, Order, OrderDetail, OrderItem, Product,
    StatusChange, StoreStats,
};

pub use memory::MemoryStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate order number).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-violation into `Conflict`, everything else into `Database`.
pub(crate) fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Validate a quantity column.
pub(crate) fn stored_quantity(value: i32) -> Result<Quantity, RepositoryError> {
    Quantity::new(i64::from(value))
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid quantity in database: {e}")))
}

/// Catalog lookups.
pub trait CatalogStore: Send + Sync {
    /// Fetch a product by id, active or not.
    fn get_product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;
}

/// Cart persistence.
pub trait CartStore: Send + Sync {
    /// Whether `user` refers to an existing account.
    fn principal_exists(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// The user's cart lines joined with live product data, oldest first.
    fn cart_lines(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Vec<CartLine>, RepositoryError>> + Send;

    /// Insert a line or add to the existing one for the same product.
    ///
    /// Records `product.price` as the observed price. Returns `None` without
    /// writing when the merged quantity would exceed [`Quantity::MAX`].
    fn add_quantity(
        &self,
        user: UserId,
        product: &Product,
        quantity: Quantity,
    ) -> impl Future<Output = Result<Option<CartItem>, RepositoryError>> + Send;

    /// Overwrite a line's quantity. `None` if the line is not the user's.
    fn set_quantity(
        &self,
        user: UserId,
        line: CartLineId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<Option<CartItem>, RepositoryError>> + Send;

    /// Delete one line. `false` if the line is not the user's.
    fn remove_line(
        &self,
        user: UserId,
        line: CartLineId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Delete all of the user's lines, returning how many were removed.
    fn clear(&self, user: UserId) -> impl Future<Output = Result<u64, RepositoryError>> + Send;
}

/// Order reads and status updates.
pub trait OrderStore: Send + Sync {
    /// Orders with items, newest first. `None` lists every order.
    fn list_orders(
        &self,
        owner: Option<UserId>,
    ) -> impl Future<Output = Result<Vec<OrderDetail>, RepositoryError>> + Send;

    fn get_order(
        &self,
        id: OrderId,
    ) -> impl Future<Output = Result<Option<OrderDetail>, RepositoryError>> + Send;

    /// Compare-and-set the status.
    ///
    /// Applies `change` only if the order is currently in `from`. Returns
    /// `None` when the order is missing or its status moved on.
    fn transition_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        change: &StatusChange,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    fn stats(&self) -> impl Future<Output = Result<StoreStats, RepositoryError>> + Send;
}

/// Opens the unit of work used by checkout.
pub trait CheckoutStore: Send + Sync {
    type Tx: CheckoutTx;

    /// Start a checkout transaction. Dropping it without
    /// [`CheckoutTx::commit`] discards every write.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, RepositoryError>> + Send;
}

/// Writes performed by one checkout, all-or-nothing.
pub trait CheckoutTx: Send {
    /// Load the user's cart with live prices and lock it until commit or drop.
    fn load_cart(
        &mut self,
        user: UserId,
    ) -> impl Future<Output = Result<Vec<CartLine>, RepositoryError>> + Send;

    /// Insert the order row as pending and unpaid.
    fn save_order(
        &mut self,
        order: &NewOrder,
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;

    fn save_order_items(
        &mut self,
        order: OrderId,
        items: &[NewOrderItem],
    ) -> impl Future<Output = Result<Vec<OrderItem>, RepositoryError>> + Send;

    /// Record the payment authorization reference.
    ///
    /// Fails with `Conflict` if the order already carries one or is paid.
    fn attach_authorization(
        &mut self,
        order: OrderId,
        reference: &str,
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;

    /// Delete the ordered cart lines.
    ///
    /// Only `lines` are removed; anything the user added after
    /// [`CheckoutTx::load_cart`] stays in the cart.
    fn clear_cart(
        &mut self,
        user: UserId,
        lines: &[CartLineId],
    ) -> impl Future<Output = Result<u64, RepositoryError>> + Send;

    fn commit(self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Everything the storefront needs from storage.
pub trait Store:
    CatalogStore + CartStore + OrderStore + CheckoutStore + Clone + Send + Sync + 'static
{
    /// Readiness check.
    fn ping(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// `PostgreSQL`-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
