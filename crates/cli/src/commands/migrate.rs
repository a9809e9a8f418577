//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! edubook-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! Stored in `crates/storefront/migrations/` and embedded at compile time:
//!
//! ```text
//! migrations/
//! ├── 20260301000001_create_enums.sql
//! ├── 20260301000002_create_users.sql
//! ├── 20260301000003_create_products.sql
//! └── ...
//! ```

use edubook_storefront::db::create_pool;

use super::{CommandError, database_url};

/// Apply every pending storefront migration.
///
/// # Errors
///
/// Returns `CommandError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let database_url = database_url()?;

    tracing::info!("Connecting to storefront database...");
    let pool = create_pool(&database_url).await?;

    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
