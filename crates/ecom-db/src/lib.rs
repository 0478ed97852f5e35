use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use ecom_core::{AppConfig, CoreError, OrderStatus};

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/ecom-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    #[error("user {0} not found")]
    UserNotFound(Uuid),
    #[error("cart {0} not found")]
    CartNotFound(Uuid),
    #[error("order {0} not found")]
    OrderNotFound(Uuid),
    #[error("invalid line item: {0}")]
    InvalidLineItem(String),
    #[error("product {0} is unavailable")]
    ProductUnavailable(Uuid),
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },
    #[error("order cannot move from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },
    #[error("order {id} is {status} and can no longer be edited")]
    OrderLocked { id: Uuid, status: OrderStatus },
    #[error("cart {id} is {status} and no longer accepts changes")]
    CartNotActive { id: Uuid, status: String },
    #[error("cart {0} is not a guest cart")]
    NotAGuestCart(Uuid),
    #[error("stored order status is invalid: {0}")]
    CorruptStatus(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<CoreError> for DbError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidStatusTransition { from, to } => {
                DbError::InvalidStatusTransition { from, to }
            }
            CoreError::InvalidLineItem(msg) => DbError::InvalidLineItem(msg),
            CoreError::InvalidOrderStatus(raw) | CoreError::InvalidCartStatus(raw) => {
                DbError::CorruptStatus(raw)
            }
            other => DbError::InvalidLineItem(other.to_string()),
        }
    }
}

impl DbError {
    /// `true` when the underlying database rejected a write with a unique-constraint violation.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            DbError::Sqlx(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505")
        )
    }
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // The _sqlx_migrations table may not exist yet on a fresh database; treat
    // absence as zero applied.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Run a full health check: ping the pool and return a typed error on failure.
///
/// # Errors
///
/// Returns [`DbError`] if the ping fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    ping(pool).await?;
    Ok(())
}

pub mod carts;
pub mod categories;
pub mod orders;
pub mod products;
pub mod sessions;
pub mod stock;
pub mod users;

pub use carts::{
    add_cart_item, delete_cart, get_active_cart_for_user, get_cart_view, get_or_create_cart,
    list_cart_views, merge_guest_cart, remove_cart_item, update_cart, CartItemRow, CartLineRow,
    CartRow, CartUpdate, CartView,
};
pub use categories::{
    create_category, delete_category, get_category, list_categories, update_category,
    CategoryRow,
};
pub use orders::{
    create_order, delete_order, delete_order_item, get_order_view, list_order_items, list_orders,
    update_order_item_quantity, update_order_status, OrderItemRow, OrderRow, OrderView,
};
pub use products::{
    create_product, deactivate_product, get_product, list_products, update_product, NewProduct,
    ProductListFilters, ProductRow, ProductUpdate,
};
pub use sessions::{create_session, delete_session, find_session_user, purge_expired_sessions};
pub use users::{
    create_user, delete_user, find_credentials_by_username, get_user, list_users,
    record_login, update_user, NewUser, UserCredentialsRow, UserRow, UserUpdate,
};
