//! Database operations for the `products` table.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub category_id: Option<Uuid>,
    pub sku: Option<String>,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProduct<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub price: Decimal,
    pub stock: i32,
    pub category_id: Option<Uuid>,
    pub sku: Option<&'a str>,
    pub image_url: Option<&'a str>,
}

/// Sparse update: `Some(v)` overwrites, `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub category_id: Option<Uuid>,
    pub sku: Option<String>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

impl ProductUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.stock.is_none()
            && self.category_id.is_none()
            && self.sku.is_none()
            && self.image_url.is_none()
            && self.is_active.is_none()
    }
}

/// Filters for [`list_products`].
#[derive(Debug, Clone, Copy)]
pub struct ProductListFilters {
    pub category_id: Option<Uuid>,
    pub include_inactive: bool,
    pub limit: i64,
}

impl Default for ProductListFilters {
    fn default() -> Self {
        Self {
            category_id: None,
            include_inactive: false,
            limit: 50,
        }
    }
}

const PRODUCT_COLUMNS: &str = "id, name, description, price, stock, category_id, sku, \
                               image_url, is_active, created_at, updated_at";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Lists products ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_products(
    pool: &PgPool,
    filters: ProductListFilters,
) -> Result<Vec<ProductRow>, DbError> {
    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products \
         WHERE ($1::uuid IS NULL OR category_id = $1) \
           AND ($2 OR is_active = true) \
         ORDER BY name, id \
         LIMIT $3"
    ))
    .bind(filters.category_id)
    .bind(filters.include_inactive)
    .bind(filters.limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Returns a product by id regardless of `is_active`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product(pool: &PgPool, id: Uuid) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails. A duplicate `sku` is a
/// unique violation; a CHECK failure on price or stock is a database error.
pub async fn create_product(pool: &PgPool, product: &NewProduct<'_>) -> Result<ProductRow, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "INSERT INTO products (name, description, price, stock, category_id, sku, image_url) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(product.name)
    .bind(product.description)
    .bind(product.price)
    .bind(product.stock)
    .bind(product.category_id)
    .bind(product.sku)
    .bind(product.image_url)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Applies a sparse update in one statement. `None` when the id is unknown.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn update_product(
    pool: &PgPool,
    id: Uuid,
    update: &ProductUpdate,
) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "UPDATE products SET \
           name = COALESCE($2, name), \
           description = COALESCE($3, description), \
           price = COALESCE($4, price), \
           stock = COALESCE($5, stock), \
           category_id = COALESCE($6, category_id), \
           sku = COALESCE($7, sku), \
           image_url = COALESCE($8, image_url), \
           is_active = COALESCE($9, is_active), \
           updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(id)
    .bind(update.name.as_deref())
    .bind(update.description.as_deref())
    .bind(update.price)
    .bind(update.stock)
    .bind(update.category_id)
    .bind(update.sku.as_deref())
    .bind(update.image_url.as_deref())
    .bind(update.is_active)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Soft-deletes a product so existing order lines keep their reference.
///
/// Returns `true` when the product existed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn deactivate_product(pool: &PgPool, id: Uuid) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE products SET is_active = false, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
