//! Stock ledger.
//!
//! Every function takes a `&mut PgConnection` so callers run it inside their
//! own transaction; stock only ever moves together with the order rows that
//! justify the movement.

use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::DbError;

#[derive(Debug, sqlx::FromRow)]
struct StockSnapshot {
    stock: i32,
    is_active: bool,
}

/// Takes `quantity` units of a product and returns its current unit price.
///
/// The decrement is one conditional `UPDATE`, so two concurrent reservations
/// can never drive stock below zero.
///
/// # Errors
///
/// - [`DbError::ProductUnavailable`] if the product is missing or inactive.
/// - [`DbError::InsufficientStock`] if fewer than `quantity` units remain.
/// - [`DbError::Sqlx`] if a query fails.
pub async fn reserve(
    conn: &mut PgConnection,
    product_id: Uuid,
    quantity: i32,
) -> Result<Decimal, DbError> {
    let price = sqlx::query_scalar::<_, Decimal>(
        "UPDATE products \
         SET stock = stock - $2, updated_at = NOW() \
         WHERE id = $1 AND is_active = true AND stock >= $2 \
         RETURNING price",
    )
    .bind(product_id)
    .bind(quantity)
    .fetch_optional(&mut *conn)
    .await?;

    match price {
        Some(price) => Ok(price),
        None => Err(classify_shortfall(conn, product_id, quantity).await?),
    }
}

/// Returns `quantity` units to a product. Inactive products still get their
/// stock back.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn release(
    conn: &mut PgConnection,
    product_id: Uuid,
    quantity: i32,
) -> Result<(), DbError> {
    sqlx::query("UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Confirms a product is active and has at least `quantity` units, without
/// moving stock. Used by carts, which never reserve.
///
/// # Errors
///
/// Same as [`reserve`].
pub async fn ensure_available(
    conn: &mut PgConnection,
    product_id: Uuid,
    quantity: i32,
) -> Result<(), DbError> {
    let snapshot = fetch_snapshot(conn, product_id).await?;
    match snapshot {
        Some(p) if p.is_active && p.stock >= quantity => Ok(()),
        Some(p) if p.is_active => Err(DbError::InsufficientStock {
            product_id,
            requested: quantity,
            available: p.stock,
        }),
        _ => Err(DbError::ProductUnavailable(product_id)),
    }
}

async fn classify_shortfall(
    conn: &mut PgConnection,
    product_id: Uuid,
    quantity: i32,
) -> Result<DbError, DbError> {
    let snapshot = fetch_snapshot(conn, product_id).await?;
    Ok(match snapshot {
        Some(p) if p.is_active => DbError::InsufficientStock {
            product_id,
            requested: quantity,
            available: p.stock,
        },
        _ => DbError::ProductUnavailable(product_id),
    })
}

async fn fetch_snapshot(
    conn: &mut PgConnection,
    product_id: Uuid,
) -> Result<Option<StockSnapshot>, DbError> {
    let snapshot = sqlx::query_as::<_, StockSnapshot>(
        "SELECT stock, is_active FROM products WHERE id = $1",
    )
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(snapshot)
}
