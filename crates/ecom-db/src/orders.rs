//! Orders and order items.
//!
//! Every mutation runs in one transaction together with the stock movement it
//! implies; an error anywhere drops the transaction uncommitted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use ecom_core::{OrderLine, OrderStatus};

use crate::{stock, DbError};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `orders` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRow {
    /// Parses the stored status.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::CorruptStatus`] if the column holds an unknown value.
    pub fn status(&self) -> Result<OrderStatus, DbError> {
        self.status
            .parse::<OrderStatus>()
            .map_err(|_| DbError::CorruptStatus(self.status.clone()))
    }
}

/// An order item joined to the product name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub price_at_time: Decimal,
    pub created_at: DateTime<Utc>,
}

impl OrderItemRow {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price_at_time * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone)]
pub struct OrderView {
    pub order: OrderRow,
    pub items: Vec<OrderItemRow>,
    pub total: Decimal,
}

impl OrderView {
    fn new(order: OrderRow, items: Vec<OrderItemRow>) -> Self {
        let total = items.iter().map(OrderItemRow::line_total).sum();
        Self {
            order,
            items,
            total,
        }
    }
}

const ORDER_COLUMNS: &str = "id, user_id, status, created_at, updated_at";

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

async fn fetch_items(
    conn: &mut PgConnection,
    order_ids: &[Uuid],
) -> Result<Vec<OrderItemRow>, DbError> {
    let rows = sqlx::query_as::<_, OrderItemRow>(
        "SELECT oi.id, oi.order_id, oi.product_id, p.name AS product_name, oi.quantity, \
                oi.price_at_time, oi.created_at \
         FROM order_items oi \
         JOIN products p ON p.id = oi.product_id \
         WHERE oi.order_id = ANY($1) \
         ORDER BY oi.created_at, oi.id",
    )
    .bind(order_ids)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

async fn load_view(conn: &mut PgConnection, order_id: Uuid) -> Result<Option<OrderView>, DbError> {
    let order = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
    ))
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(order) = order else {
        return Ok(None);
    };
    let items = fetch_items(conn, &[order.id]).await?;
    Ok(Some(OrderView::new(order, items)))
}

async fn lock_order(conn: &mut PgConnection, order_id: Uuid) -> Result<OrderRow, DbError> {
    sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
    ))
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(DbError::OrderNotFound(order_id))
}

async fn lock_editable_order(conn: &mut PgConnection, order_id: Uuid) -> Result<OrderRow, DbError> {
    let order = lock_order(conn, order_id).await?;
    let status = order.status()?;
    if !status.is_editable() {
        return Err(DbError::OrderLocked {
            id: order_id,
            status,
        });
    }
    Ok(order)
}

/// Puts back the stock held by every item of an order, in product-id order.
async fn release_all(conn: &mut PgConnection, order_id: Uuid) -> Result<(), DbError> {
    let held = sqlx::query_as::<_, (Uuid, i64)>(
        "SELECT product_id, SUM(quantity)::BIGINT FROM order_items \
         WHERE order_id = $1 \
         GROUP BY product_id \
         ORDER BY product_id",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    for (product_id, quantity) in held {
        let quantity = i32::try_from(quantity).map_err(|_| {
            DbError::InvalidLineItem(format!("held quantity {quantity} exceeds stock range"))
        })?;
        stock::release(conn, product_id, quantity).await?;
    }
    Ok(())
}

/// Returns the stock held by every order of `user_id` ahead of the user's
/// removal. Cancelled orders were already released.
pub(crate) async fn release_user_orders(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<(), DbError> {
    let orders = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY id FOR UPDATE"
    ))
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    for order in &orders {
        if order.status()?.holds_stock() {
            release_all(conn, order.id).await?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Creates an order for `user_id` from validated lines and decrements stock.
///
/// Each line snapshots the product's current price unless it carries an
/// override. Lines are reserved in product-id order so concurrent orders lock
/// products in the same sequence.
///
/// # Errors
///
/// - [`DbError::InvalidLineItem`] if `lines` is empty.
/// - [`DbError::UserNotFound`] if the user does not exist.
/// - [`DbError::ProductUnavailable`] / [`DbError::InsufficientStock`] for any line;
///   nothing is persisted in that case.
/// - [`DbError::Sqlx`] if a query fails.
pub async fn create_order(
    pool: &PgPool,
    user_id: Uuid,
    lines: &[OrderLine],
) -> Result<OrderView, DbError> {
    if lines.is_empty() {
        return Err(DbError::InvalidLineItem(
            "an order needs at least one item".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let user_exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
    if !user_exists {
        return Err(DbError::UserNotFound(user_id));
    }

    let order = sqlx::query_as::<_, OrderRow>(&format!(
        "INSERT INTO orders (user_id) VALUES ($1) RETURNING {ORDER_COLUMNS}"
    ))
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;

    let mut reservation_order: Vec<usize> = (0..lines.len()).collect();
    reservation_order.sort_by_key(|&i| lines[i].product_id);

    let mut prices = vec![Decimal::ZERO; lines.len()];
    for i in reservation_order {
        let line = &lines[i];
        let current_price = stock::reserve(&mut tx, line.product_id, line.quantity).await?;
        prices[i] = line.price_at_time.unwrap_or(current_price);
    }

    for (line, price) in lines.iter().zip(prices) {
        sqlx::query(
            "INSERT INTO order_items (order_id, product_id, quantity, price_at_time) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(order.id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(price)
        .execute(&mut *tx)
        .await?;
    }

    let items = fetch_items(&mut tx, &[order.id]).await?;
    tx.commit().await?;

    tracing::info!(order_id = %order.id, %user_id, lines = items.len(), "order created");
    Ok(OrderView::new(order, items))
}

/// Lists orders with their items, newest first, optionally for one user.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails.
pub async fn list_orders(pool: &PgPool, user_id: Option<Uuid>) -> Result<Vec<OrderView>, DbError> {
    let mut conn = pool.acquire().await?;
    let orders = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders \
         WHERE ($1::uuid IS NULL OR user_id = $1) \
         ORDER BY created_at DESC, id"
    ))
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let mut items = fetch_items(&mut conn, &ids).await?;

    let views = orders
        .into_iter()
        .map(|order| {
            let (mine, rest): (Vec<_>, Vec<_>) =
                items.drain(..).partition(|item| item.order_id == order.id);
            items = rest;
            OrderView::new(order, mine)
        })
        .collect();
    Ok(views)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails.
pub async fn get_order_view(pool: &PgPool, order_id: Uuid) -> Result<Option<OrderView>, DbError> {
    let mut conn = pool.acquire().await?;
    load_view(&mut conn, order_id).await
}

/// # Errors
///
/// - [`DbError::OrderNotFound`] if the order does not exist.
/// - [`DbError::Sqlx`] if a query fails.
pub async fn list_order_items(
    pool: &PgPool,
    order_id: Uuid,
) -> Result<Vec<OrderItemRow>, DbError> {
    let mut conn = pool.acquire().await?;
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)")
        .bind(order_id)
        .fetch_one(&mut *conn)
        .await?;
    if !exists {
        return Err(DbError::OrderNotFound(order_id));
    }
    fetch_items(&mut conn, &[order_id]).await
}

/// Moves an order to `next`.
///
/// Writing the current status again is a no-op. Moving to `cancelled`
/// releases the stock held by every item in the same transaction.
///
/// # Errors
///
/// - [`DbError::OrderNotFound`] if the order does not exist.
/// - [`DbError::InvalidStatusTransition`] for an edge the lifecycle does not allow.
/// - [`DbError::Sqlx`] if a query fails.
pub async fn update_order_status(
    pool: &PgPool,
    order_id: Uuid,
    next: OrderStatus,
) -> Result<OrderView, DbError> {
    let mut tx = pool.begin().await?;

    let order = lock_order(&mut tx, order_id).await?;
    let current = order.status()?;

    if let Some(next) = current.transition(next)? {
        if next == OrderStatus::Cancelled {
            release_all(&mut tx, order_id).await?;
        }
        sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(order_id)
            .bind(next.as_str())
            .execute(&mut *tx)
            .await?;
        tracing::info!(%order_id, from = %current, to = %next, "order status changed");
    }

    let view = load_view(&mut tx, order_id)
        .await?
        .ok_or(DbError::OrderNotFound(order_id))?;
    tx.commit().await?;
    Ok(view)
}

/// Sets an item's quantity and moves stock by the difference.
///
/// # Errors
///
/// - [`DbError::InvalidLineItem`] if `quantity` is not positive.
/// - [`DbError::OrderNotFound`] / [`DbError::NotFound`] for an unknown order or item.
/// - [`DbError::OrderLocked`] once the order has shipped or was cancelled.
/// - [`DbError::ProductUnavailable`] / [`DbError::InsufficientStock`] when an
///   increase cannot be covered; nothing changes in that case.
/// - [`DbError::Sqlx`] if a query fails.
pub async fn update_order_item_quantity(
    pool: &PgPool,
    order_id: Uuid,
    item_id: Uuid,
    quantity: i32,
) -> Result<OrderItemRow, DbError> {
    if quantity <= 0 {
        return Err(DbError::InvalidLineItem(format!(
            "quantity must be positive, got {quantity}"
        )));
    }

    let mut tx = pool.begin().await?;
    lock_editable_order(&mut tx, order_id).await?;

    let (product_id, old_quantity) = sqlx::query_as::<_, (Uuid, i32)>(
        "SELECT product_id, quantity FROM order_items \
         WHERE id = $1 AND order_id = $2 \
         FOR UPDATE",
    )
    .bind(item_id)
    .bind(order_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(DbError::NotFound)?;

    let delta = quantity - old_quantity;
    if delta > 0 {
        stock::reserve(&mut tx, product_id, delta).await?;
    } else if delta < 0 {
        stock::release(&mut tx, product_id, -delta).await?;
    }

    sqlx::query("UPDATE order_items SET quantity = $2 WHERE id = $1")
        .bind(item_id)
        .bind(quantity)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE orders SET updated_at = NOW() WHERE id = $1")
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

    let item = fetch_items(&mut tx, &[order_id])
        .await?
        .into_iter()
        .find(|item| item.id == item_id)
        .ok_or(DbError::NotFound)?;
    tx.commit().await?;
    Ok(item)
}

/// Removes an item and returns its full quantity to stock.
///
/// # Errors
///
/// - [`DbError::OrderNotFound`] / [`DbError::NotFound`] for an unknown order or item.
/// - [`DbError::OrderLocked`] once the order has shipped or was cancelled.
/// - [`DbError::Sqlx`] if a query fails.
pub async fn delete_order_item(pool: &PgPool, order_id: Uuid, item_id: Uuid) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;
    lock_editable_order(&mut tx, order_id).await?;

    let (product_id, quantity) = sqlx::query_as::<_, (Uuid, i32)>(
        "DELETE FROM order_items WHERE id = $1 AND order_id = $2 \
         RETURNING product_id, quantity",
    )
    .bind(item_id)
    .bind(order_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(DbError::NotFound)?;

    stock::release(&mut tx, product_id, quantity).await?;
    sqlx::query("UPDATE orders SET updated_at = NOW() WHERE id = $1")
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Deletes an order, first returning its items' stock unless the order was
/// cancelled (cancellation already released it).
///
/// # Errors
///
/// - [`DbError::OrderNotFound`] if the order does not exist.
/// - [`DbError::Sqlx`] if a query fails.
pub async fn delete_order(pool: &PgPool, order_id: Uuid) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    let order = lock_order(&mut tx, order_id).await?;
    if order.status()?.holds_stock() {
        release_all(&mut tx, order_id).await?;
    }

    sqlx::query("DELETE FROM orders WHERE id = $1")
        .bind(order_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(%order_id, status = %order.status, "order deleted");
    Ok(())
}
