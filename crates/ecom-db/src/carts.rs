//! Carts and cart items.
//!
//! Carts never touch `products.stock`; adding or resizing a line only checks
//! that current stock would cover the resulting quantity.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use ecom_core::{CartOwner, CartStatus};

use crate::{stock, DbError};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `carts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartRow {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub session_id: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `cart_items` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartItemRow {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub added_at: DateTime<Utc>,
}

/// A cart item joined to the product's current name, price and image.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartLineRow {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub added_at: DateTime<Utc>,
    pub product_name: String,
    pub unit_price: Decimal,
    pub image_url: Option<String>,
    pub product_active: bool,
    pub line_total: Decimal,
}

#[derive(Debug, Clone)]
pub struct CartView {
    pub cart: CartRow,
    pub items: Vec<CartLineRow>,
    pub total: Decimal,
}

impl CartView {
    fn new(cart: CartRow, items: Vec<CartLineRow>) -> Self {
        let total = items.iter().map(|line| line.line_total).sum();
        Self { cart, items, total }
    }
}

/// Changes applied by [`update_cart`]. Item quantities are absolute; zero
/// removes the line.
#[derive(Debug, Clone, Default)]
pub struct CartUpdate {
    pub status: Option<CartStatus>,
    pub items: Vec<(Uuid, i32)>,
}

const CART_COLUMNS: &str = "id, user_id, session_id, status, created_at, updated_at";

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

async fn fetch_lines(
    conn: &mut PgConnection,
    cart_ids: &[Uuid],
) -> Result<Vec<CartLineRow>, DbError> {
    let rows = sqlx::query_as::<_, CartLineRow>(
        "SELECT ci.id, ci.cart_id, ci.product_id, ci.quantity, ci.added_at, \
                p.name AS product_name, p.price AS unit_price, p.image_url, \
                p.is_active AS product_active, p.price * ci.quantity AS line_total \
         FROM cart_items ci \
         JOIN products p ON p.id = ci.product_id \
         WHERE ci.cart_id = ANY($1) \
         ORDER BY ci.added_at, ci.id",
    )
    .bind(cart_ids)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

async fn load_view(conn: &mut PgConnection, cart_id: Uuid) -> Result<Option<CartView>, DbError> {
    let cart = sqlx::query_as::<_, CartRow>(&format!(
        "SELECT {CART_COLUMNS} FROM carts WHERE id = $1"
    ))
    .bind(cart_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(cart) = cart else {
        return Ok(None);
    };
    let items = fetch_lines(conn, &[cart.id]).await?;
    Ok(Some(CartView::new(cart, items)))
}

async fn attach_lines(
    conn: &mut PgConnection,
    carts: Vec<CartRow>,
) -> Result<Vec<CartView>, DbError> {
    let ids: Vec<Uuid> = carts.iter().map(|c| c.id).collect();
    let mut lines = fetch_lines(conn, &ids).await?;

    let views = carts
        .into_iter()
        .map(|cart| {
            let (mine, rest): (Vec<_>, Vec<_>) =
                lines.drain(..).partition(|line| line.cart_id == cart.id);
            lines = rest;
            CartView::new(cart, mine)
        })
        .collect();
    Ok(views)
}

/// Locks a cart row for the rest of the transaction and checks it is active.
async fn lock_active_cart(conn: &mut PgConnection, cart_id: Uuid) -> Result<CartRow, DbError> {
    let cart = lock_cart(conn, cart_id).await?;
    if cart.status != CartStatus::Active.as_str() {
        return Err(DbError::CartNotActive {
            id: cart.id,
            status: cart.status,
        });
    }
    Ok(cart)
}

async fn lock_cart(conn: &mut PgConnection, cart_id: Uuid) -> Result<CartRow, DbError> {
    sqlx::query_as::<_, CartRow>(&format!(
        "SELECT {CART_COLUMNS} FROM carts WHERE id = $1 FOR UPDATE"
    ))
    .bind(cart_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(DbError::CartNotFound(cart_id))
}

async fn touch_cart(conn: &mut PgConnection, cart_id: Uuid) -> Result<(), DbError> {
    sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
        .bind(cart_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Finds or creates the active cart for `user_id` inside the caller's transaction.
async fn active_user_cart(conn: &mut PgConnection, user_id: Uuid) -> Result<CartRow, DbError> {
    // The partial unique index allows one active cart per user; a concurrent
    // creator makes our insert a no-op and the follow-up select finds theirs.
    sqlx::query(
        "INSERT INTO carts (user_id) VALUES ($1) \
         ON CONFLICT (user_id) WHERE status = 'active' AND user_id IS NOT NULL DO NOTHING",
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    let cart = sqlx::query_as::<_, CartRow>(&format!(
        "SELECT {CART_COLUMNS} FROM carts \
         WHERE user_id = $1 AND status = 'active' \
         FOR UPDATE"
    ))
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(cart)
}

async fn ensure_user_exists(conn: &mut PgConnection, user_id: Uuid) -> Result<(), DbError> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
    if exists {
        Ok(())
    } else {
        Err(DbError::UserNotFound(user_id))
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns the owner's active cart, creating it on first use.
///
/// # Errors
///
/// - [`DbError::UserNotFound`] if a user owner does not exist.
/// - [`DbError::Sqlx`] if a query fails.
pub async fn get_or_create_cart(pool: &PgPool, owner: &CartOwner) -> Result<CartView, DbError> {
    let mut tx = pool.begin().await?;

    let cart = match owner {
        CartOwner::User(user_id) => {
            ensure_user_exists(&mut tx, *user_id).await?;
            active_user_cart(&mut tx, *user_id).await?
        }
        CartOwner::Guest(session_id) => {
            let existing = sqlx::query_as::<_, CartRow>(&format!(
                "SELECT {CART_COLUMNS} FROM carts \
                 WHERE session_id = $1 AND status = 'active' \
                 ORDER BY created_at \
                 LIMIT 1"
            ))
            .bind(session_id)
            .fetch_optional(&mut *tx)
            .await?;
            match existing {
                Some(cart) => cart,
                None => {
                    sqlx::query_as::<_, CartRow>(&format!(
                        "INSERT INTO carts (session_id) VALUES ($1) RETURNING {CART_COLUMNS}"
                    ))
                    .bind(session_id)
                    .fetch_one(&mut *tx)
                    .await?
                }
            }
        }
    };

    let items = fetch_lines(&mut tx, &[cart.id]).await?;
    tx.commit().await?;
    Ok(CartView::new(cart, items))
}

/// Lists carts with their items, newest first. `session_id` narrows the
/// result to one browser session.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails.
pub async fn list_cart_views(
    pool: &PgPool,
    session_id: Option<&str>,
) -> Result<Vec<CartView>, DbError> {
    let mut conn = pool.acquire().await?;
    let carts = sqlx::query_as::<_, CartRow>(&format!(
        "SELECT {CART_COLUMNS} FROM carts \
         WHERE ($1::text IS NULL OR session_id = $1) \
         ORDER BY created_at DESC, id"
    ))
    .bind(session_id)
    .fetch_all(&mut *conn)
    .await?;
    attach_lines(&mut conn, carts).await
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails.
pub async fn get_cart_view(pool: &PgPool, cart_id: Uuid) -> Result<Option<CartView>, DbError> {
    let mut conn = pool.acquire().await?;
    load_view(&mut conn, cart_id).await
}

/// Returns the user's active cart without creating one.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails.
pub async fn get_active_cart_for_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<CartView>, DbError> {
    let mut conn = pool.acquire().await?;
    let cart = sqlx::query_as::<_, CartRow>(&format!(
        "SELECT {CART_COLUMNS} FROM carts WHERE user_id = $1 AND status = 'active'"
    ))
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    match cart {
        Some(cart) => {
            let items = fetch_lines(&mut conn, &[cart.id]).await?;
            Ok(Some(CartView::new(cart, items)))
        }
        None => Ok(None),
    }
}

/// Adds `quantity` units of a product to a cart.
///
/// An existing line for the same product is incremented; current stock must
/// cover the resulting quantity.
///
/// # Errors
///
/// - [`DbError::CartNotFound`] / [`DbError::CartNotActive`] for a bad cart.
/// - [`DbError::InvalidLineItem`] if `quantity` is not positive or the sum overflows.
/// - [`DbError::ProductUnavailable`] / [`DbError::InsufficientStock`] from the stock check.
/// - [`DbError::Sqlx`] if a query fails.
pub async fn add_cart_item(
    pool: &PgPool,
    cart_id: Uuid,
    product_id: Uuid,
    quantity: i32,
) -> Result<CartItemRow, DbError> {
    if quantity <= 0 {
        return Err(DbError::InvalidLineItem(format!(
            "quantity must be positive, got {quantity}"
        )));
    }

    let mut tx = pool.begin().await?;
    lock_active_cart(&mut tx, cart_id).await?;

    let existing = sqlx::query_scalar::<_, i32>(
        "SELECT quantity FROM cart_items WHERE cart_id = $1 AND product_id = $2 FOR UPDATE",
    )
    .bind(cart_id)
    .bind(product_id)
    .fetch_optional(&mut *tx)
    .await?
    .unwrap_or(0);

    let resulting = existing.checked_add(quantity).ok_or_else(|| {
        DbError::InvalidLineItem(format!("quantity {existing} + {quantity} is too large"))
    })?;
    stock::ensure_available(&mut tx, product_id, resulting).await?;

    let item = sqlx::query_as::<_, CartItemRow>(
        "INSERT INTO cart_items (cart_id, product_id, quantity) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity \
         RETURNING id, cart_id, product_id, quantity, added_at",
    )
    .bind(cart_id)
    .bind(product_id)
    .bind(resulting)
    .fetch_one(&mut *tx)
    .await?;

    touch_cart(&mut tx, cart_id).await?;
    tx.commit().await?;

    tracing::debug!(%cart_id, %product_id, quantity = resulting, "cart line saved");
    Ok(item)
}

/// Sets absolute item quantities and/or the cart status in one transaction.
///
/// Item changes are only accepted while the cart is active; a status-only
/// update is accepted in any state.
///
/// # Errors
///
/// - [`DbError::CartNotFound`] / [`DbError::CartNotActive`] for a bad cart.
/// - [`DbError::InvalidLineItem`] for a negative quantity.
/// - [`DbError::ProductUnavailable`] / [`DbError::InsufficientStock`] from the stock check.
/// - [`DbError::Sqlx`] if a query fails, including the one-active-cart-per-user index.
pub async fn update_cart(
    pool: &PgPool,
    cart_id: Uuid,
    update: &CartUpdate,
) -> Result<CartView, DbError> {
    let mut tx = pool.begin().await?;

    if update.items.is_empty() {
        lock_cart(&mut tx, cart_id).await?;
    } else {
        lock_active_cart(&mut tx, cart_id).await?;
    }

    for &(product_id, quantity) in &update.items {
        if quantity < 0 {
            return Err(DbError::InvalidLineItem(format!(
                "quantity must not be negative, got {quantity}"
            )));
        }
        if quantity == 0 {
            sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2")
                .bind(cart_id)
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
            continue;
        }
        stock::ensure_available(&mut tx, product_id, quantity).await?;
        sqlx::query(
            "INSERT INTO cart_items (cart_id, product_id, quantity) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *tx)
        .await?;
    }

    if let Some(status) = update.status {
        sqlx::query("UPDATE carts SET status = $2 WHERE id = $1")
            .bind(cart_id)
            .bind(status.as_str())
            .execute(&mut *tx)
            .await?;
    }
    touch_cart(&mut tx, cart_id).await?;

    let view = load_view(&mut tx, cart_id)
        .await?
        .ok_or(DbError::CartNotFound(cart_id))?;
    tx.commit().await?;
    Ok(view)
}

/// Removes one line from a cart. Returns `false` if the line is not in that cart.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn remove_cart_item(pool: &PgPool, cart_id: Uuid, item_id: Uuid) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND cart_id = $2")
        .bind(item_id)
        .bind(cart_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Deletes a cart and, by cascade, its items.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn delete_cart(pool: &PgPool, cart_id: Uuid) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM carts WHERE id = $1")
        .bind(cart_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Moves every line of a guest cart into the user's active cart and deletes
/// the guest cart.
///
/// A product present in both carts ends up with the summed quantity.
///
/// # Errors
///
/// - [`DbError::CartNotFound`] if the guest cart does not exist.
/// - [`DbError::NotAGuestCart`] if the cart belongs to a user.
/// - [`DbError::UserNotFound`] if the target user does not exist.
/// - [`DbError::InvalidLineItem`] if a summed quantity would not fit in an `INTEGER`.
/// - [`DbError::Sqlx`] if a query fails.
pub async fn merge_guest_cart(
    pool: &PgPool,
    guest_cart_id: Uuid,
    user_id: Uuid,
) -> Result<CartView, DbError> {
    let mut tx = pool.begin().await?;

    let guest = lock_cart(&mut tx, guest_cart_id).await?;
    if guest.user_id.is_some() {
        return Err(DbError::NotAGuestCart(guest_cart_id));
    }
    ensure_user_exists(&mut tx, user_id).await?;
    let target = active_user_cart(&mut tx, user_id).await?;

    let overflow = sqlx::query_as::<_, (Uuid, i64)>(
        "SELECT g.product_id, g.quantity::BIGINT + u.quantity::BIGINT \
         FROM cart_items g \
         JOIN cart_items u ON u.product_id = g.product_id AND u.cart_id = $1 \
         WHERE g.cart_id = $2 AND g.quantity::BIGINT + u.quantity::BIGINT > $3 \
         ORDER BY g.product_id LIMIT 1",
    )
    .bind(target.id)
    .bind(guest_cart_id)
    .bind(i64::from(i32::MAX))
    .fetch_optional(&mut *tx)
    .await?;
    if let Some((product_id, total)) = overflow {
        return Err(DbError::InvalidLineItem(format!(
            "merged quantity {total} for product {product_id} is too large"
        )));
    }

    let moved = sqlx::query(
        "INSERT INTO cart_items (cart_id, product_id, quantity, added_at) \
         SELECT $1, product_id, quantity, added_at FROM cart_items WHERE cart_id = $2 \
         ON CONFLICT (cart_id, product_id) \
         DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity",
    )
    .bind(target.id)
    .bind(guest_cart_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    sqlx::query("DELETE FROM carts WHERE id = $1")
        .bind(guest_cart_id)
        .execute(&mut *tx)
        .await?;
    touch_cart(&mut tx, target.id).await?;

    let view = load_view(&mut tx, target.id)
        .await?
        .ok_or(DbError::CartNotFound(target.id))?;
    tx.commit().await?;

    tracing::info!(%guest_cart_id, cart_id = %target.id, %user_id, moved, "guest cart merged");
    Ok(view)
}
