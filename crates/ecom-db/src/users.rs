//! Database operations for the `users` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{orders, DbError};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `users` table without the password hash.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub is_email_verified: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The subset of a user needed to check a login attempt.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserCredentialsRow {
    pub id: Uuid,
    pub password_hash: String,
    pub is_active: bool,
}

/// Fields for a new user. `password_hash` must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub phone: Option<&'a str>,
}

/// Sparse update: `Some(v)` overwrites, `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
    pub is_email_verified: Option<bool>,
}

impl UserUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone.is_none()
            && self.is_active.is_none()
            && self.is_email_verified.is_none()
    }
}

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, phone, is_active, \
                            is_email_verified, last_login_at, created_at, updated_at";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns every user, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_users(pool: &PgPool) -> Result<Vec<UserRow>, DbError> {
    let rows = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at, username"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Returns a single user by id, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user(pool: &PgPool, id: Uuid) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Looks up the stored hash for a login attempt.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_credentials_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<UserCredentialsRow>, DbError> {
    let row = sqlx::query_as::<_, UserCredentialsRow>(
        "SELECT id, password_hash, is_active FROM users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Inserts a user and returns the stored row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails; a duplicate username or
/// email surfaces as a unique violation (see [`DbError::is_unique_violation`]).
pub async fn create_user(pool: &PgPool, user: &NewUser<'_>) -> Result<UserRow, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "INSERT INTO users (username, email, password_hash, first_name, last_name, phone) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(user.username)
    .bind(user.email)
    .bind(user.password_hash)
    .bind(user.first_name)
    .bind(user.last_name)
    .bind(user.phone)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Applies a sparse update in a single `UPDATE … RETURNING`.
///
/// Returns `None` when no user has the given id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, including unique violations.
pub async fn update_user(
    pool: &PgPool,
    id: Uuid,
    update: &UserUpdate,
) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "UPDATE users SET \
           username = COALESCE($2, username), \
           email = COALESCE($3, email), \
           password_hash = COALESCE($4, password_hash), \
           first_name = COALESCE($5, first_name), \
           last_name = COALESCE($6, last_name), \
           phone = COALESCE($7, phone), \
           is_active = COALESCE($8, is_active), \
           is_email_verified = COALESCE($9, is_email_verified), \
           updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .bind(update.username.as_deref())
    .bind(update.email.as_deref())
    .bind(update.password_hash.as_deref())
    .bind(update.first_name.as_deref())
    .bind(update.last_name.as_deref())
    .bind(update.phone.as_deref())
    .bind(update.is_active)
    .bind(update.is_email_verified)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Deletes a user. Carts, orders and sessions cascade; stock held by the
/// user's orders is returned first, in the same transaction.
///
/// Returns `true` when a row was removed.
///
/// # Errors
///
/// - [`DbError::CorruptStatus`] if one of the user's orders has an unknown status.
/// - [`DbError::Sqlx`] if a query fails.
pub async fn delete_user(pool: &PgPool, id: Uuid) -> Result<bool, DbError> {
    let mut tx = pool.begin().await?;

    let exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();
    if !exists {
        return Ok(false);
    }

    orders::release_user_orders(&mut tx, id).await?;

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(user_id = %id, "user deleted");
    Ok(true)
}

/// Stamps `last_login_at` after a successful login.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn record_login(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
