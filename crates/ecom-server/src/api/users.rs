//! User management and registration.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use ecom_core::password::hash_password;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, parse_id, ApiError, ApiResponse, AppState, Deleted};

// ---------------------------------------------------------------------------
// Bodies
// ---------------------------------------------------------------------------

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UserItem {
    pub id: uuid::Uuid,
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

impl From<ecom_db::UserRow> for UserItem {
    fn from(row: ecom_db::UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
            is_active: row.is_active,
            is_email_verified: row.is_email_verified,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
    pub is_email_verified: Option<bool>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_username(rid: &str, username: &str) -> Result<(), ApiError> {
    if username.is_empty() || username.chars().count() > 50 {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "username must be 1–50 characters",
        ));
    }
    Ok(())
}

fn validate_email(rid: &str, email: &str) -> Result<(), ApiError> {
    if email.len() < 3 || !email.contains('@') {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "email must be a valid address",
        ));
    }
    Ok(())
}

fn validate_password(rid: &str, password: &str) -> Result<(), ApiError> {
    if password.is_empty() {
        return Err(ApiError::new(rid, "validation_error", "password is required"));
    }
    Ok(())
}

/// Runs Argon2 on the blocking pool.
async fn hash_blocking(rid: &str, password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "password hashing task failed");
            ApiError::new(rid, "internal_error", "password hashing failed")
        })?
        .map_err(|e| {
            tracing::error!(error = %e, "password hashing failed");
            ApiError::new(rid, "internal_error", "password hashing failed")
        })
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/users and /api/users/register
pub(super) async fn register(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserItem>>), ApiError> {
    let rid = &req_id.0;

    let username = body.username.trim().to_owned();
    let email = body.email.trim().to_lowercase();
    validate_username(rid, &username)?;
    validate_email(rid, &email)?;
    validate_password(rid, &body.password)?;

    let password_hash = hash_blocking(rid, body.password).await?;
    let first_name = trimmed(body.first_name);
    let last_name = trimmed(body.last_name);
    let phone = trimmed(body.phone);

    let row = ecom_db::create_user(
        &state.pool,
        &ecom_db::NewUser {
            username: &username,
            email: &email,
            password_hash: &password_hash,
            first_name: first_name.as_deref(),
            last_name: last_name.as_deref(),
            phone: phone.as_deref(),
        },
    )
    .await
    .map_err(|e| {
        if e.is_unique_violation() {
            ApiError::new(rid, "duplicate", "username or email already exists")
        } else {
            map_db_error(rid.clone(), &e)
        }
    })?;

    tracing::info!(user_id = %row.id, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(UserItem::from(row), req_id.0)),
    ))
}

/// GET /api/users
pub(super) async fn list_users(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<UserItem>>>, ApiError> {
    let rows = ecom_db::list_users(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let data = rows.into_iter().map(UserItem::from).collect();
    Ok(Json(ApiResponse::new(data, req_id.0)))
}

/// GET /api/users/:id
pub(super) async fn get_user(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<UserItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "user")?;
    let row = ecom_db::get_user(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", format!("user {id} not found")))?;
    Ok(Json(ApiResponse::new(UserItem::from(row), req_id.0)))
}

/// PUT /api/users/:id — sparse update.
pub(super) async fn update_user(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "user")?;

    let username = body.username.map(|u| u.trim().to_owned());
    if let Some(ref username) = username {
        validate_username(rid, username)?;
    }
    let email = body.email.map(|e| e.trim().to_lowercase());
    if let Some(ref email) = email {
        validate_email(rid, email)?;
    }
    let password_hash = match body.password {
        Some(password) => {
            validate_password(rid, &password)?;
            Some(hash_blocking(rid, password).await?)
        }
        None => None,
    };

    let update = ecom_db::UserUpdate {
        username,
        email,
        password_hash,
        first_name: body.first_name,
        last_name: body.last_name,
        phone: body.phone,
        is_active: body.is_active,
        is_email_verified: body.is_email_verified,
    };
    if update.is_empty() {
        return Err(ApiError::new(rid, "bad_request", "no fields to update"));
    }

    let row = ecom_db::update_user(&state.pool, id, &update)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", format!("user {id} not found")))?;
    Ok(Json(ApiResponse::new(UserItem::from(row), req_id.0)))
}

/// DELETE /api/users/:id
pub(super) async fn delete_user(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Deleted>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "user")?;
    let deleted = ecom_db::delete_user(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if !deleted {
        return Err(ApiError::new(rid, "not_found", format!("user {id} not found")));
    }
    Ok(Json(ApiResponse::new(Deleted { deleted: true }, req_id.0)))
}
