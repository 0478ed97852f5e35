//! Login, logout and the current-user profile.

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{Duration, Utc};
use ecom_core::password::verify_password;
use serde::{Deserialize, Serialize};

use crate::middleware::{CurrentUser, RequestId};
use crate::session::{
    clear_session_cookie, extract_cookie, generate_token, hash_token, session_cookie,
    SESSION_COOKIE,
};

use super::users::UserItem;
use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct LoggedOut {
    pub logged_out: bool,
}

fn invalid_credentials(rid: &str) -> ApiError {
    ApiError::new(rid, "unauthorized", "invalid username or password")
}

/// Checks a username/password pair. `None` for unknown users, wrong
/// passwords and deactivated accounts alike.
async fn verify_credentials(
    state: &AppState,
    rid: &str,
    username: &str,
    password: String,
) -> Result<Option<uuid::Uuid>, ApiError> {
    let Some(creds) = ecom_db::find_credentials_by_username(&state.pool, username)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?
    else {
        return Ok(None);
    };

    let stored = creds.password_hash;
    let matches = tokio::task::spawn_blocking(move || verify_password(&stored, &password))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "password verification task failed");
            ApiError::new(rid, "internal_error", "login failed")
        })?
        .unwrap_or_else(|e| {
            tracing::warn!(user_id = %creds.id, error = %e, "stored password hash is unreadable");
            false
        });

    Ok((matches && creds.is_active).then_some(creds.id))
}

/// POST /api/login
pub(super) async fn login(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rid = &req_id.0;
    let username = body.username.trim();

    let Some(user_id) = verify_credentials(&state, rid, username, body.password).await? else {
        tracing::info!(username, "login rejected");
        return Err(invalid_credentials(rid));
    };

    let token = generate_token();
    let ttl_hours = state.settings.session_ttl_hours;
    let expires_at = Utc::now() + Duration::hours(ttl_hours);
    ecom_db::create_session(&state.pool, &hash_token(&token), user_id, expires_at)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    ecom_db::record_login(&state.pool, user_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let user = ecom_db::get_user(&state.pool, user_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| invalid_credentials(rid))?;

    let mut headers = HeaderMap::new();
    if let Some(cookie) = session_cookie(&token, ttl_hours * 3600, state.settings.secure_cookies) {
        headers.insert(SET_COOKIE, cookie);
    }

    tracing::info!(%user_id, "user logged in");
    Ok((
        headers,
        Json(ApiResponse::new(UserItem::from(user), req_id.0)),
    ))
}

/// POST /api/logout — always succeeds and always clears the cookie.
pub(super) async fn logout(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    request_headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = extract_cookie(&request_headers, SESSION_COOKIE) {
        ecom_db::delete_session(&state.pool, &hash_token(token))
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    }

    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        clear_session_cookie(state.settings.secure_cookies),
    );
    Ok((
        headers,
        Json(ApiResponse::new(LoggedOut { logged_out: true }, req_id.0)),
    ))
}

/// GET /api/users/profile
pub(super) async fn profile(
    Extension(req_id): Extension<RequestId>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Json<ApiResponse<UserItem>> {
    Json(ApiResponse::new(UserItem::from(user), req_id.0))
}
