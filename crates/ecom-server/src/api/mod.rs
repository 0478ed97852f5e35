mod auth;
mod carts;
mod categories;
mod checkout;
mod orders;
mod products;
mod users;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use ecom_db::DbError;
use ecom_payments::StripeClient;
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::middleware::{enforce_rate_limit, request_id, require_session, RateLimitState, RequestId};

/// Settings the handlers read on every request.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub session_ttl_hours: i64,
    pub secure_cookies: bool,
    /// Fallback checkout origin when the request carries no `Origin` header.
    pub public_url: String,
    pub cors_origins: Vec<String>,
}

impl ServerSettings {
    #[must_use]
    pub fn from_app_config(config: &ecom_core::AppConfig) -> Self {
        Self {
            session_ttl_hours: config.session_ttl_hours,
            secure_cookies: config.secure_cookies(),
            public_url: config.public_url.clone(),
            cors_origins: config.cors_origins.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// `None` when no gateway key is configured; checkout answers 503.
    pub payments: Option<StripeClient>,
    pub settings: Arc<ServerSettings>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Body for successful deletes.
#[derive(Debug, Serialize)]
pub(super) struct Deleted {
    pub deleted: bool,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
    payments: &'static str,
}

impl ResponseMeta {
    pub(crate) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(crate) fn new(data: T, request_id: String) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }

    fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            "bad_request" | "validation_error" | "duplicate" | "insufficient_stock"
            | "product_unavailable" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "payment_gateway_error" => StatusCode::BAD_GATEWAY,
            "service_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status(), Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

/// Parses a path id, answering 400 instead of axum's plain-text rejection.
pub(super) fn parse_id(request_id: &str, raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| {
        ApiError::new(
            request_id,
            "validation_error",
            format!("'{raw}' is not a valid {what} id"),
        )
    })
}

/// Translates a database error into the response envelope.
///
/// Domain errors keep their message; anything unexpected is logged and
/// surfaced as an opaque 500.
pub(crate) fn map_db_error(request_id: String, error: &DbError) -> ApiError {
    let (code, message) = match error {
        DbError::NotFound
        | DbError::UserNotFound(_)
        | DbError::CartNotFound(_)
        | DbError::OrderNotFound(_) => ("not_found", error.to_string()),
        DbError::InvalidLineItem(_) => ("validation_error", error.to_string()),
        DbError::ProductUnavailable(_) => ("product_unavailable", error.to_string()),
        DbError::InsufficientStock { .. } => ("insufficient_stock", error.to_string()),
        DbError::InvalidStatusTransition { .. }
        | DbError::OrderLocked { .. }
        | DbError::CartNotActive { .. }
        | DbError::NotAGuestCart(_) => ("conflict", error.to_string()),
        DbError::Sqlx(sqlx::Error::Database(db_err)) => match db_err.code().as_deref() {
            Some("23505") => ("duplicate", "a record with that value already exists".to_string()),
            Some("23503") => (
                "validation_error",
                "a referenced record does not exist".to_string(),
            ),
            Some("23514") => ("validation_error", "a value is out of range".to_string()),
            _ => {
                tracing::error!(error = %error, "database query failed");
                ("internal_error", "database query failed".to_string())
            }
        },
        DbError::CorruptStatus(_) | DbError::Sqlx(_) | DbError::Migration(_) => {
            tracing::error!(error = %error, "database query failed");
            ("internal_error", "database query failed".to_string())
        }
    };
    ApiError::new(request_id, code, message)
}

fn build_cors(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-request-id")])
        .expose_headers([HeaderName::from_static("x-request-id")])
}

/// Routes that require a signed-in session.
fn protected_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/users", get(users::list_users))
        .route("/api/users/profile", get(auth::profile))
        .route(
            "/api/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/api/products", post(products::create_product))
        .route(
            "/api/products/{id}",
            put(products::update_product).delete(products::delete_product),
        )
        .route("/api/categories", post(categories::create_category))
        .route(
            "/api/categories/{id}",
            put(categories::update_category).delete(categories::delete_category),
        )
        .route(
            "/api/orders",
            get(orders::list_orders).post(orders::create_order),
        )
        .route(
            "/api/orders/{id}",
            get(orders::get_order)
                .put(orders::update_order_status)
                .delete(orders::delete_order),
        )
        .route("/api/orders/{id}/items", get(orders::list_order_items))
        .route(
            "/api/orders/{order_id}/items/{item_id}",
            put(orders::update_order_item).delete(orders::delete_order_item),
        )
        .route("/api/carts/merge/{user_id}", post(carts::merge_cart))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ))
}

fn public_router() -> Router<AppState> {
    Router::new()
        .route("/api/login", post(auth::login))
        .route("/api/logout", post(auth::logout))
        .route("/api/users", post(users::register))
        .route("/api/users/register", post(users::register))
        .route("/api/products", get(products::list_products))
        .route("/api/products/{id}", get(products::get_product))
        .route("/api/categories", get(categories::list_categories))
        .route("/api/categories/{id}", get(categories::get_category))
        .route(
            "/api/carts",
            get(carts::list_carts).post(carts::create_cart),
        )
        .route(
            "/api/carts/{id}",
            get(carts::get_cart)
                .put(carts::update_cart)
                .delete(carts::delete_cart),
        )
        .route("/api/carts/user/{user_id}", get(carts::get_user_cart))
        .route("/api/carts/{id}/items", post(carts::add_item))
        .route(
            "/api/carts/{id}/items/{item_id}",
            delete(carts::remove_item),
        )
        .route("/api/checkout", post(checkout::create_checkout_session))
        .route(
            "/api/checkout/sessions/{id}",
            get(checkout::get_checkout_session),
        )
        .route(
            "/api/checkout/create-payment-intent",
            post(checkout::create_payment_intent),
        )
}

pub fn build_app(state: AppState, rate_limit: RateLimitState) -> Router {
    let api = Router::new()
        .merge(public_router())
        .merge(protected_router(&state))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit,
            enforce_rate_limit,
        ));

    Router::new()
        .route("/api/health", get(health))
        .merge(api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(build_cors(&state.settings.cors_origins))
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);
    let payments = if state.payments.is_some() {
        "configured"
    } else {
        "disabled"
    };

    match ecom_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                    payments,
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                        payments,
                    },
                    meta,
                }),
            )
        }
    }
}
