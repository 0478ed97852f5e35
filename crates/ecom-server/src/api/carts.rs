use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use ecom_core::{CartOwner, CartStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::{CurrentUser, RequestId};

use super::{map_db_error, parse_id, ApiError, ApiResponse, AppState, Deleted};

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CartLineItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub image_url: Option<String>,
    pub product_active: bool,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CartResponse {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub session_id: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<CartLineItem>,
    pub total: Decimal,
}

impl From<ecom_db::CartView> for CartResponse {
    fn from(view: ecom_db::CartView) -> Self {
        let items = view
            .items
            .into_iter()
            .map(|line| CartLineItem {
                id: line.id,
                product_id: line.product_id,
                product_name: line.product_name,
                quantity: line.quantity,
                unit_price: line.unit_price,
                line_total: line.line_total,
                image_url: line.image_url,
                product_active: line.product_active,
                added_at: line.added_at,
            })
            .collect();
        Self {
            id: view.cart.id,
            user_id: view.cart.user_id,
            session_id: view.cart.session_id,
            status: view.cart.status,
            created_at: view.cart.created_at,
            updated_at: view.cart.updated_at,
            items,
            total: view.total,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CartItemResponse {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub added_at: DateTime<Utc>,
}

impl From<ecom_db::CartItemRow> for CartItemResponse {
    fn from(row: ecom_db::CartItemRow) -> Self {
        Self {
            id: row.id,
            cart_id: row.cart_id,
            product_id: row.product_id,
            quantity: row.quantity,
            added_at: row.added_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CartQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateCartRequest {
    pub user_id: Option<Uuid>,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AddItemRequest {
    pub product_id: Option<Uuid>,
    pub quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CartLineRequest {
    pub product_id: Uuid,
    pub quantity: i64,
}

/// `productId` + `quantity` sets a single line; `items` sets several.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UpdateCartRequest {
    pub status: Option<String>,
    pub product_id: Option<Uuid>,
    pub quantity: Option<i64>,
    #[serde(default)]
    pub items: Vec<CartLineRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct MergeCartRequest {
    pub guest_cart_id: Option<Uuid>,
}

fn validation(rid: &str, message: impl Into<String>) -> ApiError {
    ApiError::new(rid, "validation_error", message)
}

fn to_quantity(rid: &str, quantity: i64) -> Result<i32, ApiError> {
    i32::try_from(quantity).map_err(|_| validation(rid, format!("quantity {quantity} is out of range")))
}

fn cart_not_found(rid: &str, id: Uuid) -> ApiError {
    ApiError::new(rid, "not_found", format!("cart {id} not found"))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/carts — every cart, or only those of `?sessionId=`.
pub(super) async fn list_carts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<CartQuery>,
) -> Result<Json<ApiResponse<Vec<CartResponse>>>, ApiError> {
    let session_id = query.session_id.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let views = ecom_db::list_cart_views(&state.pool, session_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let data = views.into_iter().map(CartResponse::from).collect();
    Ok(Json(ApiResponse::new(data, req_id.0)))
}

/// POST /api/carts — returns the owner's active cart, creating it if needed.
pub(super) async fn create_cart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateCartRequest>,
) -> Result<Json<ApiResponse<CartResponse>>, ApiError> {
    let rid = &req_id.0;
    let owner = CartOwner::from_parts(body.user_id, body.session_id.as_deref())
        .map_err(|e| validation(rid, e.to_string()))?;

    let view = ecom_db::get_or_create_cart(&state.pool, &owner)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    Ok(Json(ApiResponse::new(CartResponse::from(view), req_id.0)))
}

/// GET /api/carts/:id
pub(super) async fn get_cart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CartResponse>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "cart")?;
    let view = ecom_db::get_cart_view(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| cart_not_found(rid, id))?;
    Ok(Json(ApiResponse::new(CartResponse::from(view), req_id.0)))
}

/// GET /api/carts/user/:user_id — the user's active cart, 404 when none exists.
pub(super) async fn get_user_cart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<CartResponse>>, ApiError> {
    let rid = &req_id.0;
    let user_id = parse_id(rid, &user_id, "user")?;
    let view = ecom_db::get_active_cart_for_user(&state.pool, user_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(rid, "not_found", format!("user {user_id} has no active cart"))
        })?;
    Ok(Json(ApiResponse::new(CartResponse::from(view), req_id.0)))
}

/// PUT /api/carts/:id — absolute quantities plus an optional status change.
pub(super) async fn update_cart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<UpdateCartRequest>,
) -> Result<Json<ApiResponse<CartResponse>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "cart")?;

    let status = body
        .status
        .as_deref()
        .map(str::parse::<CartStatus>)
        .transpose()
        .map_err(|e| validation(rid, e.to_string()))?;

    let mut items = Vec::with_capacity(body.items.len() + 1);
    match (body.product_id, body.quantity) {
        (Some(product_id), Some(quantity)) => items.push((product_id, to_quantity(rid, quantity)?)),
        (None, None) => {}
        _ => {
            return Err(validation(
                rid,
                "productId and quantity must be given together",
            ))
        }
    }
    for line in &body.items {
        items.push((line.product_id, to_quantity(rid, line.quantity)?));
    }

    if status.is_none() && items.is_empty() {
        return Err(ApiError::new(rid, "bad_request", "no fields to update"));
    }

    let view = ecom_db::update_cart(&state.pool, id, &ecom_db::CartUpdate { status, items })
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    Ok(Json(ApiResponse::new(CartResponse::from(view), req_id.0)))
}

/// DELETE /api/carts/:id
pub(super) async fn delete_cart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Deleted>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "cart")?;
    let deleted = ecom_db::delete_cart(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if !deleted {
        return Err(cart_not_found(rid, id));
    }
    Ok(Json(ApiResponse::new(Deleted { deleted: true }, req_id.0)))
}

/// POST /api/carts/:id/items — adds to an existing line or inserts a new one.
pub(super) async fn add_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CartItemResponse>>), ApiError> {
    let rid = &req_id.0;
    let cart_id = parse_id(rid, &id, "cart")?;
    let product_id = body
        .product_id
        .ok_or_else(|| validation(rid, "productId is required"))?;
    let quantity = match body.quantity.unwrap_or(1) {
        q if q > 0 => to_quantity(rid, q)?,
        q => return Err(validation(rid, format!("quantity must be positive, got {q}"))),
    };

    let row = ecom_db::add_cart_item(&state.pool, cart_id, product_id, quantity)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(CartItemResponse::from(row), req_id.0)),
    ))
}

/// DELETE /api/carts/:id/items/:item_id
pub(super) async fn remove_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((id, item_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Deleted>>, ApiError> {
    let rid = &req_id.0;
    let cart_id = parse_id(rid, &id, "cart")?;
    let item_id = parse_id(rid, &item_id, "cart item")?;
    let removed = ecom_db::remove_cart_item(&state.pool, cart_id, item_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if !removed {
        return Err(ApiError::new(
            rid,
            "not_found",
            format!("item {item_id} is not in cart {cart_id}"),
        ));
    }
    Ok(Json(ApiResponse::new(Deleted { deleted: true }, req_id.0)))
}

/// POST /api/carts/merge/:user_id — folds the guest cart into the user's cart.
///
/// Only the signed-in user may merge into their own cart. Without a
/// `guestCartId` this just returns (or creates) the user's cart.
pub(super) async fn merge_cart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(user_id): Path<String>,
    Json(body): Json<MergeCartRequest>,
) -> Result<Json<ApiResponse<CartResponse>>, ApiError> {
    let rid = &req_id.0;
    let user_id = parse_id(rid, &user_id, "user")?;
    if user_id != user.id {
        return Err(ApiError::new(
            rid,
            "forbidden",
            "carts can only be merged into your own account",
        ));
    }

    let view = match body.guest_cart_id {
        Some(guest_cart_id) => ecom_db::merge_guest_cart(&state.pool, guest_cart_id, user_id).await,
        None => ecom_db::get_or_create_cart(&state.pool, &CartOwner::User(user_id)).await,
    }
    .map_err(|e| map_db_error(rid.clone(), &e))?;
    Ok(Json(ApiResponse::new(CartResponse::from(view), req_id.0)))
}
