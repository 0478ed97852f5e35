use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use ecom_core::{OrderLine, OrderStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::{CurrentUser, RequestId};

use super::{map_db_error, parse_id, ApiError, ApiResponse, AppState, Deleted};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OrderItemResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub price_at_time: Decimal,
    pub line_total: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<ecom_db::OrderItemRow> for OrderItemResponse {
    fn from(row: ecom_db::OrderItemRow) -> Self {
        let line_total = row.line_total();
        Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            price_at_time: row.price_at_time,
            line_total,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OrderResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
    pub total: Decimal,
}

impl From<ecom_db::OrderView> for OrderResponse {
    fn from(view: ecom_db::OrderView) -> Self {
        Self {
            id: view.order.id,
            user_id: view.order.user_id,
            status: view.order.status,
            created_at: view.order.created_at,
            updated_at: view.order.updated_at,
            items: view.items.into_iter().map(OrderItemResponse::from).collect(),
            total: view.total,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OrderQuery {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OrderLineRequest {
    pub product_id: Option<Uuid>,
    pub quantity: Option<i64>,
    pub price_at_time: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateOrderRequest {
    /// Defaults to the signed-in user.
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub items: Vec<OrderLineRequest>,
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdateStatusRequest {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdateItemRequest {
    pub quantity: Option<i64>,
}

fn validation(rid: &str, message: impl Into<String>) -> ApiError {
    ApiError::new(rid, "validation_error", message)
}

fn order_not_found(rid: &str, id: Uuid) -> ApiError {
    ApiError::new(rid, "not_found", format!("order {id} not found"))
}

/// GET /api/orders — all orders, or one user's with `?userId=`.
pub(super) async fn list_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<OrderQuery>,
) -> Result<Json<ApiResponse<Vec<OrderResponse>>>, ApiError> {
    let views = ecom_db::list_orders(&state.pool, query.user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let data = views.into_iter().map(OrderResponse::from).collect();
    Ok(Json(ApiResponse::new(data, req_id.0)))
}

/// POST /api/orders — reserves stock for every line or creates nothing.
pub(super) async fn create_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ApiError> {
    let rid = &req_id.0;
    let lines = body
        .items
        .into_iter()
        .map(|line| OrderLine::new(line.product_id, line.quantity, line.price_at_time))
        .collect::<Result<Vec<_>, _>>()
        .and_then(ecom_core::require_lines)
        .map_err(|e| validation(rid, e.to_string()))?;
    let user_id = body.user_id.unwrap_or(user.id);
    if user_id != user.id {
        return Err(ApiError::new(
            rid,
            "forbidden",
            "orders can only be placed for your own account",
        ));
    }

    let view = ecom_db::create_order(&state.pool, user_id, &lines)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(OrderResponse::from(view), req_id.0)),
    ))
}

/// GET /api/orders/:id
pub(super) async fn get_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<OrderResponse>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "order")?;
    let view = ecom_db::get_order_view(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| order_not_found(rid, id))?;
    Ok(Json(ApiResponse::new(OrderResponse::from(view), req_id.0)))
}

/// PUT /api/orders/:id — moves the order along its lifecycle.
pub(super) async fn update_order_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "order")?;
    let next = body
        .status
        .as_deref()
        .ok_or_else(|| validation(rid, "status is required"))?
        .parse::<OrderStatus>()
        .map_err(|e| validation(rid, e.to_string()))?;

    let view = ecom_db::update_order_status(&state.pool, id, next)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    Ok(Json(ApiResponse::new(OrderResponse::from(view), req_id.0)))
}

/// DELETE /api/orders/:id
pub(super) async fn delete_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Deleted>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "order")?;
    ecom_db::delete_order(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    Ok(Json(ApiResponse::new(Deleted { deleted: true }, req_id.0)))
}

/// GET /api/orders/:id/items
pub(super) async fn list_order_items(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<OrderItemResponse>>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "order")?;
    let rows = ecom_db::list_order_items(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let data = rows.into_iter().map(OrderItemResponse::from).collect();
    Ok(Json(ApiResponse::new(data, req_id.0)))
}

/// PUT /api/orders/:order_id/items/:item_id — sets the quantity and moves
/// the difference in or out of stock.
pub(super) async fn update_order_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((order_id, item_id)): Path<(String, String)>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<Json<ApiResponse<OrderItemResponse>>, ApiError> {
    let rid = &req_id.0;
    let order_id = parse_id(rid, &order_id, "order")?;
    let item_id = parse_id(rid, &item_id, "order item")?;
    let quantity = match body.quantity {
        Some(q) if q > 0 => i32::try_from(q)
            .map_err(|_| validation(rid, format!("quantity {q} is out of range")))?,
        Some(q) => return Err(validation(rid, format!("quantity must be positive, got {q}"))),
        None => return Err(validation(rid, "quantity is required")),
    };

    let row = ecom_db::update_order_item_quantity(&state.pool, order_id, item_id, quantity)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    Ok(Json(ApiResponse::new(OrderItemResponse::from(row), req_id.0)))
}

/// DELETE /api/orders/:order_id/items/:item_id
pub(super) async fn delete_order_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((order_id, item_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Deleted>>, ApiError> {
    let rid = &req_id.0;
    let order_id = parse_id(rid, &order_id, "order")?;
    let item_id = parse_id(rid, &item_id, "order item")?;
    ecom_db::delete_order_item(&state.pool, order_id, item_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    Ok(Json(ApiResponse::new(Deleted { deleted: true }, req_id.0)))
}
