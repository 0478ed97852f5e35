use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, parse_id, ApiError, ApiResponse, AppState, Deleted};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ProductItem {
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

impl From<ecom_db::ProductRow> for ProductItem {
    fn from(row: ecom_db::ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            stock: row.stock,
            category_id: row.category_id,
            sku: row.sku,
            image_url: row.image_url,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ProductQuery {
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub include_inactive: bool,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    pub category_id: Option<Uuid>,
    pub sku: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub category_id: Option<Uuid>,
    pub sku: Option<String>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

fn validate_name(rid: &str, name: &str) -> Result<(), ApiError> {
    if name.is_empty() || name.chars().count() > 200 {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "name must be 1–200 characters",
        ));
    }
    Ok(())
}

fn validate_price(rid: &str, price: Decimal) -> Result<(), ApiError> {
    if price < Decimal::ZERO {
        return Err(ApiError::new(
            rid,
            "validation_error",
            format!("price must not be negative, got {price}"),
        ));
    }
    Ok(())
}

fn validate_stock(rid: &str, stock: i32) -> Result<(), ApiError> {
    if stock < 0 {
        return Err(ApiError::new(
            rid,
            "validation_error",
            format!("stock must not be negative, got {stock}"),
        ));
    }
    Ok(())
}

fn not_found(rid: &str, id: Uuid) -> ApiError {
    ApiError::new(rid, "not_found", format!("product {id} not found"))
}

/// GET /api/products — active products unless `includeInactive=true`.
pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ApiResponse<Vec<ProductItem>>>, ApiError> {
    let rows = ecom_db::list_products(
        &state.pool,
        ecom_db::ProductListFilters {
            category_id: query.category_id,
            include_inactive: query.include_inactive,
            limit: normalize_limit(query.limit),
        },
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows.into_iter().map(ProductItem::from).collect();
    Ok(Json(ApiResponse::new(data, req_id.0)))
}

/// GET /api/products/:id
pub(super) async fn get_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ProductItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "product")?;
    let row = ecom_db::get_product(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| not_found(rid, id))?;
    Ok(Json(ApiResponse::new(ProductItem::from(row), req_id.0)))
}

/// POST /api/products
pub(super) async fn create_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProductItem>>), ApiError> {
    let rid = &req_id.0;
    let name = body.name.trim().to_owned();
    validate_name(rid, &name)?;
    validate_price(rid, body.price)?;
    validate_stock(rid, body.stock)?;

    let row = ecom_db::create_product(
        &state.pool,
        &ecom_db::NewProduct {
            name: &name,
            description: body.description.as_deref(),
            price: body.price,
            stock: body.stock,
            category_id: body.category_id,
            sku: body.sku.as_deref(),
            image_url: body.image_url.as_deref(),
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    tracing::info!(product_id = %row.id, "product created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(ProductItem::from(row), req_id.0)),
    ))
}

/// PUT /api/products/:id — sparse update.
pub(super) async fn update_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<UpdateProductRequest>,
) -> Result<Json<ApiResponse<ProductItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "product")?;

    let name = body.name.map(|n| n.trim().to_owned());
    if let Some(ref name) = name {
        validate_name(rid, name)?;
    }
    if let Some(price) = body.price {
        validate_price(rid, price)?;
    }
    if let Some(stock) = body.stock {
        validate_stock(rid, stock)?;
    }

    let update = ecom_db::ProductUpdate {
        name,
        description: body.description,
        price: body.price,
        stock: body.stock,
        category_id: body.category_id,
        sku: body.sku,
        image_url: body.image_url,
        is_active: body.is_active,
    };
    if update.is_empty() {
        return Err(ApiError::new(rid, "bad_request", "no fields to update"));
    }

    let row = ecom_db::update_product(&state.pool, id, &update)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| not_found(rid, id))?;
    Ok(Json(ApiResponse::new(ProductItem::from(row), req_id.0)))
}

/// DELETE /api/products/:id — soft delete; order history keeps the row.
pub(super) async fn delete_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Deleted>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "product")?;
    let found = ecom_db::deactivate_product(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if !found {
        return Err(not_found(rid, id));
    }
    tracing::info!(product_id = %id, "product deactivated");
    Ok(Json(ApiResponse::new(Deleted { deleted: true }, req_id.0)))
}
