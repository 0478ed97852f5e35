use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, parse_id, ApiError, ApiResponse, AppState, Deleted};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CategoryItem {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ecom_db::CategoryRow> for CategoryItem {
    fn from(row: ecom_db::CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

fn clean_name(rid: &str, name: Option<&str>) -> Result<Option<String>, ApiError> {
    match name.map(str::trim) {
        Some(n) if n.is_empty() || n.chars().count() > 100 => Err(ApiError::new(
            rid,
            "validation_error",
            "name must be 1–100 characters",
        )),
        other => Ok(other.map(ToOwned::to_owned)),
    }
}

fn not_found(rid: &str, id: Uuid) -> ApiError {
    ApiError::new(rid, "not_found", format!("category {id} not found"))
}

/// GET /api/categories
pub(super) async fn list_categories(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<CategoryItem>>>, ApiError> {
    let rows = ecom_db::list_categories(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let data = rows.into_iter().map(CategoryItem::from).collect();
    Ok(Json(ApiResponse::new(data, req_id.0)))
}

/// GET /api/categories/:id
pub(super) async fn get_category(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CategoryItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "category")?;
    let row = ecom_db::get_category(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| not_found(rid, id))?;
    Ok(Json(ApiResponse::new(CategoryItem::from(row), req_id.0)))
}

/// POST /api/categories
pub(super) async fn create_category(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryItem>>), ApiError> {
    let rid = &req_id.0;
    let name = clean_name(rid, body.name.as_deref())?
        .ok_or_else(|| ApiError::new(rid, "validation_error", "name is required"))?;

    let row = ecom_db::create_category(&state.pool, &name, body.description.as_deref())
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(CategoryItem::from(row), req_id.0)),
    ))
}

/// PUT /api/categories/:id
pub(super) async fn update_category(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<CategoryRequest>,
) -> Result<Json<ApiResponse<CategoryItem>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "category")?;
    let name = clean_name(rid, body.name.as_deref())?;
    if name.is_none() && body.description.is_none() {
        return Err(ApiError::new(rid, "bad_request", "no fields to update"));
    }

    let row = ecom_db::update_category(
        &state.pool,
        id,
        name.as_deref(),
        body.description.as_deref(),
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?
    .ok_or_else(|| not_found(rid, id))?;
    Ok(Json(ApiResponse::new(CategoryItem::from(row), req_id.0)))
}

/// DELETE /api/categories/:id — products in it keep existing uncategorised.
pub(super) async fn delete_category(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Deleted>>, ApiError> {
    let rid = &req_id.0;
    let id = parse_id(rid, &id, "category")?;
    let deleted = ecom_db::delete_category(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if !deleted {
        return Err(not_found(rid, id));
    }
    Ok(Json(ApiResponse::new(Deleted { deleted: true }, req_id.0)))
}
