//! Diagnosis (ICD) and procedure (CPT) code catalog endpoints.
//!
//! Reads are open to any authenticated user; catalog mutations are the
//! admin-gated surface of the API and require `role = admin`.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde::Deserialize;
use std::sync::Arc;

use super::error::{ApiError, ResultExt, clamp_pagination, parse_id};
use crate::auth::{AdminOnly, Auth};
use crate::db::{Database, NewCptCode, NewIcdCode, is_unique_violation};
use crate::impl_has_auth_backend;
use crate::jwt::JwtKeys;

#[derive(Clone)]
pub struct CodesState {
    pub db: Database,
    pub jwt: Arc<JwtKeys>,
}

impl_has_auth_backend!(CodesState);

pub fn icd_router(state: CodesState) -> Router {
    Router::new()
        .route("/", get(list_icd))
        .route("/", post(create_icd))
        .route("/counts", get(count_icd))
        .route("/search", get(search_icd))
        .route("/{id}", get(get_icd))
        .route("/{id}", put(update_icd))
        .route("/{id}", delete(delete_icd))
        .with_state(state)
}

pub fn cpt_router(state: CodesState) -> Router {
    Router::new()
        .route("/", get(list_cpt))
        .route("/", post(create_cpt))
        .route("/counts", get(count_cpt))
        .route("/search", get(search_cpt))
        .route("/{id}", get(get_cpt))
        .route("/{id}", put(update_cpt))
        .route("/{id}", delete(delete_cpt))
        .with_state(state)
}

#[derive(Deserialize)]
struct ListQuery {
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Deserialize)]
struct SearchQuery {
    query: Option<String>,
}

fn required_query(search: &SearchQuery) -> Result<&str, ApiError> {
    search
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::bad_request("Search query is required"))
}

fn validate_icd(entry: &NewIcdCode) -> Result<(), ApiError> {
    if entry.code.trim().is_empty() || entry.code.len() > 20 {
        return Err(ApiError::bad_request("Code must be 1 to 20 characters"));
    }
    if entry.description.trim().is_empty() {
        return Err(ApiError::bad_request("Description is required"));
    }
    if entry.category.trim().is_empty() || entry.sub_category.trim().is_empty() {
        return Err(ApiError::bad_request("Category and sub-category are required"));
    }
    Ok(())
}

fn validate_cpt(entry: &NewCptCode) -> Result<(), ApiError> {
    if entry.code.trim().is_empty() {
        return Err(ApiError::bad_request("Code is required"));
    }
    if entry.description.trim().is_empty() {
        return Err(ApiError::bad_request("Description is required"));
    }
    if entry.category.trim().is_empty() {
        return Err(ApiError::bad_request("Category is required"));
    }
    if entry.relative_value_unit < 0.0 {
        return Err(ApiError::bad_request(
            "Relative value unit must be a positive number",
        ));
    }
    Ok(())
}

// ICD handlers

async fn list_icd(
    State(state): State<CodesState>,
    _auth: Auth,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, limit) = clamp_pagination(query.page, query.limit);
    let (codes, total) = state
        .db
        .icd_codes()
        .list(page, limit)
        .await
        .db_err("Failed to list ICD codes")?;
    Ok(Json(serde_json::json!({ "codes": codes, "total": total })))
}

async fn search_icd(
    State(state): State<CodesState>,
    _auth: Auth,
    Query(search): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let query = required_query(&search)?;
    let codes = state
        .db
        .icd_codes()
        .search(query)
        .await
        .db_err("Failed to search ICD codes")?;
    Ok(Json(codes))
}

async fn get_icd(
    State(state): State<CodesState>,
    _auth: Auth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let code = state
        .db
        .icd_codes()
        .get(id)
        .await
        .db_err("Failed to fetch ICD code")?
        .ok_or_else(|| ApiError::not_found("ICD code not found"))?;
    Ok(Json(code))
}

async fn count_icd(
    State(state): State<CodesState>,
    _auth: Auth,
) -> Result<impl IntoResponse, ApiError> {
    let total = state
        .db
        .icd_codes()
        .count()
        .await
        .db_err("Failed to count ICD codes")?;
    Ok(Json(serde_json::json!({ "total": total })))
}

async fn create_icd(
    State(state): State<CodesState>,
    _auth: Auth<AdminOnly>,
    Json(payload): Json<NewIcdCode>,
) -> Result<impl IntoResponse, ApiError> {
    validate_icd(&payload)?;

    let id = match state.db.icd_codes().create(&payload).await {
        Ok(id) => id,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::conflict("ICD code already exists"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to create ICD code", e)),
    };

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

async fn update_icd(
    State(state): State<CodesState>,
    _auth: Auth<AdminOnly>,
    Path(id): Path<String>,
    Json(payload): Json<NewIcdCode>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    validate_icd(&payload)?;

    let updated = match state.db.icd_codes().update(id, &payload).await {
        Ok(updated) => updated,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::conflict("ICD code already exists"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to update ICD code", e)),
    };
    if !updated {
        return Err(ApiError::not_found("ICD code not found"));
    }
    Ok(Json(serde_json::json!({ "updated": true })))
}

async fn delete_icd(
    State(state): State<CodesState>,
    _auth: Auth<AdminOnly>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let deleted = state
        .db
        .icd_codes()
        .delete(id)
        .await
        .db_err("Failed to delete ICD code")?;
    if !deleted {
        return Err(ApiError::not_found("ICD code not found"));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// CPT handlers

async fn list_cpt(
    State(state): State<CodesState>,
    _auth: Auth,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, limit) = clamp_pagination(query.page, query.limit);
    let (codes, total) = state
        .db
        .cpt_codes()
        .list(page, limit)
        .await
        .db_err("Failed to list CPT codes")?;
    Ok(Json(serde_json::json!({ "codes": codes, "total": total })))
}

async fn search_cpt(
    State(state): State<CodesState>,
    _auth: Auth,
    Query(search): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let query = required_query(&search)?;
    let codes = state
        .db
        .cpt_codes()
        .search(query)
        .await
        .db_err("Failed to search CPT codes")?;
    Ok(Json(codes))
}

async fn get_cpt(
    State(state): State<CodesState>,
    _auth: Auth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let code = state
        .db
        .cpt_codes()
        .get(id)
        .await
        .db_err("Failed to fetch CPT code")?
        .ok_or_else(|| ApiError::not_found("CPT code not found"))?;
    Ok(Json(code))
}

async fn count_cpt(
    State(state): State<CodesState>,
    _auth: Auth,
) -> Result<impl IntoResponse, ApiError> {
    let total = state
        .db
        .cpt_codes()
        .count()
        .await
        .db_err("Failed to count CPT codes")?;
    Ok(Json(serde_json::json!({ "total": total })))
}

async fn create_cpt(
    State(state): State<CodesState>,
    _auth: Auth<AdminOnly>,
    Json(payload): Json<NewCptCode>,
) -> Result<impl IntoResponse, ApiError> {
    validate_cpt(&payload)?;

    let id = match state.db.cpt_codes().create(&payload).await {
        Ok(id) => id,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::conflict("CPT code already exists"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to create CPT code", e)),
    };

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

async fn update_cpt(
    State(state): State<CodesState>,
    _auth: Auth<AdminOnly>,
    Path(id): Path<String>,
    Json(payload): Json<NewCptCode>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    validate_cpt(&payload)?;

    let updated = match state.db.cpt_codes().update(id, &payload).await {
        Ok(updated) => updated,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::conflict("CPT code already exists"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to update CPT code", e)),
    };
    if !updated {
        return Err(ApiError::not_found("CPT code not found"));
    }
    Ok(Json(serde_json::json!({ "updated": true })))
}

async fn delete_cpt(
    State(state): State<CodesState>,
    _auth: Auth<AdminOnly>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let deleted = state
        .db
        .cpt_codes()
        .delete(id)
        .await
        .db_err("Failed to delete CPT code")?;
    if !deleted {
        return Err(ApiError::not_found("CPT code not found"));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}
