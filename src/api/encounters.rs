//! Encounter endpoints. All routes require a bearer token.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ResultExt, clamp_pagination, parse_id};
use crate::auth::Auth;
use crate::db::{Database, Encounter, EncounterStatus, EncounterUpdate, NewEncounter};
use crate::impl_has_auth_backend;
use crate::jwt::JwtKeys;

#[derive(Clone)]
pub struct EncountersState {
    pub db: Database,
    pub jwt: Arc<JwtKeys>,
}

impl_has_auth_backend!(EncountersState);

pub fn router(state: EncountersState) -> Router {
    Router::new()
        .route("/", post(create_encounter))
        .route("/", get(list_encounters))
        .route("/search", get(search_encounters))
        .route("/count", get(count_encounters))
        .route("/{id}", get(get_encounter))
        .route("/{id}", put(update_encounter))
        .route("/{id}", delete(delete_encounter))
        .with_state(state)
}

#[derive(Deserialize)]
struct EncounterRequest {
    patient_id: i64,
    date_of_service: String,
    provider_name: String,
    notes: Option<String>,
    status: Option<String>,
    discharge_date: Option<String>,
    type_of_service: String,
    location: Option<String>,
}

fn parse_status(raw: Option<&str>) -> Result<EncounterStatus, ApiError> {
    match raw {
        None => Ok(EncounterStatus::Pending),
        Some(s) => EncounterStatus::parse(s).ok_or_else(|| {
            ApiError::bad_request("Status must be pending, coded, billed, or completed")
        }),
    }
}

async fn create_encounter(
    State(state): State<EncountersState>,
    _auth: Auth,
    Json(payload): Json<EncounterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.date_of_service.trim().is_empty() {
        return Err(ApiError::bad_request("Date of service is required"));
    }
    if payload.provider_name.trim().is_empty() {
        return Err(ApiError::bad_request("Provider name is required"));
    }
    if payload.type_of_service.trim().is_empty() {
        return Err(ApiError::bad_request("Type of service is required"));
    }
    let status = parse_status(payload.status.as_deref())?;

    // Explicit lookup so a missing patient is a 404, not a constraint error.
    state
        .db
        .patients()
        .get(payload.patient_id)
        .await
        .db_err("Failed to fetch patient")?
        .ok_or_else(|| ApiError::not_found("Patient not found"))?;

    let id = state
        .db
        .encounters()
        .create(&NewEncounter {
            patient_id: payload.patient_id,
            date_of_service: payload.date_of_service,
            provider_name: payload.provider_name,
            notes: payload.notes,
            status,
            discharge_date: payload.discharge_date,
            type_of_service: payload.type_of_service,
            location: payload.location,
        })
        .await
        .db_err("Failed to create encounter")?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

async fn get_encounter(
    State(state): State<EncountersState>,
    _auth: Auth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let encounter = state
        .db
        .encounters()
        .get(id)
        .await
        .db_err("Failed to fetch encounter")?
        .ok_or_else(|| ApiError::not_found("Encounter not found"))?;
    Ok(Json(encounter))
}

#[derive(Deserialize)]
struct ListQuery {
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Serialize)]
struct ListEncountersResponse {
    encounters: Vec<Encounter>,
    total: i64,
}

async fn list_encounters(
    State(state): State<EncountersState>,
    _auth: Auth,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, limit) = clamp_pagination(query.page, query.limit);
    let (encounters, total) = state
        .db
        .encounters()
        .list(page, limit)
        .await
        .db_err("Failed to list encounters")?;
    Ok(Json(ListEncountersResponse { encounters, total }))
}

#[derive(Deserialize)]
struct SearchQuery {
    query: Option<String>,
    limit: Option<u32>,
}

async fn search_encounters(
    State(state): State<EncountersState>,
    _auth: Auth,
    Query(search): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let query = search
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::bad_request("Search query is required"))?;
    let limit = search.limit.unwrap_or(50).clamp(1, 100);

    let encounters = state
        .db
        .encounters()
        .search(query, limit)
        .await
        .db_err("Failed to search encounters")?;
    Ok(Json(encounters))
}

async fn count_encounters(
    State(state): State<EncountersState>,
    _auth: Auth,
) -> Result<impl IntoResponse, ApiError> {
    let total = state
        .db
        .encounters()
        .count()
        .await
        .db_err("Failed to count encounters")?;
    Ok(Json(serde_json::json!({ "total": total })))
}

#[derive(Deserialize)]
struct EncounterUpdateRequest {
    date_of_service: Option<String>,
    provider_name: Option<String>,
    notes: Option<String>,
    status: Option<String>,
    discharge_date: Option<String>,
    type_of_service: Option<String>,
    location: Option<String>,
}

async fn update_encounter(
    State(state): State<EncountersState>,
    _auth: Auth,
    Path(id): Path<String>,
    Json(payload): Json<EncounterUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;

    let status = match payload.status.as_deref() {
        None => None,
        Some(s) => Some(EncounterStatus::parse(s).ok_or_else(|| {
            ApiError::bad_request("Status must be pending, coded, billed, or completed")
        })?),
    };

    let updated = state
        .db
        .encounters()
        .update(
            id,
            &EncounterUpdate {
                date_of_service: payload.date_of_service,
                provider_name: payload.provider_name,
                notes: payload.notes,
                status,
                discharge_date: payload.discharge_date,
                type_of_service: payload.type_of_service,
                location: payload.location,
            },
        )
        .await
        .db_err("Failed to update encounter")?;
    if !updated {
        return Err(ApiError::not_found("Encounter not found"));
    }
    Ok(Json(serde_json::json!({ "updated": true })))
}

async fn delete_encounter(
    State(state): State<EncountersState>,
    _auth: Auth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;

    let deleted = state
        .db
        .encounters()
        .delete(id)
        .await
        .db_err("Failed to delete encounter")?;
    if !deleted {
        return Err(ApiError::not_found("Encounter not found"));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}
