//! Patient record endpoints. All routes require a bearer token; handlers
//! consume only the request identity asserted by the auth gate.

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
use crate::db::{Database, NewPatient, Patient, PatientUpdate};
use crate::impl_has_auth_backend;
use crate::jwt::JwtKeys;

#[derive(Clone)]
pub struct PatientsState {
    pub db: Database,
    pub jwt: Arc<JwtKeys>,
}

impl_has_auth_backend!(PatientsState);

pub fn router(state: PatientsState) -> Router {
    Router::new()
        .route("/", post(create_patient))
        .route("/", get(list_patients))
        .route("/search", get(search_patients))
        .route("/count", get(count_patients))
        .route("/details/{id}", get(patient_details))
        .route("/{id}", get(get_patient))
        .route("/{id}", put(update_patient))
        .route("/{id}", delete(delete_patient))
        .with_state(state)
}

fn validate_new_patient(patient: &NewPatient) -> Result<(), ApiError> {
    if patient.name.trim().is_empty() {
        return Err(ApiError::bad_request("Patient name is required"));
    }
    if patient.date_of_birth.trim().is_empty() {
        return Err(ApiError::bad_request("Date of birth is required"));
    }
    if !matches!(patient.gender.as_str(), "Male" | "Female" | "Other") {
        return Err(ApiError::bad_request("Gender must be Male, Female, or Other"));
    }
    if !patient.email.contains('@') {
        return Err(ApiError::bad_request("Invalid email format"));
    }
    if patient.emergency_contact_name.trim().is_empty()
        || patient.emergency_contact_phone.trim().is_empty()
    {
        return Err(ApiError::bad_request("Emergency contact is required"));
    }
    Ok(())
}

async fn create_patient(
    State(state): State<PatientsState>,
    _auth: Auth,
    Json(payload): Json<NewPatient>,
) -> Result<impl IntoResponse, ApiError> {
    validate_new_patient(&payload)?;

    let id = state
        .db
        .patients()
        .create(&payload)
        .await
        .db_err("Failed to create patient")?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

async fn get_patient(
    State(state): State<PatientsState>,
    _auth: Auth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let patient = state
        .db
        .patients()
        .get(id)
        .await
        .db_err("Failed to fetch patient")?
        .ok_or_else(|| ApiError::not_found("Patient not found"))?;
    Ok(Json(patient))
}

#[derive(Deserialize)]
struct ListQuery {
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Serialize)]
struct ListPatientsResponse {
    patients: Vec<Patient>,
    total: i64,
}

async fn list_patients(
    State(state): State<PatientsState>,
    _auth: Auth,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, limit) = clamp_pagination(query.page, query.limit);
    let (patients, total) = state
        .db
        .patients()
        .list(page, limit)
        .await
        .db_err("Failed to list patients")?;
    Ok(Json(ListPatientsResponse { patients, total }))
}

#[derive(Deserialize)]
struct SearchQuery {
    query: Option<String>,
}

async fn search_patients(
    State(state): State<PatientsState>,
    _auth: Auth,
    Query(search): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let query = search
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::bad_request("Search query is required"))?;

    let patients = state
        .db
        .patients()
        .search(query)
        .await
        .db_err("Failed to search patients")?;
    Ok(Json(patients))
}

async fn count_patients(
    State(state): State<PatientsState>,
    _auth: Auth,
) -> Result<impl IntoResponse, ApiError> {
    let total = state
        .db
        .patients()
        .count()
        .await
        .db_err("Failed to count patients")?;
    Ok(Json(serde_json::json!({ "total": total })))
}

async fn update_patient(
    State(state): State<PatientsState>,
    _auth: Auth,
    Path(id): Path<String>,
    Json(payload): Json<PatientUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;

    let updated = state
        .db
        .patients()
        .update(id, &payload)
        .await
        .db_err("Failed to update patient")?;
    if !updated {
        return Err(ApiError::not_found("Patient not found"));
    }
    Ok(Json(serde_json::json!({ "updated": true })))
}

async fn delete_patient(
    State(state): State<PatientsState>,
    _auth: Auth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;

    let deleted = state
        .db
        .patients()
        .delete(id)
        .await
        .db_err("Failed to delete patient")?;
    if !deleted {
        return Err(ApiError::not_found("Patient not found"));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Serialize)]
struct PatientDetailsResponse {
    patient: Patient,
    encounters: Vec<crate::db::Encounter>,
}

/// Patient record joined with their encounter history.
async fn patient_details(
    State(state): State<PatientsState>,
    _auth: Auth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;

    let patient = state
        .db
        .patients()
        .get(id)
        .await
        .db_err("Failed to fetch patient")?
        .ok_or_else(|| ApiError::not_found("Patient not found"))?;

    let encounters = state
        .db
        .encounters()
        .list_for_patient(id)
        .await
        .db_err("Failed to fetch encounters")?;

    Ok(Json(PatientDetailsResponse { patient, encounters }))
}
