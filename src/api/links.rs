//! Diagnosis and procedure links: the join records attaching catalog codes
//! to encounters. All routes require a bearer token.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::Deserialize;
use std::sync::Arc;

use super::error::{ApiError, ResultExt, parse_id};
use crate::auth::Auth;
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::JwtKeys;

#[derive(Clone)]
pub struct LinksState {
    pub db: Database,
    pub jwt: Arc<JwtKeys>,
}

impl_has_auth_backend!(LinksState);

pub fn diagnoses_router(state: LinksState) -> Router {
    // GET takes an encounter ID, DELETE a link ID; the path parameter name
    // must be shared for the routes to coexist.
    Router::new()
        .route("/", post(add_diagnosis))
        .route("/{id}", get(list_diagnoses))
        .route("/{id}", delete(delete_diagnosis))
        .with_state(state)
}

pub fn procedures_router(state: LinksState) -> Router {
    Router::new()
        .route("/", post(add_procedure))
        .route("/{id}", get(list_procedures))
        .route("/{id}", delete(delete_procedure))
        .with_state(state)
}

#[derive(Deserialize)]
struct AddDiagnosisRequest {
    encounter_id: i64,
    icd_code_id: i64,
    diagnosis_order: Option<i64>,
}

async fn add_diagnosis(
    State(state): State<LinksState>,
    _auth: Auth,
    Json(payload): Json<AddDiagnosisRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .encounters()
        .get(payload.encounter_id)
        .await
        .db_err("Failed to fetch encounter")?
        .ok_or_else(|| ApiError::not_found("Encounter not found"))?;
    state
        .db
        .icd_codes()
        .get(payload.icd_code_id)
        .await
        .db_err("Failed to fetch ICD code")?
        .ok_or_else(|| ApiError::not_found("ICD code not found"))?;

    let id = state
        .db
        .encounters()
        .add_diagnosis(
            payload.encounter_id,
            payload.icd_code_id,
            payload.diagnosis_order,
        )
        .await
        .db_err("Failed to attach diagnosis")?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

async fn list_diagnoses(
    State(state): State<LinksState>,
    _auth: Auth,
    Path(encounter_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let encounter_id = parse_id(&encounter_id)?;
    let diagnoses = state
        .db
        .encounters()
        .diagnoses_for(encounter_id)
        .await
        .db_err("Failed to list diagnoses")?;
    Ok(Json(diagnoses))
}

async fn delete_diagnosis(
    State(state): State<LinksState>,
    _auth: Auth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let deleted = state
        .db
        .encounters()
        .delete_diagnosis(id)
        .await
        .db_err("Failed to delete diagnosis")?;
    if !deleted {
        return Err(ApiError::not_found("Diagnosis not found"));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Deserialize)]
struct AddProcedureRequest {
    encounter_id: i64,
    cpt_code_id: i64,
    procedure_date: Option<String>,
}

async fn add_procedure(
    State(state): State<LinksState>,
    _auth: Auth,
    Json(payload): Json<AddProcedureRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .encounters()
        .get(payload.encounter_id)
        .await
        .db_err("Failed to fetch encounter")?
        .ok_or_else(|| ApiError::not_found("Encounter not found"))?;
    state
        .db
        .cpt_codes()
        .get(payload.cpt_code_id)
        .await
        .db_err("Failed to fetch CPT code")?
        .ok_or_else(|| ApiError::not_found("CPT code not found"))?;

    let id = state
        .db
        .encounters()
        .add_procedure(
            payload.encounter_id,
            payload.cpt_code_id,
            payload.procedure_date.as_deref(),
        )
        .await
        .db_err("Failed to attach procedure")?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

async fn list_procedures(
    State(state): State<LinksState>,
    _auth: Auth,
    Path(encounter_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let encounter_id = parse_id(&encounter_id)?;
    let procedures = state
        .db
        .encounters()
        .procedures_for(encounter_id)
        .await
        .db_err("Failed to list procedures")?;
    Ok(Json(procedures))
}

async fn delete_procedure(
    State(state): State<LinksState>,
    _auth: Auth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let deleted = state
        .db
        .encounters()
        .delete_procedure(id)
        .await
        .db_err("Failed to delete procedure")?;
    if !deleted {
        return Err(ApiError::not_found("Procedure not found"));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}
