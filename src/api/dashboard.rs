//! Dashboard aggregation endpoint.

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use serde::Serialize;
use std::sync::Arc;

use super::error::{ApiError, ResultExt};
use crate::auth::Auth;
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::JwtKeys;

#[derive(Clone)]
pub struct DashboardState {
    pub db: Database,
    pub jwt: Arc<JwtKeys>,
}

impl_has_auth_backend!(DashboardState);

pub fn router(state: DashboardState) -> Router {
    Router::new().route("/", get(overview)).with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryData {
    total_patients: i64,
    active_encounters: i64,
    icd_codes: i64,
    cpt_codes: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChartPoint {
    date: String,
    total_encounters: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OverviewResponse {
    summary_data: SummaryData,
    chart_data: Vec<ChartPoint>,
}

async fn overview(
    State(state): State<DashboardState>,
    _auth: Auth,
) -> Result<impl IntoResponse, ApiError> {
    let total_patients = state
        .db
        .patients()
        .count()
        .await
        .db_err("Failed to count patients")?;
    let active_encounters = state
        .db
        .encounters()
        .count_active()
        .await
        .db_err("Failed to count active encounters")?;
    let icd_codes = state
        .db
        .icd_codes()
        .count()
        .await
        .db_err("Failed to count ICD codes")?;
    let cpt_codes = state
        .db
        .cpt_codes()
        .count()
        .await
        .db_err("Failed to count CPT codes")?;

    let chart_data = state
        .db
        .encounters()
        .daily_counts(30)
        .await
        .db_err("Failed to aggregate encounters")?
        .into_iter()
        .map(|(date, total_encounters)| ChartPoint {
            date,
            total_encounters,
        })
        .collect();

    Ok(Json(OverviewResponse {
        summary_data: SummaryData {
            total_patients,
            active_encounters,
            icd_codes,
            cpt_codes,
        },
        chart_data,
    }))
}
