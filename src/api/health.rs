//! Liveness endpoint. Public: no auth gate.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};

use crate::db::Database;

#[derive(Clone)]
pub struct HealthState {
    pub db: Database,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/", get(health)).with_state(state)
}

async fn health(State(state): State<HealthState>) -> impl IntoResponse {
    match state.db.ping().await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "status": "unavailable" })),
            )
        }
    }
}
