mod auth;
mod codes;
mod dashboard;
mod encounters;
mod error;
mod health;
mod links;
mod patients;

use axum::Router;
use std::sync::Arc;

use crate::auth::SessionService;
use crate::db::Database;
use crate::jwt::JwtKeys;
use crate::rate_limit::RateLimitConfig;

pub use auth::AuthState;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtKeys>,
    rate_limits: Arc<RateLimitConfig>,
) -> Router {
    let auth_state = auth::AuthState {
        sessions: SessionService::new(db.clone(), jwt.clone()),
        jwt: jwt.clone(),
        rate_limits,
    };

    let patients_state = patients::PatientsState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let encounters_state = encounters::EncountersState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let codes_state = codes::CodesState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let links_state = links::LinksState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let dashboard_state = dashboard::DashboardState {
        db: db.clone(),
        jwt,
    };

    let health_state = health::HealthState { db };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/patients", patients::router(patients_state))
        .nest("/encounters", encounters::router(encounters_state))
        .nest("/icd-codes", codes::icd_router(codes_state.clone()))
        .nest("/cpt-codes", codes::cpt_router(codes_state))
        .nest("/diagnoses", links::diagnoses_router(links_state.clone()))
        .nest("/procedures", links::procedures_router(links_state))
        .nest("/dashboard", dashboard::router(dashboard_state))
        .nest("/health", health::router(health_state))
}
