//! Session endpoints.
//!
//! - POST `/register` - Create an account and open a session
//! - POST `/login` - Authenticate and open a session
//! - POST `/refresh-token` - Exchange a refresh token for a new access token
//! - POST `/logout` - Revoke a refresh token
//! - GET `/profile` - Current user's profile
//! - GET `/` - Paginated user listing
//! - GET `/count` - Total user count

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, clamp_pagination};
use crate::auth::{Auth, SessionService, UserView};
use crate::db::UserRole;
use crate::impl_has_auth_backend;
use crate::jwt::JwtKeys;
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_register};

#[derive(Clone)]
pub struct AuthState {
    pub sessions: SessionService,
    pub jwt: Arc<JwtKeys>,
    pub rate_limits: Arc<RateLimitConfig>,
}

impl_has_auth_backend!(AuthState);

pub fn router(state: AuthState) -> Router {
    let register_routes = Router::new()
        .route("/register", post(register))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limits.clone(),
            rate_limit_register,
        ));

    let login_routes = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limits.clone(),
            rate_limit_login,
        ));

    Router::new()
        .route("/refresh-token", post(refresh_token))
        .route("/logout", post(logout))
        .route("/profile", get(profile))
        .route("/", get(list_users))
        .route("/count", get(user_count))
        .with_state(state)
        .merge(register_routes)
        .merge(login_routes)
}

#[derive(Deserialize)]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
    role: Option<String>,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenRequest {
    refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    token: String,
    refresh_token: String,
    user: UserView,
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    let trimmed = email.trim();
    if trimmed.is_empty() || !trimmed.contains('@') || trimmed.len() > 100 {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < 6 {
        return Err(ApiError::bad_request(
            "Password must be at least 6 characters",
        ));
    }
    Ok(())
}

async fn register(
    State(state): State<AuthState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = payload.username.trim();
    if username.len() < 2 || username.len() > 50 {
        return Err(ApiError::bad_request(
            "Username must be between 2 and 50 characters",
        ));
    }
    validate_email(&payload.email)?;
    validate_password(&payload.password)?;

    let role = match payload.role.as_deref() {
        None => UserRole::User,
        Some(raw) => {
            UserRole::parse(raw).ok_or_else(|| ApiError::bad_request("Unknown role"))?
        }
    };

    let session = state
        .sessions
        .register(username, payload.email.trim(), &payload.password, role)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            token: session.access_token,
            refresh_token: session.refresh_token,
            user: session.user,
        }),
    ))
}

async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_email(&payload.email)?;
    validate_password(&payload.password)?;

    let session = state
        .sessions
        .login(payload.email.trim(), &payload.password)
        .await?;

    Ok((
        StatusCode::OK,
        Json(SessionResponse {
            token: session.access_token,
            refresh_token: session.refresh_token,
            user: session.user,
        }),
    ))
}

async fn refresh_token(
    State(state): State<AuthState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.refresh_token.is_empty() {
        return Err(ApiError::bad_request("Refresh token is required"));
    }

    let token = state.sessions.refresh(&payload.refresh_token).await?;
    Ok(Json(serde_json::json!({ "token": token })))
}

/// Logout requires a valid access token in addition to the refresh token
/// being revoked.
async fn logout(
    State(state): State<AuthState>,
    _auth: Auth,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.refresh_token.is_empty() {
        return Err(ApiError::bad_request("Refresh token is required"));
    }

    state.sessions.logout(&payload.refresh_token).await?;
    Ok(Json(serde_json::json!({ "message": "Logged out successfully" })))
}

async fn profile(
    State(state): State<AuthState>,
    auth: Auth,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.sessions.profile(auth.identity.user_id).await?;
    Ok(Json(user))
}

#[derive(Deserialize)]
struct ListQuery {
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Serialize)]
struct ListUsersResponse {
    users: Vec<crate::db::UserSummary>,
    total: i64,
}

async fn list_users(
    State(state): State<AuthState>,
    _auth: Auth,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, limit) = clamp_pagination(query.page, query.limit);
    let (users, total) = state.sessions.list_users(page, limit).await?;
    Ok(Json(ListUsersResponse { users, total }))
}

async fn user_count(
    State(state): State<AuthState>,
    _auth: Auth,
) -> Result<impl IntoResponse, ApiError> {
    let total = state.sessions.user_count().await?;
    Ok(Json(serde_json::json!({ "total": total })))
}
