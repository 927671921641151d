//! Tests for the session token lifecycle.
//!
//! Tests cover:
//! - Registration and login round trips
//! - Duplicate registration, including the concurrent race
//! - Token refresh, revocation via logout, and the no-rotation behavior
//! - Access token expiry and key separation between token kinds
//! - The authentication gate on protected routes

mod common;

use axum::http::StatusCode;
use carelog::db::UserRole;
use carelog::jwt::ACCESS_TOKEN_DURATION_SECS;
use common::{
    access_token_for, body_json, json_request, register_user, send, setup, test_keys,
};
use serde_json::json;

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn test_register_returns_tokens_and_sanitized_user() {
    let (app, _db) = setup().await;

    let session = register_user(&app, "alice", "a@x.com", "secret1", None).await;

    assert!(!session["token"].as_str().unwrap().is_empty());
    assert!(!session["refreshToken"].as_str().unwrap().is_empty());
    assert_eq!(session["user"]["username"], "alice");
    assert_eq!(session["user"]["email"], "a@x.com");
    assert_eq!(session["user"]["role"], "user");
    assert!(
        session["user"].get("password").is_none()
            && session["user"].get("password_hash").is_none(),
        "Credentials must never appear in responses"
    );
}

#[tokio::test]
async fn test_register_duplicate_email_conflict() {
    let (app, _db) = setup().await;

    register_user(&app, "alice", "a@x.com", "secret1", None).await;

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"username": "bob", "email": "a@x.com", "password": "secret1"})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_duplicate_username_conflict() {
    let (app, _db) = setup().await;

    register_user(&app, "alice", "a@x.com", "secret1", None).await;

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"username": "alice", "email": "b@x.com", "password": "secret1"})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_concurrent_registration_single_success() {
    let (app, _db) = setup().await;

    let request = || {
        json_request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"username": "alice", "email": "a@x.com", "password": "secret1"})),
        )
    };

    let (first, second) = tokio::join!(send(&app, request()), send(&app, request()));

    let mut statuses = [first.status(), second.status()];
    statuses.sort();
    assert_eq!(
        statuses,
        [StatusCode::CREATED, StatusCode::CONFLICT],
        "Exactly one concurrent registration may win"
    );
}

#[tokio::test]
async fn test_register_validation() {
    let (app, _db) = setup().await;

    let cases = [
        json!({"username": "a", "email": "a@x.com", "password": "secret1"}),
        json!({"username": "alice", "email": "not-an-email", "password": "secret1"}),
        json!({"username": "alice", "email": "a@x.com", "password": "short"}),
        json!({"username": "alice", "email": "a@x.com", "password": "secret1", "role": "owner"}),
    ];

    for body in cases {
        let response = send(&app, json_request("POST", "/api/auth/register", None, Some(body))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

// =============================================================================
// Login
// =============================================================================

#[tokio::test]
async fn test_register_then_login_yields_same_identity() {
    let (app, _db) = setup().await;

    let registered = register_user(&app, "alice", "a@x.com", "secret1", None).await;

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "a@x.com", "password": "secret1"})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let logged_in = body_json(response).await;

    // Decoded claims from both sessions identify the same user.
    let keys = test_keys();
    let claims_a = keys
        .verify_access_token(registered["token"].as_str().unwrap())
        .unwrap();
    let claims_b = keys
        .verify_access_token(logged_in["token"].as_str().unwrap())
        .unwrap();
    assert_eq!(claims_a.user_id, claims_b.user_id);
    assert_eq!(claims_b.email, "a@x.com");
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let (app, _db) = setup().await;

    register_user(&app, "alice", "a@x.com", "secret1", None).await;

    let unknown_email = send(
        &app,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "nobody@x.com", "password": "secret1"})),
        ),
    )
    .await;
    let wrong_password = send(
        &app,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "a@x.com", "password": "secret2"})),
        ),
    )
    .await;

    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);

    // Same body for both, so responses cannot be used to enumerate accounts.
    let body_a = body_json(unknown_email).await;
    let body_b = body_json(wrong_password).await;
    assert_eq!(body_a, body_b);
}

// =============================================================================
// Refresh
// =============================================================================

#[tokio::test]
async fn test_refresh_returns_new_access_token() {
    let (app, _db) = setup().await;

    let session = register_user(&app, "alice", "a@x.com", "secret1", None).await;
    let refresh_token = session["refreshToken"].as_str().unwrap();

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/auth/refresh-token",
            None,
            Some(json!({"refreshToken": refresh_token})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let claims = test_keys()
        .verify_access_token(body["token"].as_str().unwrap())
        .unwrap();
    assert_eq!(claims.email, "a@x.com");
}

#[tokio::test]
async fn test_refresh_is_not_rotated_on_use() {
    let (app, _db) = setup().await;

    let session = register_user(&app, "alice", "a@x.com", "secret1", None).await;
    let refresh_token = session["refreshToken"].as_str().unwrap();

    // The same refresh token works repeatedly until logout or expiry.
    for _ in 0..2 {
        let response = send(
            &app,
            json_request(
                "POST",
                "/api/auth/refresh-token",
                None,
                Some(json!({"refreshToken": refresh_token})),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_refresh_rejects_garbage_token() {
    let (app, _db) = setup().await;

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/auth/refresh-token",
            None,
            Some(json!({"refreshToken": "not-a-token"})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_rejects_empty_token() {
    let (app, _db) = setup().await;

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/auth/refresh-token",
            None,
            Some(json!({"refreshToken": ""})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refresh_rejects_well_signed_but_unstored_token() {
    let (app, _db) = setup().await;

    let session = register_user(&app, "alice", "a@x.com", "secret1", None).await;
    let user_id = session["user"]["id"].as_i64().unwrap();

    // Correctly signed, but never persisted by a login or registration.
    let forged = test_keys()
        .issue_refresh_token(
            user_id,
            "a@x.com",
            UserRole::User,
            carelog::jwt::unix_now().unwrap() - 1,
        )
        .unwrap();

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/auth/refresh-token",
            None,
            Some(json!({"refreshToken": forged.token})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Logout / revocation
// =============================================================================

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let (app, _db) = setup().await;

    let session = register_user(&app, "alice", "a@x.com", "secret1", None).await;
    let access_token = session["token"].as_str().unwrap();
    let refresh_token = session["refreshToken"].as_str().unwrap();

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/auth/logout",
            Some(access_token),
            Some(json!({"refreshToken": refresh_token})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // The revoked token can no longer mint access tokens.
    let response = send(
        &app,
        json_request(
            "POST",
            "/api/auth/refresh-token",
            None,
            Some(json!({"refreshToken": refresh_token})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_second_logout_reports_unknown_token() {
    let (app, _db) = setup().await;

    let session = register_user(&app, "alice", "a@x.com", "secret1", None).await;
    let access_token = session["token"].as_str().unwrap();
    let refresh_token = session["refreshToken"].as_str().unwrap();

    let logout = || {
        json_request(
            "POST",
            "/api/auth/logout",
            Some(access_token),
            Some(json!({"refreshToken": refresh_token})),
        )
    };

    let first = send(&app, logout()).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = send(&app, logout()).await;
    assert_eq!(second.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_requires_access_token() {
    let (app, _db) = setup().await;

    let session = register_user(&app, "alice", "a@x.com", "secret1", None).await;
    let refresh_token = session["refreshToken"].as_str().unwrap();

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/auth/logout",
            None,
            Some(json!({"refreshToken": refresh_token})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_only_revokes_the_given_session() {
    let (app, _db) = setup().await;

    // Two sessions for the same account (register, then login again).
    let first = register_user(&app, "alice", "a@x.com", "secret1", None).await;
    let login = send(
        &app,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "a@x.com", "password": "secret1"})),
        ),
    )
    .await;
    assert_eq!(login.status(), StatusCode::OK);
    let second = body_json(login).await;

    // Revoke the first session's refresh token.
    let response = send(
        &app,
        json_request(
            "POST",
            "/api/auth/logout",
            Some(first["token"].as_str().unwrap()),
            Some(json!({"refreshToken": first["refreshToken"]})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // The second session's refresh token still works.
    let response = send(
        &app,
        json_request(
            "POST",
            "/api/auth/refresh-token",
            None,
            Some(json!({"refreshToken": second["refreshToken"]})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Access token verification
// =============================================================================

#[tokio::test]
async fn test_expired_access_token_rejected() {
    let (app, _db) = setup().await;

    register_user(&app, "alice", "a@x.com", "secret1", None).await;

    let expired = test_keys()
        .issue_access_token(
            1,
            "a@x.com",
            UserRole::User,
            carelog::jwt::unix_now().unwrap() - ACCESS_TOKEN_DURATION_SECS - 60,
        )
        .unwrap();

    let response = send(
        &app,
        json_request("GET", "/api/auth/count", Some(&expired), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_token_rejected_as_bearer_credential() {
    let (app, _db) = setup().await;

    let session = register_user(&app, "alice", "a@x.com", "secret1", None).await;
    let refresh_token = session["refreshToken"].as_str().unwrap();

    // Signed with the refresh secret, so the access verifier must reject it.
    let response = send(
        &app,
        json_request("GET", "/api/auth/count", Some(refresh_token), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_tampered_access_token_rejected() {
    let (app, _db) = setup().await;

    let session = register_user(&app, "alice", "a@x.com", "secret1", None).await;
    let mut token = session["token"].as_str().unwrap().to_string();
    token.pop();

    let response = send(
        &app,
        json_request("GET", "/api/auth/count", Some(&token), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Protected user listing + profile
// =============================================================================

#[tokio::test]
async fn test_user_listing_scenario() {
    let (app, _db) = setup().await;

    let session = register_user(&app, "alice", "a@x.com", "secret1", Some("admin")).await;
    let token = session["token"].as_str().unwrap();
    assert!(!token.is_empty());
    assert!(!session["refreshToken"].as_str().unwrap().is_empty());

    let response = send(&app, json_request("GET", "/api/auth", Some(token), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["users"][0]["username"], "alice");
    assert_eq!(body["users"][0]["role"], "admin");

    let response = send(&app, json_request("GET", "/api/auth", None, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_listing_pagination() {
    let (app, _db) = setup().await;

    register_user(&app, "alice", "a@x.com", "secret1", None).await;
    register_user(&app, "bob", "b@x.com", "secret1", None).await;
    register_user(&app, "carol", "c@x.com", "secret1", None).await;
    let token = access_token_for(&app, "dave", "d@x.com", None).await;

    let response = send(
        &app,
        json_request("GET", "/api/auth?page=2&limit=2", Some(&token), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 4);
    assert_eq!(body["users"].as_array().unwrap().len(), 2);
    assert_eq!(body["users"][0]["username"], "carol");
}

#[tokio::test]
async fn test_user_count() {
    let (app, _db) = setup().await;

    let token = access_token_for(&app, "alice", "a@x.com", None).await;
    register_user(&app, "bob", "b@x.com", "secret1", None).await;

    let response = send(&app, json_request("GET", "/api/auth/count", Some(&token), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["total"], 2);
}

#[tokio::test]
async fn test_profile_returns_sanitized_user() {
    let (app, _db) = setup().await;

    let token = access_token_for(&app, "alice", "a@x.com", Some("admin")).await;

    let response = send(
        &app,
        json_request("GET", "/api/auth/profile", Some(&token), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["username"], "alice");
    assert_eq!(body["role"], "admin");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let (app, _db) = setup().await;

    let response = send(&app, json_request("GET", "/api/nope", None, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["message"], "Route not found");
}
