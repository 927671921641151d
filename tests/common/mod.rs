#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use carelog::{ServerConfig, create_app, db::Database, jwt::JwtKeys};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const ACCESS_SECRET: &[u8] = b"test-access-secret-32-bytes-long";
pub const REFRESH_SECRET: &[u8] = b"test-refresh-secret-32-bytes-lng";

/// Create a test app backed by an in-memory database.
pub async fn setup() -> (Router, Database) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        access_secret: ACCESS_SECRET.to_vec(),
        refresh_secret: REFRESH_SECRET.to_vec(),
    };
    (create_app(&config), db)
}

/// Key set matching the test app, for crafting tokens directly.
pub fn test_keys() -> JwtKeys {
    JwtKeys::new(ACCESS_SECRET, REFRESH_SECRET)
}

/// Build a request with an optional bearer token and JSON body.
pub fn json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Send a request through the app without consuming it.
pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

/// Parse a response body as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

/// Register a user through the API and return the session response
/// (`token`, `refreshToken`, `user`).
pub async fn register_user(
    app: &Router,
    username: &str,
    email: &str,
    password: &str,
    role: Option<&str>,
) -> Value {
    let mut body = json!({
        "username": username,
        "email": email,
        "password": password,
    });
    if let Some(role) = role {
        body["role"] = json!(role);
    }

    let response = send(
        app,
        json_request("POST", "/api/auth/register", None, Some(body)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

/// Register a user and return just the access token.
pub async fn access_token_for(
    app: &Router,
    username: &str,
    email: &str,
    role: Option<&str>,
) -> String {
    let session = register_user(app, username, email, "secret1", role).await;
    session["token"].as_str().unwrap().to_string()
}
