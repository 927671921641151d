//! Authentication gate error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Internal error kind produced by the authentication and authorization gates.
#[derive(Debug)]
pub enum AuthErrorKind {
    NotAuthenticated,
    InvalidToken,
    TokenExpired,
    InsufficientRole,
}

/// Rejection returned by the auth extractors. Maps to 401 for anything wrong
/// with the credential itself and 403 for a role mismatch; invalid and
/// expired tokens are deliberately indistinguishable to clients.
#[derive(Debug)]
pub struct AuthRejection {
    kind: AuthErrorKind,
}

impl AuthRejection {
    pub(super) fn new(kind: AuthErrorKind) -> Self {
        Self { kind }
    }

    fn status_code(&self) -> StatusCode {
        match self.kind {
            AuthErrorKind::NotAuthenticated
            | AuthErrorKind::InvalidToken
            | AuthErrorKind::TokenExpired => StatusCode::UNAUTHORIZED,
            AuthErrorKind::InsufficientRole => StatusCode::FORBIDDEN,
        }
    }

    fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::NotAuthenticated => "Authentication required",
            AuthErrorKind::InvalidToken | AuthErrorKind::TokenExpired => {
                "Invalid or expired token"
            }
            AuthErrorKind::InsufficientRole => "Insufficient permissions",
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        #[derive(serde::Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        tracing::debug!(kind = ?self.kind, "Request rejected by auth gate");

        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
