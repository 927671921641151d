//! Axum extractors for authentication and role checks.

use std::marker::PhantomData;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};

use super::errors::{AuthErrorKind, AuthRejection};
use super::state::HasAuthBackend;
use crate::db::UserRole;
use crate::jwt::{Claims, JwtError};

/// Identity asserted for one in-flight request, decoded from the access
/// token. This is the entire contract the clinical-record handlers consume;
/// they never see the credential or token stores.
#[derive(Debug, Clone)]
pub struct RequestIdentity {
    pub user_id: i64,
    pub email: String,
    pub role: UserRole,
}

impl From<Claims> for RequestIdentity {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// Role set a route admits. Implementations are zero-sized markers used as
/// type parameters on [`Auth`].
pub trait RoleConstraint {
    fn allows(role: UserRole) -> bool;
}

/// Any authenticated user.
pub struct AnyRole;

impl RoleConstraint for AnyRole {
    fn allows(_role: UserRole) -> bool {
        true
    }
}

/// Admins only.
pub struct AdminOnly;

impl RoleConstraint for AdminOnly {
    fn allows(role: UserRole) -> bool {
        role == UserRole::Admin
    }
}

/// Extractor gating a route on a valid bearer access token, and optionally
/// on a role set. `Auth` alone is the authentication gate; `Auth<AdminOnly>`
/// composes the authorization gate on top (401 before 403: the role is only
/// examined once the token has been verified).
pub struct Auth<C: RoleConstraint = AnyRole> {
    pub identity: RequestIdentity,
    _constraint: PhantomData<fn() -> C>,
}

impl<S, C> FromRequestParts<S> for Auth<C>
where
    S: HasAuthBackend + Send + Sync,
    C: RoleConstraint,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AuthRejection::new(AuthErrorKind::NotAuthenticated))?;

        let claims = state.jwt().verify_access_token(token).map_err(|e| {
            AuthRejection::new(match e {
                JwtError::Expired => AuthErrorKind::TokenExpired,
                _ => AuthErrorKind::InvalidToken,
            })
        })?;

        let identity = RequestIdentity::from(claims);
        if !C::allows(identity.role) {
            return Err(AuthRejection::new(AuthErrorKind::InsufficientRole));
        }

        Ok(Auth {
            identity,
            _constraint: PhantomData,
        })
    }
}

/// Extract the token from the `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&headers_with("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers_with("Bearer ")), None);
        assert_eq!(bearer_token(&headers_with("Basic abc")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_role_constraints() {
        assert!(AnyRole::allows(UserRole::User));
        assert!(AnyRole::allows(UserRole::Admin));
        assert!(!AdminOnly::allows(UserRole::User));
        assert!(AdminOnly::allows(UserRole::Admin));
    }
}
