//! JWT token generation and validation.
//!
//! Access and refresh tokens carry the same claims but are signed with two
//! independent secrets, so possession of one signing key never allows forging
//! the other token kind. Access tokens are verified statelessly; refresh
//! tokens additionally require a store lookup in the session service.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::db::UserRole;

/// Access token duration: 24 hours
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 24 * 60 * 60;

/// Refresh token duration: 7 days
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Claims embedded in both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Database user ID
    pub user_id: i64,
    /// User email
    pub email: String,
    /// User role
    pub role: UserRole,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Result of issuing a refresh token. The expiry is returned alongside the
/// token string so the caller can persist it in the refresh token store.
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    /// The JWT token string
    pub token: String,
    /// Issued at timestamp (Unix seconds)
    pub issued_at: u64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
}

/// Signing and verification keys for both token kinds.
#[derive(Clone)]
pub struct JwtKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl JwtKeys {
    /// Create the key set from the two signing secrets. The secrets must
    /// differ; startup validation enforces this before construction.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
        }
    }

    /// Issue an access token valid for 24 hours from `now`.
    pub fn issue_access_token(
        &self,
        user_id: i64,
        email: &str,
        role: UserRole,
        now: u64,
    ) -> Result<String, JwtError> {
        let claims = Claims {
            user_id,
            email: email.to_string(),
            role,
            iat: now,
            exp: now + ACCESS_TOKEN_DURATION_SECS,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &self.access_encoding)
            .map_err(JwtError::Encoding)
    }

    /// Issue a refresh token valid for 7 days from `now`, signed with the
    /// refresh secret.
    pub fn issue_refresh_token(
        &self,
        user_id: i64,
        email: &str,
        role: UserRole,
        now: u64,
    ) -> Result<IssuedRefreshToken, JwtError> {
        let exp = now + REFRESH_TOKEN_DURATION_SECS;
        let claims = Claims {
            user_id,
            email: email.to_string(),
            role,
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.refresh_encoding)
            .map_err(JwtError::Encoding)?;

        Ok(IssuedRefreshToken {
            token,
            issued_at: now,
            expires_at: exp,
        })
    }

    /// Validate and decode an access token.
    pub fn verify_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        Self::verify(token, &self.access_decoding)
    }

    /// Validate and decode a refresh token. This only proves the signature
    /// and expiry; revocation is checked against the refresh token store by
    /// the session service.
    pub fn verify_refresh_token(&self, token: &str) -> Result<Claims, JwtError> {
        Self::verify(token, &self.refresh_decoding)
    }

    fn verify(token: &str, key: &DecodingKey) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data =
            jsonwebtoken::decode::<Claims>(token, key, &validation).map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid(e),
            })?;

        Ok(token_data.claims)
    }
}

/// Current Unix time in seconds.
pub fn unix_now() -> Result<u64, JwtError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| JwtError::Time)
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Bad signature or malformed payload
    Invalid(jsonwebtoken::errors::Error),
    /// Token expiry has passed
    Expired,
    /// System time error
    Time,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Invalid(e) => write!(f, "Invalid token: {}", e),
            JwtError::Expired => write!(f, "Token has expired"),
            JwtError::Time => write!(f, "System time error"),
        }
    }
}

impl std::error::Error for JwtError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_keys() -> JwtKeys {
        JwtKeys::new(
            b"access-secret-for-testing-only!!",
            b"refresh-secret-for-testing-only!",
        )
    }

    #[test]
    fn test_issue_and_verify_access_token() {
        let keys = test_keys();
        let now = unix_now().unwrap();

        let token = keys
            .issue_access_token(42, "alice@example.com", UserRole::User, now)
            .unwrap();

        let claims = keys.verify_access_token(&token).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.role, UserRole::User);
        assert_eq!(claims.iat, now);
        assert_eq!(claims.exp, now + ACCESS_TOKEN_DURATION_SECS);
    }

    #[test]
    fn test_issue_and_verify_refresh_token() {
        let keys = test_keys();
        let now = unix_now().unwrap();

        let issued = keys
            .issue_refresh_token(42, "alice@example.com", UserRole::User, now)
            .unwrap();

        assert_eq!(issued.issued_at, now);
        assert_eq!(issued.expires_at, now + REFRESH_TOKEN_DURATION_SECS);

        let claims = keys.verify_refresh_token(&issued.token).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.exp, issued.expires_at);
    }

    #[test]
    fn test_token_kinds_are_not_interchangeable() {
        let keys = test_keys();
        let now = unix_now().unwrap();

        let access = keys
            .issue_access_token(1, "a@x.com", UserRole::User, now)
            .unwrap();
        let refresh = keys
            .issue_refresh_token(1, "a@x.com", UserRole::User, now)
            .unwrap();

        // Signed with distinct secrets, so cross-verification must fail.
        assert!(keys.verify_refresh_token(&access).is_err());
        assert!(keys.verify_access_token(&refresh.token).is_err());
    }

    #[test]
    fn test_admin_role_in_token() {
        let keys = test_keys();
        let now = unix_now().unwrap();

        let token = keys
            .issue_access_token(7, "admin@x.com", UserRole::Admin, now)
            .unwrap();

        let claims = keys.verify_access_token(&token).unwrap();
        assert_eq!(claims.role, UserRole::Admin);
    }

    #[test]
    fn test_malformed_token_rejected() {
        let keys = test_keys();

        match keys.verify_access_token("not-a-token") {
            Err(JwtError::Invalid(_)) => {}
            other => panic!("expected Invalid, got {:?}", other.map(|c| c.user_id)),
        }
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let keys1 = test_keys();
        let keys2 = JwtKeys::new(
            b"another-access-secret-32-bytes!!",
            b"another-refresh-secret-32-byte!!",
        );
        let now = unix_now().unwrap();

        let token = keys1
            .issue_access_token(1, "a@x.com", UserRole::User, now)
            .unwrap();

        assert!(keys2.verify_access_token(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = test_keys();
        let now = unix_now().unwrap();

        // Issue far enough in the past that the 24h window has passed.
        let token = keys
            .issue_access_token(
                1,
                "a@x.com",
                UserRole::User,
                now - ACCESS_TOKEN_DURATION_SECS - 60,
            )
            .unwrap();

        match keys.verify_access_token(&token) {
            Err(JwtError::Expired) => {}
            other => panic!("expected Expired, got {:?}", other.map(|c| c.user_id)),
        }
    }
}
