//! Session lifecycle: registration, login, token refresh, and revocation.
//!
//! Each registration or login issues a fresh access/refresh token pair and
//! persists the refresh token; a user may hold any number of concurrent
//! refresh tokens. Refresh verifies the token cryptographically, then
//! confirms it is still stored under the claimed user, and mints a new
//! access token without touching the refresh token.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::db::{Database, RefreshTokenStore, UserRole, UserSummary};
use crate::jwt::{self, JwtError, JwtKeys};
use crate::password::{self, PasswordError};

/// Sanitized user view returned from register/login. Never carries the
/// password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: UserRole,
}

/// Result of a successful registration or login.
#[derive(Debug)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserView,
}

/// Failures the session operations can produce. Mapped to HTTP status codes
/// once, at the API boundary.
#[derive(Debug)]
pub enum SessionError {
    /// Registration with an email that already has an account
    EmailTaken,
    /// Registration with a username that already has an account
    UsernameTaken,
    /// Login with an email no account has
    UnknownEmail,
    /// Login with a wrong password
    WrongPassword,
    /// Refresh or logout with a token that is unknown, revoked, or expired
    InvalidRefreshToken,
    /// Profile lookup for a user that does not exist
    UserNotFound,
    Db(sqlx::Error),
    Jwt(JwtError),
    Hash(PasswordError),
    /// The blocking hash task was cancelled or panicked
    Blocking,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::EmailTaken => write!(f, "Email already registered"),
            SessionError::UsernameTaken => write!(f, "Username already taken"),
            SessionError::UnknownEmail => write!(f, "User not found"),
            SessionError::WrongPassword => write!(f, "Incorrect password"),
            SessionError::InvalidRefreshToken => write!(f, "Invalid or expired refresh token"),
            SessionError::UserNotFound => write!(f, "User not found"),
            SessionError::Db(e) => write!(f, "Store failure: {}", e),
            SessionError::Jwt(e) => write!(f, "Token failure: {}", e),
            SessionError::Hash(e) => write!(f, "{}", e),
            SessionError::Blocking => write!(f, "Hashing task failed"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<sqlx::Error> for SessionError {
    fn from(e: sqlx::Error) -> Self {
        SessionError::Db(e)
    }
}

impl From<JwtError> for SessionError {
    fn from(e: JwtError) -> Self {
        SessionError::Jwt(e)
    }
}

impl From<PasswordError> for SessionError {
    fn from(e: PasswordError) -> Self {
        SessionError::Hash(e)
    }
}

/// Orchestrates the credential store, refresh token store, and token issuer.
#[derive(Clone)]
pub struct SessionService {
    db: Database,
    jwt: Arc<JwtKeys>,
}

impl SessionService {
    pub fn new(db: Database, jwt: Arc<JwtKeys>) -> Self {
        Self { db, jwt }
    }

    /// Register a new user and open a session. The pre-insert email check
    /// gives a friendly error; the UNIQUE constraints are what actually hold
    /// under concurrent registration.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: UserRole,
    ) -> Result<SessionTokens, SessionError> {
        if self.db.users().find_by_email(email).await?.is_some() {
            return Err(SessionError::EmailTaken);
        }

        let password_hash = hash_blocking(password.to_string()).await?;

        let user_id = match self
            .db
            .users()
            .create(username, email, &password_hash, role)
            .await
        {
            Ok(id) => id,
            Err(e) if crate::db::is_unique_violation(&e) => {
                let taken_username = e
                    .as_database_error()
                    .is_some_and(|d| d.message().contains("users.username"));
                return Err(if taken_username {
                    SessionError::UsernameTaken
                } else {
                    SessionError::EmailTaken
                });
            }
            Err(e) => return Err(e.into()),
        };

        self.open_session(user_id, username, email, role).await
    }

    /// Authenticate a user and open a session. Unknown email and wrong
    /// password stay distinct here for logging; the API boundary collapses
    /// them into one response.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionTokens, SessionError> {
        let user = self
            .db
            .users()
            .find_by_email(email)
            .await?
            .ok_or(SessionError::UnknownEmail)?;

        let valid = verify_blocking(password.to_string(), user.password_hash.clone()).await?;
        if !valid {
            return Err(SessionError::WrongPassword);
        }

        self.open_session(user.id, &user.username, &user.email, user.role)
            .await
    }

    /// Exchange a valid refresh token for a new access token. The refresh
    /// token itself is left untouched and stays usable until logout or
    /// natural expiry.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, SessionError> {
        // Signature and expiry first; the store is only consulted for a
        // token that provably came from us.
        let claims = self
            .jwt
            .verify_refresh_token(refresh_token)
            .map_err(|e| {
                debug!(error = %e, "Refresh token failed verification");
                SessionError::InvalidRefreshToken
            })?;

        let now = jwt::unix_now()?;
        let stored = self
            .db
            .tokens()
            .find_active(claims.user_id, refresh_token, now as i64)
            .await?;

        let Some(stored) = stored else {
            debug!(user_id = claims.user_id, "Refresh token not active in store");
            return Err(SessionError::InvalidRefreshToken);
        };

        if RefreshTokenStore::is_expired(stored.expires_at, now as i64) {
            debug!(user_id = claims.user_id, "Refresh token found but expired");
            return Err(SessionError::InvalidRefreshToken);
        }

        let access_token = self
            .jwt
            .issue_access_token(claims.user_id, &claims.email, claims.role, now)?;
        Ok(access_token)
    }

    /// Revoke a refresh token. Reports failure when no stored row matched,
    /// so a second logout with the same token is an error to the caller but
    /// harmless to the store.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), SessionError> {
        let deleted = self.db.tokens().delete(refresh_token).await?;
        if !deleted {
            return Err(SessionError::InvalidRefreshToken);
        }
        Ok(())
    }

    /// Fetch the sanitized profile of a user.
    pub async fn profile(&self, user_id: i64) -> Result<UserSummary, SessionError> {
        let user = self
            .db
            .users()
            .find_by_id(user_id)
            .await?
            .ok_or(SessionError::UserNotFound)?;

        Ok(UserSummary {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        })
    }

    /// Paginated user listing, passed through to the credential store.
    pub async fn list_users(
        &self,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<UserSummary>, i64), SessionError> {
        Ok(self.db.users().list(page, limit).await?)
    }

    /// Total user count.
    pub async fn user_count(&self) -> Result<i64, SessionError> {
        Ok(self.db.users().count().await?)
    }

    /// Issue both tokens and persist the refresh token.
    async fn open_session(
        &self,
        user_id: i64,
        username: &str,
        email: &str,
        role: UserRole,
    ) -> Result<SessionTokens, SessionError> {
        let now = jwt::unix_now()?;
        let access_token = self.jwt.issue_access_token(user_id, email, role, now)?;
        let refresh = self.jwt.issue_refresh_token(user_id, email, role, now)?;

        self.db
            .tokens()
            .insert(
                user_id,
                &refresh.token,
                refresh.expires_at as i64,
                refresh.issued_at as i64,
            )
            .await?;

        Ok(SessionTokens {
            access_token,
            refresh_token: refresh.token,
            user: UserView {
                id: user_id,
                username: username.to_string(),
                email: email.to_string(),
                role,
            },
        })
    }
}

/// Run Argon2 hashing off the async workers; concurrent registrations hash
/// in parallel instead of serializing behind one CPU-bound task.
async fn hash_blocking(password: String) -> Result<String, SessionError> {
    tokio::task::spawn_blocking(move || password::hash(&password))
        .await
        .map_err(|_| SessionError::Blocking)?
        .map_err(SessionError::from)
}

async fn verify_blocking(password: String, stored: String) -> Result<bool, SessionError> {
    tokio::task::spawn_blocking(move || password::verify(&password, &stored))
        .await
        .map_err(|_| SessionError::Blocking)?
        .map_err(SessionError::from)
}
