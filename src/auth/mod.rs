//! Bearer-token authentication with role-based access control.
//!
//! Dual-token system: access tokens (24h, stateless, verified per request
//! with no store access) and refresh tokens (7d, tracked in the database and
//! revocable via logout). Refreshing mints a new access token; the refresh
//! token itself is not rotated.

mod errors;
mod extractors;
mod service;
mod state;

pub use errors::{AuthErrorKind, AuthRejection};
pub use extractors::{AdminOnly, AnyRole, Auth, RequestIdentity, RoleConstraint};
pub use service::{SessionError, SessionService, SessionTokens, UserView};
pub use state::HasAuthBackend;
