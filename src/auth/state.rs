//! Authentication state trait and macro.

use crate::jwt::JwtKeys;

/// Trait for router state types that can authenticate requests. Only the
/// verification keys are needed: access tokens are checked without touching
/// any store.
pub trait HasAuthBackend {
    fn jwt(&self) -> &JwtKeys;
}

/// Macro to implement `HasAuthBackend` for state structs with a
/// `jwt: Arc<JwtKeys>` field.
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn jwt(&self) -> &$crate::jwt::JwtKeys {
                &self.jwt
            }
        }
    };
}
