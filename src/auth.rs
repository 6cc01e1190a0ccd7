//! Bearer credential resolution.
//!
//! The service never issues tokens. An [`IdentityProvider`] turns the bearer
//! credential into an [`Actor`]; handlers receive it through the `Actor`
//! extractor and pass it into every service call.
//!
//! The bundled [`SharedSecretIdentity`] understands
//! `Bearer {role}:{actor_id}:{secret}` credentials, where `secret` must match
//! the configured `AUTH_SECRET`.

use std::fmt;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing authorization header")]
    Missing,

    #[error("authorization header must use Bearer scheme")]
    WrongScheme,

    #[error("invalid credential: {0}")]
    Invalid(String),
}

pub trait IdentityProvider: Send + Sync {
    fn authenticate(&self, credential: &str) -> Result<Actor, AuthError>;
}

/// Role tokens signed with one shared secret.
#[derive(Clone)]
pub struct SharedSecretIdentity {
    secret: String,
}

impl SharedSecretIdentity {
    /// Returns `None` for a blank secret so an unconfigured service cannot
    /// accept tokens.
    pub fn new(secret: impl Into<String>) -> Option<Self> {
        let secret = secret.into();
        if secret.trim().is_empty() {
            None
        } else {
            Some(Self { secret })
        }
    }
}

impl fmt::Debug for SharedSecretIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSecretIdentity")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Constant-time comparison. Unequal lengths still run a comparison.
fn constant_time_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

impl IdentityProvider for SharedSecretIdentity {
    fn authenticate(&self, credential: &str) -> Result<Actor, AuthError> {
        let parts: Vec<&str> = credential.splitn(3, ':').collect();
        let [role, id, secret] = parts.as_slice() else {
            return Err(AuthError::Invalid(
                "expected {role}:{actor_id}:{secret}".to_string(),
            ));
        };

        if !constant_time_eq(secret, &self.secret) {
            return Err(AuthError::Invalid("invalid bearer token".to_string()));
        }

        let role = role.parse::<Role>().map_err(AuthError::Invalid)?;
        let id = id
            .parse::<Uuid>()
            .map_err(|err| AuthError::Invalid(format!("invalid actor id: {err}")))?;

        Ok(Actor::new(id, role))
    }
}

/// Pulls the credential out of an `Authorization: Bearer …` header value.
pub fn bearer_credential(header_value: Option<&str>) -> Result<&str, AuthError> {
    match header_value {
        Some(value) => value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .ok_or(AuthError::WrongScheme),
        None => Err(AuthError::Missing),
    }
}

pub fn authenticate(
    identity: &Arc<dyn IdentityProvider>,
    header_value: Option<&str>,
) -> Result<Actor, AuthError> {
    identity.authenticate(bearer_credential(header_value)?)
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        authenticate(&state.identity, header_value).map_err(|err| {
            tracing::warn!(reason = %err, "authentication failed");
            AppError::Unauthorized(err.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "550e8400-e29b-41d4-a716-446655440000";

    fn identity() -> SharedSecretIdentity {
        SharedSecretIdentity::new("s3cret").unwrap()
    }

    #[test]
    fn signed_role_token_resolves_actor() {
        let actor = identity()
            .authenticate(&format!("courier:{ID}:s3cret"))
            .unwrap();
        assert_eq!(actor.role, Role::Courier);
        assert_eq!(actor.id, ID.parse::<Uuid>().unwrap());
    }

    #[test]
    fn missing_or_wrong_secret_is_rejected() {
        for credential in [
            format!("admin:{ID}"),
            format!("admin:{ID}:"),
            format!("admin:{ID}:guess"),
            format!("admin:{ID}:s3cret2"),
        ] {
            assert!(
                matches!(identity().authenticate(&credential), Err(AuthError::Invalid(_))),
                "{credential} was accepted"
            );
        }
    }

    #[test]
    fn unknown_role_and_bad_id_are_rejected() {
        assert!(matches!(
            identity().authenticate(&format!("pilot:{ID}:s3cret")),
            Err(AuthError::Invalid(_))
        ));
        assert!(matches!(
            identity().authenticate("sender:not-a-uuid:s3cret"),
            Err(AuthError::Invalid(_))
        ));
    }

    #[test]
    fn blank_secret_cannot_build_a_provider() {
        assert!(SharedSecretIdentity::new("").is_none());
        assert!(SharedSecretIdentity::new("   ").is_none());
    }

    #[test]
    fn constant_time_eq_matches_only_identical_values() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abd", "abc"));
        assert!(!constant_time_eq("ab", "abc"));
        assert!(!constant_time_eq("", "abc"));
    }

    #[test]
    fn bearer_scheme_is_required() {
        assert_eq!(bearer_credential(Some("Bearer abc")), Ok("abc"));
        assert_eq!(bearer_credential(Some("Basic abc")), Err(AuthError::WrongScheme));
        assert_eq!(bearer_credential(None), Err(AuthError::Missing));
    }
}
