//! Authorization hooks and guards.
//!
//! Callers present `Authorization: Bearer <token>`. Tokens are resolved against
//! the configured token table; anything unknown becomes an anonymous caller
//! with no roles, and role-gated operations then fail with `403`.

use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use bookshelf_http::AppError;
use bookshelf_kernel::settings::AuthSettings;

/// Roles understood by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    User,
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let name = value.trim();
        let name = name.strip_prefix("ROLE_").unwrap_or(name);
        match name.to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "USER" => Ok(Role::User),
            other => Err(anyhow!("unknown role '{}'", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => f.write_str("ADMIN"),
            Role::User => f.write_str("USER"),
        }
    }
}

/// The identity attached to a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    subject: Option<String>,
    roles: HashSet<Role>,
}

impl Caller {
    pub fn new(subject: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            subject: Some(subject.into()),
            roles: roles.into_iter().collect(),
        }
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// Fail with `Forbidden(message)` unless the caller holds `role`.
///
/// Handlers call this before touching persistence or the cache.
pub fn require_role(caller: &Caller, role: Role, message: &str) -> Result<(), AppError> {
    if caller.has_role(role) {
        return Ok(());
    }

    tracing::info!(
        subject = caller.subject().unwrap_or("anonymous"),
        required_role = %role,
        "access denied"
    );
    Err(AppError::forbidden(message))
}

/// Resolves bearer tokens to callers.
#[derive(Debug, Clone, Default)]
pub struct Authorizer {
    tokens: Arc<HashMap<String, Caller>>,
}

impl Authorizer {
    pub fn from_settings(settings: &AuthSettings) -> Self {
        let tokens = settings
            .tokens
            .iter()
            .map(|entry| {
                let roles = entry.roles.iter().filter_map(|raw| match raw.parse::<Role>() {
                    Ok(role) => Some(role),
                    Err(err) => {
                        tracing::warn!(subject = %entry.subject, error = %err, "ignoring role");
                        None
                    }
                });
                (entry.token.clone(), Caller::new(entry.subject.clone(), roles))
            })
            .collect();

        Self {
            tokens: Arc::new(tokens),
        }
    }

    pub fn resolve(&self, headers: &HeaderMap) -> Caller {
        headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .and_then(|token| self.tokens.get(token.trim()))
            .cloned()
            .unwrap_or_default()
    }
}

impl<S> FromRequestParts<S> for Caller
where
    Authorizer: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Authorizer::from_ref(state).resolve(&parts.headers))
    }
}
