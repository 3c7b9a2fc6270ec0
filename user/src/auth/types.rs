//! Authentication types

use authz::types::Principal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Login form submitted to the login endpoint
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Why a login attempt was refused
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    UnknownPrincipal,
    InvalidCredential,
    StoreUnavailable,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::UnknownPrincipal => write!(f, "unknown_principal"),
            RejectReason::InvalidCredential => write!(f, "invalid_credential"),
            RejectReason::StoreUnavailable => write!(f, "store_unavailable"),
        }
    }
}

/// Result of a login attempt.
///
/// Refusals are ordinary outcomes, not errors. Callers must not tell the two
/// credential refusals apart in anything a client can observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationOutcome {
    Authenticated(Principal),
    Rejected(RejectReason),
}

impl AuthenticationOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthenticationOutcome::Authenticated(_))
    }

    /// Get the principal if authenticated
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            AuthenticationOutcome::Authenticated(principal) => Some(principal),
            AuthenticationOutcome::Rejected(_) => None,
        }
    }
}
