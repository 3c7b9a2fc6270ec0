//! Session helpers for the authenticated principal

use authz::types::Principal;
use tower_sessions::Session;
use tracing::debug;

use crate::error::{Result, UserError};

/// Session configuration re-export
pub use super::store::SessionConfig;

/// Session keys used for storing data
pub struct SessionKeys;

impl SessionKeys {
    pub const PRINCIPAL: &'static str = "principal";
    pub const SAVED_REQUEST: &'static str = "saved_request";
    pub const AUTHENTICATED_AT: &'static str = "authenticated_at";
}

fn session_error(action: &str, e: impl std::fmt::Display) -> UserError {
    UserError::Session(format!("Failed to {}: {}", action, e))
}

/// Stateless helpers over a tower-sessions [`Session`]
pub struct SessionManager;

impl SessionManager {
    /// Bind `principal` to the session under a fresh session id
    pub async fn login(session: &Session, principal: &Principal) -> Result<()> {
        // new id on privilege change
        session
            .cycle_id()
            .await
            .map_err(|e| session_error("cycle session id", e))?;

        session
            .insert(SessionKeys::PRINCIPAL, principal)
            .await
            .map_err(|e| session_error("set principal", e))?;

        session
            .insert(SessionKeys::AUTHENTICATED_AT, chrono::Utc::now())
            .await
            .map_err(|e| session_error("set authenticated_at", e))?;

        debug!("Session bound to principal: {}", principal);
        Ok(())
    }

    /// The principal bound to this session, if any
    pub async fn principal(session: &Session) -> Result<Option<Principal>> {
        session
            .get::<Principal>(SessionKeys::PRINCIPAL)
            .await
            .map_err(|e| session_error("get principal", e))
    }

    /// Remember where an unauthenticated request was headed
    pub async fn save_requested_path(session: &Session, path: &str) -> Result<()> {
        session
            .insert(SessionKeys::SAVED_REQUEST, path)
            .await
            .map_err(|e| session_error("save requested path", e))
    }

    /// Remove and return the saved request path
    pub async fn take_requested_path(session: &Session) -> Result<Option<String>> {
        session
            .remove::<String>(SessionKeys::SAVED_REQUEST)
            .await
            .map_err(|e| session_error("take requested path", e))
    }

    /// Destroy a session (logout)
    pub async fn destroy_session(session: &Session) -> Result<()> {
        session
            .flush()
            .await
            .map_err(|e| session_error("flush session", e))?;

        debug!("Session destroyed");
        Ok(())
    }

    /// Check if a session is authenticated
    pub async fn is_authenticated(session: &Session) -> bool {
        Self::principal(session).await.ok().flatten().is_some()
    }
}
