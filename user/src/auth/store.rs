//! Session storage and cookie configuration for tower-sessions

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::SqliteStore;
use tracing::{error, info};

use crate::error::{Result, UserError};

/// SQLx-based session store for tower-sessions
#[derive(Debug, Clone)]
pub struct SqlxSessionStore {
    store: SqliteStore,
    pool: SqlitePool,
}

impl SqlxSessionStore {
    /// Create a new SQLx session store, creating its table if needed
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        let store = SqliteStore::new(pool.clone());
        store.migrate().await.map_err(|e| {
            error!("Failed to create session table: {}", e);
            UserError::Database(e)
        })?;

        info!("SQLx session store initialized");
        Ok(Self { store, pool })
    }

    /// Get the underlying SqliteStore
    pub fn inner(&self) -> &SqliteStore {
        &self.store
    }

    /// Delete sessions whose expiry has passed. Returns how many were removed.
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let now = chrono::Utc::now().timestamp();

        let removed = sqlx::query("DELETE FROM tower_sessions WHERE expiry_date < ?")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to cleanup expired sessions: {}", e);
                UserError::Session(format!("Session cleanup failed: {}", e))
            })?
            .rows_affected();

        info!("Cleaned up {} expired sessions", removed);
        Ok(removed)
    }
}

/// Where session state lives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStoreKind {
    /// Process memory; sessions are lost on restart
    Memory,
    /// The `tower_sessions` table of the user database
    #[default]
    Sqlite,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session cookie name
    pub cookie_name: String,
    /// Inactivity timeout in seconds
    pub timeout_seconds: i64,
    /// Whether to use secure cookies (HTTPS only)
    pub secure: bool,
    /// SameSite cookie attribute
    pub same_site: SameSiteConfig,
    /// HTTP only cookie (not accessible via JavaScript)
    pub http_only: bool,
    pub store: SessionStoreKind,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "realm_gate_session".to_string(),
            timeout_seconds: 1800,
            secure: false,
            same_site: SameSiteConfig::Lax,
            http_only: true,
            store: SessionStoreKind::Sqlite,
        }
    }
}

impl SessionConfig {
    /// Build the tower-sessions layer for `store` with this cookie policy
    pub fn layer<S>(&self, store: S) -> SessionManagerLayer<S>
    where
        S: SessionStore + Clone,
    {
        SessionManagerLayer::new(store)
            .with_name(self.cookie_name.clone())
            .with_secure(self.secure)
            .with_http_only(self.http_only)
            .with_same_site(self.same_site.into())
            .with_expiry(Expiry::OnInactivity(time::Duration::seconds(
                self.timeout_seconds.max(1),
            )))
    }
}

/// SameSite cookie configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum SameSiteConfig {
    Strict,
    Lax,
    None,
}

impl From<SameSiteConfig> for tower_sessions::cookie::SameSite {
    fn from(config: SameSiteConfig) -> Self {
        match config {
            SameSiteConfig::Strict => tower_sessions::cookie::SameSite::Strict,
            SameSiteConfig::Lax => tower_sessions::cookie::SameSite::Lax,
            SameSiteConfig::None => tower_sessions::cookie::SameSite::None,
        }
    }
}
