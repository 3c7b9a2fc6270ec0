pub mod admin;
pub mod auth;
pub mod credential_store;
pub mod database;
pub mod error;

use authz_cache::AuthorizationCache;
use std::sync::Arc;
use tracing::info;

pub use admin::{UserAdmin, UserSummary};
pub use auth::{
    AuthenticationOutcome, Credentials, CredentialsMatcher, HashAlgorithm, MatcherConfig, Realm,
    RejectReason, SecretRecord, SessionConfig, SessionStoreKind, SqlxSessionStore,
};
pub use credential_store::{CredentialStore, SqlxCredentialStore, StoreError};
use database::UserDatabase;

/// Principals, their credentials and grants, wired over one database
pub struct UserManager {
    database: Arc<UserDatabase>,
    realm: Arc<Realm>,
    admin: UserAdmin,
    session_store: SqlxSessionStore,
    session_config: SessionConfig,
}

impl UserManager {
    /// Create a new user manager with the provided configuration
    pub async fn new(
        db_config: database::UserDatabaseConfig,
        session_config: SessionConfig,
        matcher_config: &MatcherConfig,
        cache: Arc<dyn AuthorizationCache>,
    ) -> error::Result<Self> {
        info!("Initializing user management system");

        let query_timeout = db_config.query_timeout();
        let database = Arc::new(database::UserDatabase::new(db_config).await?);
        let pool = database.get_pool().clone();

        let matcher = CredentialsMatcher::from_config(matcher_config);
        let store = Arc::new(SqlxCredentialStore::new(pool.clone(), query_timeout));
        let realm = Arc::new(Realm::new(store, cache, matcher.clone()));
        let admin = UserAdmin::new(pool.clone(), matcher, realm.clone());

        let session_store = SqlxSessionStore::new(pool).await?;

        info!("User management system initialized successfully");

        Ok(Self {
            database,
            realm,
            admin,
            session_store,
            session_config,
        })
    }

    /// Get a reference to the database
    pub fn database(&self) -> &UserDatabase {
        &self.database
    }

    pub fn realm(&self) -> Arc<Realm> {
        self.realm.clone()
    }

    pub fn admin(&self) -> &UserAdmin {
        &self.admin
    }

    /// Get a reference to the session store
    pub fn session_store(&self) -> &SqlxSessionStore {
        &self.session_store
    }

    /// Get the session configuration
    pub fn session_config(&self) -> &SessionConfig {
        &self.session_config
    }

    /// Verify system integrity
    pub async fn verify_integrity(&self) -> error::Result<bool> {
        self.database.verify_integrity().await
    }

    /// Clean up expired sessions
    pub async fn cleanup_expired(&self) -> error::Result<u64> {
        self.session_store.cleanup_expired().await
    }
}

// Re-export commonly used types
pub use database::UserDatabaseConfig;
pub use error::{RealmError, Result as UserResult, UserError};

// Re-export session types
pub use auth::session::SessionManager;
pub use auth::store::SameSiteConfig;

#[cfg(test)]
mod tests {
    use super::*;
    use authz_cache::MemoryCache;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_user_manager_creation() {
        let temp_dir = TempDir::new().unwrap();

        let config = UserDatabaseConfig {
            database_path: temp_dir.path().join("test_user.db"),
            ..UserDatabaseConfig::default()
        };

        let manager = UserManager::new(
            config,
            SessionConfig::default(),
            &MatcherConfig::default(),
            Arc::new(MemoryCache::new()),
        )
        .await
        .unwrap();

        assert!(manager.verify_integrity().await.unwrap());

        manager.admin().create_user("alice", "secret").await.unwrap();
        manager.admin().grant_role("alice", "admin").await.unwrap();

        let realm = manager.realm();
        assert!(realm.authenticate("alice", "secret").await.is_authenticated());
        assert!(realm.has_role("alice", "admin").await.unwrap());
        assert_eq!(manager.cleanup_expired().await.unwrap(), 0);
    }
}
