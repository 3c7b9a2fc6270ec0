//! Credential store adapter over the relational user tables.

use async_trait::async_trait;
use sqlx::{Pool, Sqlite};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

use crate::auth::matcher::{HashAlgorithm, SecretRecord};

const SECRET_QUERY: &str =
    "SELECT password, salt, hash_algorithm, hash_iterations FROM users WHERE username = ?";

const ROLES_QUERY: &str = "SELECT rname FROM users_roles ur \
     JOIN users u ON ur.uid = u.uid \
     JOIN roles r ON ur.rid = r.rid \
     WHERE username = ?";

const PERMISSIONS_QUERY: &str = "SELECT pname FROM roles_permissions rp \
     JOIN roles r ON rp.rid = r.rid \
     JOIN permissions p ON rp.pid = p.pid \
     WHERE rname = ?";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Principal not found: {0}")]
    NotFound(String),

    #[error("Credential store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt credential record for {username}: {reason}")]
    Corrupt { username: String, reason: String },

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_) => StoreError::Unavailable(err.to_string()),
            other => StoreError::Database(other),
        }
    }
}

/// Read access to principals, their roles and the permissions of a role.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn fetch_secret(&self, username: &str) -> Result<SecretRecord, StoreError>;

    async fn fetch_roles(&self, username: &str) -> Result<Vec<String>, StoreError>;

    async fn fetch_permissions(&self, role: &str) -> Result<Vec<String>, StoreError>;
}

/// [`CredentialStore`] backed by a sqlx SQLite pool.
#[derive(Clone)]
pub struct SqlxCredentialStore {
    pool: Pool<Sqlite>,
    query_timeout: Duration,
}

impl SqlxCredentialStore {
    pub fn new(pool: Pool<Sqlite>, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    async fn bounded<T, F>(&self, what: &str, query: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.query_timeout, query).await {
            Ok(result) => result.map_err(|e| {
                let err = StoreError::from(e);
                if matches!(err, StoreError::Unavailable(_)) {
                    error!("Credential store unavailable during {}: {}", what, err);
                }
                err
            }),
            Err(_) => {
                error!(
                    "Credential store query timed out after {:?}: {}",
                    self.query_timeout, what
                );
                Err(StoreError::Unavailable(format!(
                    "{} timed out after {:?}",
                    what, self.query_timeout
                )))
            }
        }
    }
}

#[async_trait]
impl CredentialStore for SqlxCredentialStore {
    async fn fetch_secret(&self, username: &str) -> Result<SecretRecord, StoreError> {
        let row = self
            .bounded(
                "fetch_secret",
                sqlx::query_as::<_, (String, String, String, i64)>(SECRET_QUERY)
                    .bind(username)
                    .fetch_optional(&self.pool),
            )
            .await?;

        let (hash, salt, algorithm, iterations) =
            row.ok_or_else(|| StoreError::NotFound(username.to_string()))?;

        let algorithm: HashAlgorithm = algorithm.parse().map_err(|_| StoreError::Corrupt {
            username: username.to_string(),
            reason: format!("unknown hash algorithm '{}'", algorithm),
        })?;
        let iterations = u32::try_from(iterations)
            .ok()
            .filter(|n| *n > 0 && *n <= algorithm.max_iterations())
            .ok_or_else(|| StoreError::Corrupt {
                username: username.to_string(),
                reason: format!("invalid iteration count {}", iterations),
            })?;

        Ok(SecretRecord {
            hash,
            salt,
            algorithm,
            iterations,
        })
    }

    async fn fetch_roles(&self, username: &str) -> Result<Vec<String>, StoreError> {
        let roles = self
            .bounded(
                "fetch_roles",
                sqlx::query_scalar::<_, String>(ROLES_QUERY)
                    .bind(username)
                    .fetch_all(&self.pool),
            )
            .await?;
        debug!("Fetched {} roles for {}", roles.len(), username);
        Ok(roles)
    }

    async fn fetch_permissions(&self, role: &str) -> Result<Vec<String>, StoreError> {
        let permissions = self
            .bounded(
                "fetch_permissions",
                sqlx::query_scalar::<_, String>(PERMISSIONS_QUERY)
                    .bind(role)
                    .fetch_all(&self.pool),
            )
            .await?;
        debug!("Fetched {} permissions for role {}", permissions.len(), role);
        Ok(permissions)
    }
}
