use thiserror::Error;

use crate::credential_store::StoreError;

#[derive(Error, Debug)]
pub enum UserError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Authorization error: {0}")]
    Realm(#[from] RealmError),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Role not found: {0}")]
    RoleNotFound(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Session error: {0}")]
    Session(String),
}

pub type Result<T> = std::result::Result<T, UserError>;

/// Infrastructure faults raised while resolving authorization data.
///
/// A principal lacking a role is not an error; these variants only cover the
/// cases where no answer could be produced, and callers must deny.
#[derive(Error, Debug)]
pub enum RealmError {
    #[error("Credential store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Authorization cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Credential store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for RealmError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(reason) => RealmError::StoreUnavailable(reason),
            other => RealmError::Store(other),
        }
    }
}

impl From<authz_cache::CacheError> for RealmError {
    fn from(err: authz_cache::CacheError) -> Self {
        RealmError::CacheUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_realm_errors() {
        let err: RealmError = StoreError::Unavailable("pool timed out".to_string()).into();
        assert!(matches!(err, RealmError::StoreUnavailable(_)));

        let err: RealmError = StoreError::NotFound("ghost".to_string()).into();
        assert!(matches!(err, RealmError::Store(StoreError::NotFound(_))));
    }

    #[test]
    fn test_cache_errors_map_to_cache_unavailable() {
        let err: RealmError = authz_cache::CacheError::Unavailable("down".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Authorization cache unavailable: Cache backend unavailable: down"
        );
    }
}
