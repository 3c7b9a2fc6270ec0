//! Authorization cache for resolved role and permission sets.
//!
//! The realm asks the cache before going to the credential store and writes
//! every successful resolution back. Nothing here invalidates on its own:
//! whoever mutates role or permission assignments must call
//! [`AuthorizationCache::invalidate`] for the affected principals.
//!
//! Two backends implement the same capability trait:
//!
//! - [`MemoryCache`]: process-local map behind a tokio `RwLock`
//! - [`PersistentCache`]: ReDB key-value file that survives restarts

pub mod error;
pub mod memory;
pub mod persistent;

use async_trait::async_trait;
use authz::types::AuthorizationRecord;
use serde::{Deserialize, Serialize};

pub use error::{CacheError, Result};
pub use memory::MemoryCache;
pub use persistent::PersistentCache;

/// Key-value store from principal name to its resolved authorization data.
#[async_trait]
pub trait AuthorizationCache: Send + Sync {
    /// Fetch a live (non-expired) record.
    async fn get(&self, principal: &str) -> Result<Option<AuthorizationRecord>>;

    /// Store or replace the record for `principal`.
    async fn put(&self, principal: &str, record: AuthorizationRecord) -> Result<()>;

    /// Drop the record for `principal`. Returns whether one was present.
    async fn invalidate(&self, principal: &str) -> Result<bool>;

    /// Drop every record. Returns how many were removed.
    async fn clear(&self) -> Result<usize>;

    /// Counters describing the cache contents.
    async fn stats(&self) -> Result<CacheStats>;

    /// Drop every expired record. Returns how many were removed.
    ///
    /// Expired records are never served, this only reclaims their space.
    async fn evict_expired(&self) -> Result<usize> {
        Ok(0)
    }
}

/// Statistics about the cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub backend: String,
    pub total_entries: usize,
    pub expired_entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Entry lifetime policy shared by the backends.
///
/// `None` keeps entries until invalidation or restart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ttl(pub Option<i64>);

impl Ttl {
    pub fn seconds(seconds: i64) -> Self {
        Self(Some(seconds))
    }

    pub fn forever() -> Self {
        Self(None)
    }

    /// TTL of 0 means expired immediately, positive TTL is checked against age
    pub fn is_expired(&self, record: &AuthorizationRecord) -> bool {
        match self.0 {
            None => false,
            Some(ttl) if ttl <= 0 => true,
            Some(ttl) => record.age_seconds() >= ttl,
        }
    }
}
