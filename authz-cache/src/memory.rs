//! In-process authorization cache.

use async_trait::async_trait;
use authz::types::AuthorizationRecord;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{AuthorizationCache, CacheStats, Result, Ttl};

/// Thread-safe in-memory cache with optional TTL
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, AuthorizationRecord>>>,
    ttl: Ttl,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl MemoryCache {
    /// Create a cache whose entries never expire
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache whose entries expire `ttl_seconds` after resolution
    pub fn with_ttl(ttl_seconds: i64) -> Self {
        Self {
            ttl: Ttl::seconds(ttl_seconds),
            ..Self::default()
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl AuthorizationCache for MemoryCache {
    async fn get(&self, principal: &str) -> Result<Option<AuthorizationRecord>> {
        let entries = self.entries.read().await;
        match entries.get(principal) {
            Some(record) if !self.ttl.is_expired(record) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit: principal={}", principal);
                Ok(Some(record.clone()))
            }
            Some(record) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Cache entry expired: principal={}, age={}",
                    principal,
                    record.age_seconds()
                );
                Ok(None)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache miss: principal={}", principal);
                Ok(None)
            }
        }
    }

    async fn put(&self, principal: &str, record: AuthorizationRecord) -> Result<()> {
        debug!(
            "Caching authorization: principal={}, roles={}, permissions={}",
            principal,
            record.roles.len(),
            record.permissions.len()
        );
        self.entries
            .write()
            .await
            .insert(principal.to_string(), record);
        Ok(())
    }

    async fn invalidate(&self, principal: &str) -> Result<bool> {
        let removed = self.entries.write().await.remove(principal).is_some();
        debug!(
            "Invalidated cache entry: principal={}, present={}",
            principal, removed
        );
        Ok(removed)
    }

    async fn clear(&self) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        info!("Cleared {} cache entries", count);
        Ok(count)
    }

    async fn stats(&self) -> Result<CacheStats> {
        let entries = self.entries.read().await;
        let expired_entries = entries
            .values()
            .filter(|record| self.ttl.is_expired(record))
            .count();
        Ok(CacheStats {
            backend: "memory".to_string(),
            total_entries: entries.len(),
            expired_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        })
    }
    /// Remove all expired entries (call periodically for cleanup)
    async fn evict_expired(&self) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, record| !self.ttl.is_expired(record));
        let evicted = before - entries.len();
        if evicted > 0 {
            info!("Evicted {} expired authorization entries", evicted);
        }
        Ok(evicted)
    }
}
