//! Authorization cache persisted in a ReDB file.
//!
//! Records are stored as JSON keyed by principal, so entries survive a
//! restart of the gate. Expiry is evaluated on read against the record's
//! `resolved_at` timestamp.

use async_trait::async_trait;
use authz::types::AuthorizationRecord;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{AuthorizationCache, CacheStats, Result, Ttl};

const RECORD_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("authorization_cache");

/// ReDB-backed cache
pub struct PersistentCache {
    db: Arc<RwLock<Database>>,
    path: PathBuf,
    ttl: Ttl,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PersistentCache {
    /// Open (or create) the cache file at `cache_path`
    pub fn open(cache_path: impl AsRef<Path>, ttl: Ttl) -> Result<Self> {
        let path = cache_path.as_ref().to_path_buf();

        // Ensure the parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening authorization cache database at: {:?}", path);
        let db = Database::create(&path)?;

        // Initialize the table
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(RECORD_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
            path,
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Get the path to the cache database
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuthorizationCache for PersistentCache {
    async fn get(&self, principal: &str) -> Result<Option<AuthorizationRecord>> {
        let db = self.db.read().await;
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(RECORD_TABLE)?;

        let bytes = match table.get(principal)? {
            Some(bytes) => bytes.value().to_vec(),
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache miss: principal={}", principal);
                return Ok(None);
            }
        };

        let record: AuthorizationRecord = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(e) => {
                // unreadable rows are treated as misses and get overwritten
                warn!("Discarding unreadable cache entry for {}: {}", principal, e);
                self.misses.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            }
        };

        if self.ttl.is_expired(&record) {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(
                "Cache entry expired: principal={}, age={}",
                principal,
                record.age_seconds()
            );
            return Ok(None);
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        debug!("Cache hit: principal={}", principal);
        Ok(Some(record))
    }

    async fn put(&self, principal: &str, record: AuthorizationRecord) -> Result<()> {
        let record_bytes = serde_json::to_vec(&record)?;

        let db = self.db.write().await;
        let write_txn = db.begin_write()?;
        {
            let mut records = write_txn.open_table(RECORD_TABLE)?;
            records.insert(principal, record_bytes.as_slice())?;
        }
        write_txn.commit()?;

        debug!(
            "Cached authorization: principal={}, size={} bytes",
            principal,
            record_bytes.len()
        );
        Ok(())
    }

    async fn invalidate(&self, principal: &str) -> Result<bool> {
        let db = self.db.write().await;
        let write_txn = db.begin_write()?;
        let removed = {
            let mut records = write_txn.open_table(RECORD_TABLE)?;
            let removed = records.remove(principal)?.is_some();
            removed
        };
        write_txn.commit()?;

        debug!(
            "Invalidated cache entry: principal={}, present={}",
            principal, removed
        );
        Ok(removed)
    }

    async fn clear(&self) -> Result<usize> {
        let db = self.db.write().await;
        let write_txn = db.begin_write()?;
        let count = {
            let mut records = write_txn.open_table(RECORD_TABLE)?;

            // Collect all keys first
            let mut keys = Vec::new();
            for entry in records.iter()? {
                let (key, _) = entry?;
                keys.push(key.value().to_string());
            }

            for key in &keys {
                records.remove(key.as_str())?;
            }
            keys.len()
        };
        write_txn.commit()?;

        info!("Cleared {} cache entries", count);
        Ok(count)
    }

    async fn stats(&self) -> Result<CacheStats> {
        let db = self.db.read().await;
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(RECORD_TABLE)?;

        let total_entries = table.len()? as usize;
        let mut expired_entries = 0usize;
        for entry in table.iter()? {
            let (_, bytes) = entry?;
            match serde_json::from_slice::<AuthorizationRecord>(bytes.value()) {
                Ok(record) if !self.ttl.is_expired(&record) => {}
                _ => expired_entries += 1,
            }
        }

        Ok(CacheStats {
            backend: "redb".to_string(),
            total_entries,
            expired_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        })
    }

    /// Remove expired entries from the cache
    async fn evict_expired(&self) -> Result<usize> {
        let db = self.db.write().await;

        let expired: Vec<String> = {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(RECORD_TABLE)?;
            let mut keys = Vec::new();
            for entry in table.iter()? {
                let (key, bytes) = entry?;
                let record: AuthorizationRecord = serde_json::from_slice(bytes.value())?;
                if self.ttl.is_expired(&record) {
                    keys.push(key.value().to_string());
                }
            }
            keys
        };

        let write_txn = db.begin_write()?;
        {
            let mut records = write_txn.open_table(RECORD_TABLE)?;
            for key in &expired {
                records.remove(key.as_str())?;
            }
        }
        write_txn.commit()?;

        info!("Evicted {} expired cache entries", expired.len());
        Ok(expired.len())
    }
}
