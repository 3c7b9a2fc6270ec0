use anyhow::{Context, Result};
use api::{ApiConfig, AppState};
use authz_cache::AuthorizationCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_sessions::MemoryStore;
use tracing::{debug, info, warn};
use user::{SessionStoreKind, UserManager};

use crate::config::GateConfig;

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(300);

pub async fn execute(config: GateConfig) -> Result<()> {
    info!("=== realm-gate starting ===");

    let chain = config.filter_chain().context("Invalid filter chain")?;
    info!("Loaded filter chain with {} rules", chain.len());
    for rule in chain.rules() {
        info!("  {}", rule);
    }

    let cache = config.open_cache()?;
    let users = Arc::new(
        UserManager::new(
            config.database_config(),
            config.session.clone(),
            &config.credentials,
            cache.clone(),
        )
        .await
        .context("Failed to initialize user database")?,
    );

    let state = AppState::new(chain, users.clone(), config.pages.clone());
    let server_config: ApiConfig = config.server.clone();
    let sqlite_sessions = config.session.store == SessionStoreKind::Sqlite;
    let maintenance = spawn_maintenance(cache, users.clone(), sqlite_sessions);

    let result = match config.session.store {
        SessionStoreKind::Memory => {
            warn!("Sessions are kept in memory and will not survive a restart");
            let sessions = config.session.layer(MemoryStore::default());
            api::start_server(state, sessions, server_config).await
        }
        SessionStoreKind::Sqlite => {
            let store = users.session_store().inner().clone();
            let sessions = config.session.layer(store);
            api::start_server(state, sessions, server_config).await
        }
    };

    maintenance.abort();
    result.map_err(|e| anyhow::anyhow!(e))?;

    users.database().get_pool().close().await;
    Ok(())
}

/// Periodically drop expired cache entries and, for the SQLite store, expired sessions
fn spawn_maintenance(
    cache: Arc<dyn AuthorizationCache>,
    users: Arc<UserManager>,
    sqlite_sessions: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
        loop {
            interval.tick().await;
            match cache.evict_expired().await {
                Ok(evicted) => debug!("Cache maintenance evicted {} entries", evicted),
                Err(e) => warn!("Cache maintenance failed: {}", e),
            }
            if sqlite_sessions {
                if let Err(e) = users.cleanup_expired().await {
                    warn!("Session cleanup failed: {}", e);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use authz::types::AuthorizationRecord;
    use authz_cache::MemoryCache;
    use tempfile::TempDir;
    use user::{HashAlgorithm, MatcherConfig, SessionConfig, UserDatabaseConfig};

    #[tokio::test]
    async fn test_maintenance_evicts_expired_entries() {
        let dir = TempDir::new().unwrap();
        let memory = Arc::new(MemoryCache::with_ttl(0));
        let cache: Arc<dyn AuthorizationCache> = memory.clone();
        let users = Arc::new(
            UserManager::new(
                UserDatabaseConfig {
                    database_path: dir.path().join("gate.db"),
                    ..UserDatabaseConfig::default()
                },
                SessionConfig::default(),
                &MatcherConfig {
                    algorithm: HashAlgorithm::Sha256,
                    iterations: Some(1),
                },
                cache.clone(),
            )
            .await
            .unwrap(),
        );

        cache
            .put("alice", AuthorizationRecord::new("alice", vec![], vec![]))
            .await
            .unwrap();
        assert_eq!(memory.len().await, 1);

        let maintenance = spawn_maintenance(cache, users.clone(), true);
        tokio::time::sleep(Duration::from_millis(200)).await;
        maintenance.abort();

        assert!(memory.is_empty().await);
        users.database().get_pool().close().await;
    }
}
