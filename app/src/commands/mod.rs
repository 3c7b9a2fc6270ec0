pub mod check;
pub mod permission;
pub mod role;
pub mod serve;
pub mod user;

use anyhow::{Context, Result};
use ::user::UserManager;
use colored::*;

use crate::config::{CacheBackend, GateConfig};

/// Open the user database and the configured cache for a one-shot command
pub(crate) async fn open_users(config: &GateConfig) -> Result<UserManager> {
    let cache = config.open_cache()?;
    UserManager::new(
        config.database_config(),
        config.session.clone(),
        &config.credentials,
        cache,
    )
    .await
    .with_context(|| {
        format!(
            "Failed to open user database {}",
            config.database.path.display()
        )
    })
}

/// Tell the operator when a running server will notice a grant change.
///
/// One-shot commands invalidate their own cache instance. With the memory
/// backend a running server keeps its own copy until the entries expire.
pub(crate) fn warn_if_server_cache_is_separate(config: &GateConfig) {
    if config.cache.backend != CacheBackend::Memory {
        return;
    }
    let notice = match config.cache.ttl_seconds {
        Some(ttl) => format!(
            "Note: a running server applies this change within {} seconds; \
             use the /admin endpoints for an immediate effect",
            ttl.max(0)
        ),
        None => "Warning: the cache never expires, a running server keeps the old grants \
                 until restart; use the /admin endpoints instead"
            .to_string(),
    };
    eprintln!("{}", notice.yellow());
}
