use anyhow::Result;

use super::{open_users, warn_if_server_cache_is_separate};
use crate::config::GateConfig;

pub async fn grant(config: &GateConfig, role: &str, permission: &str) -> Result<()> {
    let users = open_users(config).await?;
    let holders = users.admin().grant_permission(role, permission).await?;
    println!(
        "Granted permission {} to role {} ({} holders affected)",
        permission,
        role,
        holders.len()
    );
    if !holders.is_empty() {
        warn_if_server_cache_is_separate(config);
    }
    Ok(())
}
