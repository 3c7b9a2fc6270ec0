use anyhow::Result;

use super::{open_users, warn_if_server_cache_is_separate};
use crate::config::GateConfig;

pub async fn create(config: &GateConfig, name: &str, description: Option<&str>) -> Result<()> {
    let users = open_users(config).await?;
    if users.admin().create_role(name, description).await? {
        println!("Created role {}", name);
    } else {
        println!("Role {} already exists", name);
    }
    Ok(())
}

pub async fn grant(config: &GateConfig, username: &str, role: &str) -> Result<()> {
    let users = open_users(config).await?;
    if users.admin().grant_role(username, role).await? {
        println!("Granted role {} to {}", role, username);
        warn_if_server_cache_is_separate(config);
    } else {
        println!("{} already holds role {}", username, role);
    }
    Ok(())
}

pub async fn revoke(config: &GateConfig, username: &str, role: &str) -> Result<()> {
    let users = open_users(config).await?;
    if users.admin().revoke_role(username, role).await? {
        println!("Revoked role {} from {}", role, username);
        warn_if_server_cache_is_separate(config);
    } else {
        println!("{} does not hold role {}", username, role);
    }
    Ok(())
}
