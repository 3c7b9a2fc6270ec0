use anyhow::Result;

use super::open_users;
use crate::config::GateConfig;

pub async fn add(config: &GateConfig, username: &str, password: &str, roles: &[String]) -> Result<()> {
    let users = open_users(config).await?;
    let uid = users.admin().create_user(username, password).await?;
    for role in roles {
        users.admin().grant_role(username, role).await?;
    }

    if roles.is_empty() {
        println!("Created user {} (uid {})", username, uid);
    } else {
        println!(
            "Created user {} (uid {}) with roles: {}",
            username,
            uid,
            roles.join(", ")
        );
    }
    Ok(())
}

pub async fn passwd(config: &GateConfig, username: &str, password: &str) -> Result<()> {
    let users = open_users(config).await?;
    users.admin().change_password(username, password).await?;
    println!("Password changed for {}", username);
    Ok(())
}

pub async fn list(config: &GateConfig) -> Result<()> {
    let users = open_users(config).await?;
    let summaries = users.admin().list_users().await?;

    if summaries.is_empty() {
        println!("No users");
        return Ok(());
    }
    for summary in summaries {
        println!(
            "{:>5}  {:<24} {}",
            summary.uid, summary.username, summary.hash_algorithm
        );
    }
    Ok(())
}
