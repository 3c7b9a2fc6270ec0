use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tower_sessions::{SessionManagerLayer, SessionStore};
use tracing::info;

use crate::{create_router, AppState};

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Interface to bind
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Directory holding the protected site; `None` serves nothing but the API
    pub static_dir: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3030,
            static_dir: Some(PathBuf::from("site")),
        }
    }
}

impl ApiConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Where rejected or finished requests are sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    pub login_url: String,
    pub unauthorized_url: String,
    pub error_url: String,
    /// Landing page after a login with no saved request
    pub success_url: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            login_url: "/index.jsp".to_string(),
            unauthorized_url: "/noRen.jsp".to_string(),
            error_url: "/error.jsp".to_string(),
            success_url: "/".to_string(),
        }
    }
}

/// Start the API server and run until ctrl-c
pub async fn start_server<S>(
    state: AppState,
    sessions: SessionManagerLayer<S>,
    config: ApiConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    S: SessionStore + Clone,
{
    let app = create_router(state, sessions, config.static_dir.clone());

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Gate listening on {}", addr);
    if let Some(dir) = &config.static_dir {
        info!("Serving protected site from {}", dir.display());
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:3030");
        assert_eq!(config.static_dir, Some(PathBuf::from("site")));

        let pages = PageConfig::default();
        assert_eq!(pages.login_url, "/index.jsp");
        assert_eq!(pages.unauthorized_url, "/noRen.jsp");
        assert_eq!(pages.error_url, "/error.jsp");
    }
}
