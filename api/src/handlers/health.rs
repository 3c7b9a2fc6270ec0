use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use tracing::{info, warn};

use crate::{
    models::{CacheHealth, DatabaseHealth, HealthResponse},
    AppState,
};

/// Health check endpoint
///
/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    info!("Health check requested");

    let database = match state.users.database().ping().await {
        Ok(()) => DatabaseHealth {
            connected: true,
            message: "Database connection successful".to_string(),
        },
        Err(e) => {
            warn!("Health check: database ping failed: {}", e);
            DatabaseHealth {
                connected: false,
                message: "Database connection failed".to_string(),
            }
        }
    };

    let cache = match state.realm.cache_stats().await {
        Ok(stats) => CacheHealth {
            available: true,
            stats: Some(stats),
        },
        Err(e) => {
            warn!("Health check: cache stats unavailable: {}", e);
            CacheHealth {
                available: false,
                stats: None,
            }
        }
    };

    let healthy = database.connected && cache.available;
    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        database,
        cache,
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}
