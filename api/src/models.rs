use authz_cache::CacheStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub database: DatabaseHealth,
    pub cache: CacheHealth,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseHealth {
    pub connected: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheHealth {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<CacheStats>,
}

/// Result of a role or permission assignment change
#[derive(Debug, Serialize, Deserialize)]
pub struct GrantResponse {
    pub success: bool,
    /// Whether the assignment actually changed
    pub changed: bool,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
    /// Principals whose cached authorization was dropped
    pub invalidated: Vec<String>,
}
