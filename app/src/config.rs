//! Gate configuration loaded from YAML with environment overrides.

use anyhow::{Context, Result};
use api::{ApiConfig, PageConfig};
use authz::FilterChain;
use authz_cache::{AuthorizationCache, MemoryCache, PersistentCache, Ttl};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use user::{MatcherConfig, SessionConfig, UserDatabaseConfig};

/// Lifetime of cached grants unless configured otherwise
pub const DEFAULT_CACHE_TTL_SECS: i64 = 300;

/// Config file used when none is named and it exists in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "realm-gate.yaml";

pub const ENV_PORT: &str = "REALM_GATE_PORT";
pub const ENV_DATABASE: &str = "REALM_GATE_DATABASE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub server: ApiConfig,
    pub database: DatabaseSection,
    pub cache: CacheSection,
    pub credentials: MatcherConfig,
    pub session: SessionConfig,
    pub pages: PageConfig,
    pub filter_chain: ChainSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub path: PathBuf,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub query_timeout_secs: u64,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        let defaults = UserDatabaseConfig::default();
        Self {
            path: defaults.database_path,
            max_connections: defaults.max_connections,
            acquire_timeout_secs: defaults.acquire_timeout,
            query_timeout_secs: defaults.query_timeout,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Redb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub backend: CacheBackend,
    /// ReDB file, only used by the `redb` backend
    pub path: PathBuf,
    /// Entry lifetime; `null` keeps entries until invalidated or restart
    pub ttl_seconds: Option<i64>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            path: PathBuf::from("data/realm-gate/authz-cache.redb"),
            ttl_seconds: Some(DEFAULT_CACHE_TTL_SECS),
        }
    }
}

/// One `pattern = rule` line of the filter chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEntry {
    pub pattern: String,
    pub rule: String,
}

impl ChainEntry {
    fn new(pattern: &str, rule: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            rule: rule.to_string(),
        }
    }
}

/// Ordered chain definitions, in evaluation order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainSection(pub Vec<ChainEntry>);

impl Default for ChainSection {
    fn default() -> Self {
        Self(vec![
            ChainEntry::new("/index.jsp", "anon"),
            ChainEntry::new("/logout", "logout"),
            ChainEntry::new("/users/login", "anon"),
            ChainEntry::new("/error.jsp", "anon"),
            ChainEntry::new("/health", "anon"),
            ChainEntry::new("/cars.jsp", "roles[guest]"),
            ChainEntry::new("/users.jsp", "roles[admin]"),
            ChainEntry::new("/admin/**", "roles[admin]"),
            ChainEntry::new("/**", "authc"),
        ])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub directory: PathBuf,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("data/logs"),
        }
    }
}

impl GateConfig {
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Invalid gate configuration")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse configuration {}", path.display()))
    }

    /// Load the named file, or `realm-gate.yaml` if present, or defaults;
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `REALM_GATE_*` overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(ENV_PORT) {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("{} is not a valid port: {}", ENV_PORT, port))?;
        }
        if let Some(database) = lookup(ENV_DATABASE) {
            self.database.path = PathBuf::from(database);
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize configuration")
    }

    /// Build the access-control chain; fails without a trailing catch-all
    pub fn filter_chain(&self) -> Result<FilterChain> {
        let chain = FilterChain::from_definitions(
            self.filter_chain
                .0
                .iter()
                .map(|entry| (entry.pattern.as_str(), entry.rule.as_str())),
        )?;
        Ok(chain)
    }

    pub fn database_config(&self) -> UserDatabaseConfig {
        UserDatabaseConfig {
            database_path: self.database.path.clone(),
            max_connections: self.database.max_connections,
            acquire_timeout: self.database.acquire_timeout_secs,
            query_timeout: self.database.query_timeout_secs,
        }
    }

    pub fn cache_ttl(&self) -> Ttl {
        Ttl(self.cache.ttl_seconds)
    }

    /// Open the configured authorization cache backend
    pub fn open_cache(&self) -> Result<Arc<dyn AuthorizationCache>> {
        let cache: Arc<dyn AuthorizationCache> = match self.cache.backend {
            CacheBackend::Memory => match self.cache.ttl_seconds {
                Some(ttl) => Arc::new(MemoryCache::with_ttl(ttl)),
                None => Arc::new(MemoryCache::new()),
            },
            CacheBackend::Redb => Arc::new(
                PersistentCache::open(&self.cache.path, self.cache_ttl()).with_context(|| {
                    format!(
                        "Failed to open authorization cache {} (is the server running?)",
                        self.cache.path.display()
                    )
                })?,
            ),
        };
        Ok(cache)
    }
}
