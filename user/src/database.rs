use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Pool, Sqlite,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{Result, UserError};

/// Configuration for the user database
#[derive(Debug, Clone)]
pub struct UserDatabaseConfig {
    /// Path to the database file
    pub database_path: PathBuf,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Pool acquire timeout in seconds
    pub acquire_timeout: u64,
    /// Per-query timeout in seconds
    pub query_timeout: u64,
}

impl Default for UserDatabaseConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/realm-gate/users.db"),
            max_connections: 5,
            acquire_timeout: 5,
            query_timeout: 5,
        }
    }
}

impl UserDatabaseConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout.max(1))
    }
}

/// User database manager
pub struct UserDatabase {
    pool: Pool<Sqlite>,
    config: UserDatabaseConfig,
}

impl UserDatabase {
    /// Initialize the user database
    pub async fn new(config: UserDatabaseConfig) -> Result<Self> {
        // Ensure the directory exists
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite:{}", config.database_path.display());

        if !Sqlite::database_exists(&db_url).await.unwrap_or(false) {
            info!(
                "Creating user database at: {}",
                config.database_path.display()
            );
            Sqlite::create_database(&db_url).await.map_err(|e| {
                UserError::Initialization(format!("Failed to create database: {}", e))
            })?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(config.acquire_timeout.max(1)))
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(&config.database_path)
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .foreign_keys(true),
            )
            .await?;

        let db = Self { pool, config };

        db.run_migrations().await?;

        info!("User database initialized successfully");

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        info!("Running user database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                uid INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                salt TEXT NOT NULL,
                hash_algorithm TEXT NOT NULL,
                hash_iterations INTEGER NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS roles (
                rid INTEGER PRIMARY KEY AUTOINCREMENT,
                rname TEXT NOT NULL UNIQUE,
                description TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS permissions (
                pid INTEGER PRIMARY KEY AUTOINCREMENT,
                pname TEXT NOT NULL UNIQUE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users_roles (
                uid INTEGER NOT NULL,
                rid INTEGER NOT NULL,
                PRIMARY KEY (uid, rid),
                FOREIGN KEY (uid) REFERENCES users(uid) ON DELETE CASCADE,
                FOREIGN KEY (rid) REFERENCES roles(rid) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS roles_permissions (
                rid INTEGER NOT NULL,
                pid INTEGER NOT NULL,
                PRIMARY KEY (rid, pid),
                FOREIGN KEY (rid) REFERENCES roles(rid) ON DELETE CASCADE,
                FOREIGN KEY (pid) REFERENCES permissions(pid) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_roles_uid ON users_roles(uid)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_roles_permissions_rid ON roles_permissions(rid)",
        )
        .execute(&self.pool)
        .await?;

        self.create_default_roles().await?;

        info!("User database migrations completed");

        Ok(())
    }

    /// Create the roles referenced by the default filter chain
    async fn create_default_roles(&self) -> Result<()> {
        let default_roles = vec![
            ("admin", "Administrator: full access including user administration"),
            ("guest", "Guest: access to the car listing"),
        ];

        for (name, description) in default_roles {
            let created = sqlx::query("INSERT OR IGNORE INTO roles (rname, description) VALUES (?, ?)")
                .bind(name)
                .bind(description)
                .execute(&self.pool)
                .await?
                .rows_affected()
                > 0;

            if created {
                info!("Created default role: {}", name);
            }
        }

        Ok(())
    }

    /// Get the database pool for external use
    pub fn get_pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub fn config(&self) -> &UserDatabaseConfig {
        &self.config
    }

    /// Round-trip a trivial query, bounded by the query timeout
    pub async fn ping(&self) -> Result<()> {
        let ping = sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&self.pool);
        match tokio::time::timeout(self.config.query_timeout(), ping).await {
            Ok(result) => result.map(|_| ()).map_err(UserError::from),
            Err(_) => Err(UserError::Initialization(
                "database ping timed out".to_string(),
            )),
        }
    }

    /// Verify database integrity
    pub async fn verify_integrity(&self) -> Result<bool> {
        let tables = vec![
            "users",
            "roles",
            "permissions",
            "users_roles",
            "roles_permissions",
        ];

        for table in tables {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?)",
            )
            .bind(table)
            .fetch_one(&self.pool)
            .await?;

            if !exists {
                warn!("Missing table: {}", table);
                return Ok(false);
            }
        }

        info!("Database integrity check passed");
        Ok(true)
    }

    /// Close the database connection
    pub async fn close(self) -> Result<()> {
        self.pool.close().await;
        info!("User database connection closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(temp_dir: &TempDir) -> UserDatabaseConfig {
        UserDatabaseConfig {
            database_path: temp_dir.path().join("test_user.db"),
            ..UserDatabaseConfig::default()
        }
    }

    #[tokio::test]
    async fn test_database_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);
        let db_path = config.database_path.clone();

        let db = UserDatabase::new(config).await.unwrap();

        assert!(db_path.exists());
        assert!(db.verify_integrity().await.unwrap());
        db.ping().await.unwrap();

        let mode = sqlx::query_scalar::<_, String>("PRAGMA journal_mode")
            .fetch_one(db.get_pool())
            .await
            .unwrap();
        assert_eq!(mode, "wal");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_default_roles_creation() {
        let temp_dir = TempDir::new().unwrap();
        let db = UserDatabase::new(config_in(&temp_dir)).await.unwrap();

        let roles = sqlx::query_scalar::<_, String>("SELECT rname FROM roles ORDER BY rname")
            .fetch_all(db.get_pool())
            .await
            .unwrap();
        assert_eq!(roles, vec!["admin", "guest"]);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        UserDatabase::new(config_in(&temp_dir))
            .await
            .unwrap()
            .close()
            .await
            .unwrap();

        let db = UserDatabase::new(config_in(&temp_dir)).await.unwrap();
        let role_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM roles")
            .fetch_one(db.get_pool())
            .await
            .unwrap();
        assert_eq!(role_count, 2);
    }
}
