//! Administrative mutations of principals, roles and permissions.
//!
//! Every change to a role or permission assignment invalidates the cached
//! authorization of each affected principal before returning.

use authz::permission::WildcardPermission;
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::{CredentialsMatcher, Realm};
use crate::error::{Result, UserError};

/// Summary of one principal for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct UserSummary {
    pub uid: i64,
    pub username: String,
    pub hash_algorithm: String,
}

#[derive(Clone)]
pub struct UserAdmin {
    pool: Pool<Sqlite>,
    matcher: CredentialsMatcher,
    realm: Arc<Realm>,
}

impl UserAdmin {
    pub fn new(
        pool: Pool<Sqlite>,
        matcher: CredentialsMatcher,
        realm: Arc<Realm>,
    ) -> Self {
        Self {
            pool,
            matcher,
            realm,
        }
    }

    /// Create a principal with a freshly hashed password. Returns its uid.
    pub async fn create_user(&self, username: &str, password: &str) -> Result<i64> {
        let username = username.trim();
        if username.is_empty() {
            return Err(UserError::Configuration(
                "Username must not be empty".to_string(),
            ));
        }

        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)")
                .bind(username)
                .fetch_one(&self.pool)
                .await?;
        if exists {
            return Err(UserError::UserExists(username.to_string()));
        }

        let secret = self.matcher.hash_password(password).await?;
        let uid = sqlx::query(
            "INSERT INTO users (username, password, salt, hash_algorithm, hash_iterations) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(username)
        .bind(&secret.hash)
        .bind(&secret.salt)
        .bind(secret.algorithm.to_string())
        .bind(secret.iterations as i64)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        info!("Created principal {} (uid {})", username, uid);
        Ok(uid)
    }

    /// Replace the stored secret of `username`
    pub async fn change_password(&self, username: &str, password: &str) -> Result<()> {
        let secret = self.matcher.hash_password(password).await?;
        let updated = sqlx::query(
            "UPDATE users SET password = ?, salt = ?, hash_algorithm = ?, hash_iterations = ?, \
             updated_at = CURRENT_TIMESTAMP WHERE username = ?",
        )
        .bind(&secret.hash)
        .bind(&secret.salt)
        .bind(secret.algorithm.to_string())
        .bind(secret.iterations as i64)
        .bind(username)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(UserError::UserNotFound(username.to_string()));
        }
        info!("Changed password of principal {}", username);
        Ok(())
    }

    /// Create a role if it does not exist yet. Returns whether it was created.
    pub async fn create_role(&self, name: &str, description: Option<&str>) -> Result<bool> {
        let created = sqlx::query("INSERT OR IGNORE INTO roles (rname, description) VALUES (?, ?)")
            .bind(name)
            .bind(description)
            .execute(&self.pool)
            .await?
            .rows_affected()
            > 0;
        if created {
            info!("Created role {}", name);
        }
        Ok(created)
    }

    /// Assign `role` to `username`. Returns false if it was already held.
    pub async fn grant_role(&self, username: &str, role: &str) -> Result<bool> {
        let uid = self.uid(username).await?;
        let rid = self.rid(role).await?;

        let granted = sqlx::query("INSERT OR IGNORE INTO users_roles (uid, rid) VALUES (?, ?)")
            .bind(uid)
            .bind(rid)
            .execute(&self.pool)
            .await?
            .rows_affected()
            > 0;

        self.realm.invalidate(username).await?;
        info!("Granted role {} to {} (new: {})", role, username, granted);
        Ok(granted)
    }

    /// Remove `role` from `username`. Returns false if it was not held.
    pub async fn revoke_role(&self, username: &str, role: &str) -> Result<bool> {
        let uid = self.uid(username).await?;
        let rid = self.rid(role).await?;

        let revoked = sqlx::query("DELETE FROM users_roles WHERE uid = ? AND rid = ?")
            .bind(uid)
            .bind(rid)
            .execute(&self.pool)
            .await?
            .rows_affected()
            > 0;

        self.realm.invalidate(username).await?;
        info!("Revoked role {} from {} (was held: {})", role, username, revoked);
        Ok(revoked)
    }

    /// Grant `permission` to `role`, creating the permission if needed.
    ///
    /// Returns the principals whose cached authorization was invalidated.
    pub async fn grant_permission(&self, role: &str, permission: &str) -> Result<Vec<String>> {
        let permission = WildcardPermission::parse(permission)
            .map_err(|e| UserError::Configuration(e.to_string()))?;
        let rid = self.rid(role).await?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT OR IGNORE INTO permissions (pname) VALUES (?)")
            .bind(permission.as_str())
            .execute(&mut *tx)
            .await?;
        let pid = sqlx::query_scalar::<_, i64>("SELECT pid FROM permissions WHERE pname = ?")
            .bind(permission.as_str())
            .fetch_one(&mut *tx)
            .await?;
        sqlx::query("INSERT OR IGNORE INTO roles_permissions (rid, pid) VALUES (?, ?)")
            .bind(rid)
            .bind(pid)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let holders = self.role_holders(role).await?;
        for holder in &holders {
            self.realm.invalidate(holder).await?;
        }
        info!(
            "Granted permission {} to role {}, invalidated {} principals",
            permission,
            role,
            holders.len()
        );
        Ok(holders)
    }

    /// Usernames currently holding `role`
    pub async fn role_holders(&self, role: &str) -> Result<Vec<String>> {
        let holders = sqlx::query_scalar::<_, String>(
            "SELECT u.username FROM users_roles ur \
             JOIN users u ON ur.uid = u.uid \
             JOIN roles r ON ur.rid = r.rid \
             WHERE r.rname = ? ORDER BY u.username",
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await?;
        Ok(holders)
    }

    pub async fn list_users(&self) -> Result<Vec<UserSummary>> {
        let users = sqlx::query_as::<_, UserSummary>(
            "SELECT uid, username, hash_algorithm FROM users ORDER BY username",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn uid(&self, username: &str) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT uid FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| UserError::UserNotFound(username.to_string()))
    }

    async fn rid(&self, role: &str) -> Result<i64> {
        let rid = sqlx::query_scalar::<_, i64>("SELECT rid FROM roles WHERE rname = ?")
            .bind(role)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| UserError::RoleNotFound(role.to_string()))?;
        debug!("Resolved role {} to rid {}", role, rid);
        Ok(rid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthenticationOutcome, HashAlgorithm, Realm};
    use crate::credential_store::SqlxCredentialStore;
    use crate::database::{UserDatabase, UserDatabaseConfig};
    use authz_cache::MemoryCache;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        _db: UserDatabase,
        admin: UserAdmin,
        realm: Arc<Realm>,
        cache: Arc<MemoryCache>,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let db = UserDatabase::new(UserDatabaseConfig {
            database_path: dir.path().join("admin.db"),
            ..UserDatabaseConfig::default()
        })
        .await
        .unwrap();
        let pool = db.get_pool().clone();
        let cache = Arc::new(MemoryCache::new());
        // legacy digest keeps the tests fast
        let matcher = CredentialsMatcher::new(HashAlgorithm::Sha256, Some(1));

        let realm = Arc::new(Realm::new(
            Arc::new(SqlxCredentialStore::new(pool.clone(), Duration::from_secs(5))),
            cache.clone(),
            matcher.clone(),
        ));
        let admin = UserAdmin::new(pool, matcher, realm.clone());
        Fixture {
            _dir: dir,
            _db: db,
            admin,
            realm,
            cache,
        }
    }

    #[tokio::test]
    async fn test_create_user_and_authenticate() {
        let f = fixture().await;
        f.admin.create_user("alice", "secret").await.unwrap();

        assert!(f.realm.authenticate("alice", "secret").await.is_authenticated());
        assert!(matches!(
            f.admin.create_user("alice", "other").await,
            Err(UserError::UserExists(_))
        ));

        f.admin.change_password("alice", "n3w").await.unwrap();
        assert!(!f.realm.authenticate("alice", "secret").await.is_authenticated());
        assert_eq!(
            f.realm.authenticate("alice", "n3w").await,
            AuthenticationOutcome::Authenticated(authz::types::Principal::new("alice"))
        );

        let users = f.admin.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].hash_algorithm, "sha256");
    }

    #[tokio::test]
    async fn test_grant_and_revoke_role_invalidate_cache() {
        let f = fixture().await;
        f.admin.create_user("alice", "secret").await.unwrap();

        assert!(!f.realm.has_role("alice", "guest").await.unwrap());
        assert!(f.admin.grant_role("alice", "guest").await.unwrap());
        assert!(!f.admin.grant_role("alice", "guest").await.unwrap());
        assert!(f.realm.has_role("alice", "guest").await.unwrap());

        assert!(f.admin.revoke_role("alice", "guest").await.unwrap());
        assert!(!f.realm.has_role("alice", "guest").await.unwrap());
    }

    #[tokio::test]
    async fn test_grant_permission_invalidates_every_holder() {
        let f = fixture().await;
        for name in ["alice", "bob", "carol"] {
            f.admin.create_user(name, "secret").await.unwrap();
        }
        f.admin.grant_role("alice", "guest").await.unwrap();
        f.admin.grant_role("bob", "guest").await.unwrap();

        for name in ["alice", "bob", "carol"] {
            assert!(!f.realm.is_permitted(name, "car:read").await.unwrap());
        }
        assert_eq!(f.cache.len().await, 3);

        let invalidated = f.admin.grant_permission("guest", "car:*").await.unwrap();
        assert_eq!(invalidated, vec!["alice", "bob"]);
        assert_eq!(f.cache.len().await, 1);

        assert!(f.realm.is_permitted("alice", "car:read").await.unwrap());
        assert!(!f.realm.is_permitted("carol", "car:read").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_targets() {
        let f = fixture().await;
        f.admin.create_user("alice", "secret").await.unwrap();

        assert!(matches!(
            f.admin.grant_role("ghost", "guest").await,
            Err(UserError::UserNotFound(_))
        ));
        assert!(matches!(
            f.admin.grant_role("alice", "pilot").await,
            Err(UserError::RoleNotFound(_))
        ));
        assert!(matches!(
            f.admin.change_password("ghost", "x").await,
            Err(UserError::UserNotFound(_))
        ));

        assert!(f.admin.create_role("pilot", Some("Flies things")).await.unwrap());
        assert!(!f.admin.create_role("pilot", None).await.unwrap());
        assert!(f.admin.grant_role("alice", "pilot").await.unwrap());
    }
}
