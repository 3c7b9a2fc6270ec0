//! Authentication and authorization resolution.
//!
//! The [`Realm`] answers two questions for the gate:
//! - does this username/password pair identify a principal (`authenticate`)
//! - which roles and permissions does a principal hold (`authorization_info`)
//!
//! Authentication always goes to the credential store. Authorization data is
//! read through the [`AuthorizationCache`] and resolved from the store at most
//! once per principal at a time.

pub mod matcher;
pub mod session;
pub mod store;
pub mod types;

use authz::types::{AuthorizationRecord, Principal};
use authz_cache::{AuthorizationCache, CacheStats};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub use matcher::{CredentialsMatcher, HashAlgorithm, MatcherConfig, SecretRecord};
pub use session::{SessionKeys, SessionManager};
pub use store::{SameSiteConfig, SessionConfig, SessionStoreKind, SqlxSessionStore};
pub use types::{AuthenticationOutcome, Credentials, RejectReason};

use crate::credential_store::{CredentialStore, StoreError};
use crate::error::RealmError;

type RealmResult<T> = std::result::Result<T, RealmError>;

/// Resolves identities and their grants against a credential store
pub struct Realm {
    store: Arc<dyn CredentialStore>,
    cache: Arc<dyn AuthorizationCache>,
    matcher: CredentialsMatcher,
    // verified against for unknown usernames so both paths cost the same
    dummy_secret: Option<SecretRecord>,
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    // bumped by every invalidation; a resolution that straddles a bump is not cached
    epoch: AtomicU64,
}

impl Realm {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        cache: Arc<dyn AuthorizationCache>,
        matcher: CredentialsMatcher,
    ) -> Self {
        let dummy_secret = match matcher.hash("realm-gate-timing-equalizer") {
            Ok(secret) => Some(secret),
            Err(e) => {
                warn!("Could not prepare dummy secret: {}", e);
                None
            }
        };

        Self {
            store,
            cache,
            matcher,
            dummy_secret,
            in_flight: Mutex::new(HashMap::new()),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn matcher(&self) -> &CredentialsMatcher {
        &self.matcher
    }

    /// Verify a username/password pair against the credential store.
    ///
    /// Never consults the authorization cache.
    pub async fn authenticate(&self, username: &str, password: &str) -> AuthenticationOutcome {
        match self.store.fetch_secret(username).await {
            Ok(secret) => {
                if self.matcher.verify(password, &secret).await {
                    info!("Principal {} authenticated", username);
                    AuthenticationOutcome::Authenticated(Principal::new(username))
                } else {
                    warn!("Invalid credential for principal {}", username);
                    AuthenticationOutcome::Rejected(RejectReason::InvalidCredential)
                }
            }
            Err(StoreError::NotFound(_)) => {
                if let Some(dummy) = &self.dummy_secret {
                    let _ = self.matcher.verify(password, dummy).await;
                }
                warn!("Authentication attempt for unknown principal");
                AuthenticationOutcome::Rejected(RejectReason::UnknownPrincipal)
            }
            Err(StoreError::Corrupt { username, reason }) => {
                warn!("Refusing login for {}: {}", username, reason);
                AuthenticationOutcome::Rejected(RejectReason::InvalidCredential)
            }
            Err(e) => {
                error!("Authentication failed, credential store error: {}", e);
                AuthenticationOutcome::Rejected(RejectReason::StoreUnavailable)
            }
        }
    }

    /// Roles and permissions of `principal`, from the cache when possible.
    pub async fn authorization_info(&self, principal: &str) -> RealmResult<AuthorizationRecord> {
        if let Some(record) = self.cache.get(principal).await? {
            return Ok(record);
        }

        let gate = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight
                .entry(principal.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let result = self.resolve_exclusive(principal, &gate).await;

        {
            let mut in_flight = self.in_flight.lock().await;
            let idle = in_flight
                .get(principal)
                .map(|current| Arc::ptr_eq(current, &gate) && Arc::strong_count(&gate) <= 2)
                .unwrap_or(false);
            if idle {
                in_flight.remove(principal);
            }
        }

        result
    }

    async fn resolve_exclusive(
        &self,
        principal: &str,
        gate: &Arc<Mutex<()>>,
    ) -> RealmResult<AuthorizationRecord> {
        let _held = gate.lock().await;

        // a concurrent resolution may have finished while we waited
        if let Some(record) = self.cache.get(principal).await? {
            debug!("Authorization for {} resolved by a concurrent request", principal);
            return Ok(record);
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let record = self.resolve(principal).await?;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!(
                "Grants changed while resolving {}, answer not cached",
                principal
            );
            return Ok(record);
        }

        self.cache.put(principal, record.clone()).await?;
        // an invalidation may have slipped in between the check and the put
        if self.epoch.load(Ordering::SeqCst) != epoch {
            self.cache.invalidate(principal).await?;
        }
        Ok(record)
    }

    async fn resolve(&self, principal: &str) -> RealmResult<AuthorizationRecord> {
        let roles = self.store.fetch_roles(principal).await?;
        let mut permissions = Vec::new();
        for role in &roles {
            permissions.extend(self.store.fetch_permissions(role).await?);
        }

        let record = AuthorizationRecord::new(principal, roles, permissions);
        debug!(
            "Resolved authorization for {}: {} roles, {} permissions",
            principal,
            record.roles.len(),
            record.permissions.len()
        );
        Ok(record)
    }

    pub async fn has_role(&self, principal: &str, role: &str) -> RealmResult<bool> {
        Ok(self.authorization_info(principal).await?.has_role(role))
    }

    /// Wildcard-aware permission check
    pub async fn is_permitted(&self, principal: &str, permission: &str) -> RealmResult<bool> {
        Ok(self
            .authorization_info(principal)
            .await?
            .is_permitted(permission))
    }

    /// Drop the cached authorization of `principal`.
    ///
    /// Call after the store change is committed. Resolutions already in
    /// flight will not write their result back to the cache.
    pub async fn invalidate(&self, principal: &str) -> RealmResult<bool> {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        Ok(self.cache.invalidate(principal).await?)
    }

    pub async fn clear_cache(&self) -> RealmResult<usize> {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        Ok(self.cache.clear().await?)
    }

    pub async fn cache_stats(&self) -> RealmResult<CacheStats> {
        Ok(self.cache.stats().await?)
    }
}
