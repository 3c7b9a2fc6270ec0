//! Core access-control types.
//!
//! # Security Considerations
//!
//! - Rules are evaluated top to bottom and the first match wins. Authors must
//!   list specific patterns before broad ones; nothing is re-ranked.
//! - A chain always ends with the `/**` catch-all so every path has exactly
//!   one applicable rule.
//! - Role and permission names are compared exactly (case-sensitive).
//! - An [`AuthorizationRecord`] is a snapshot. It stays valid until the cache
//!   entry holding it is invalidated or expires.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{AuthzError, Result};
use crate::pattern::PathPattern;
use crate::permission::any_implies;

/// An authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    /// The login name, unique in the credential store
    pub username: String,
}

impl Principal {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

/// What a matched rule demands of the request.
///
/// The textual form is the one used in configuration files:
/// `anon`, `authc`, `logout`, `roles[name]` and `perms[name]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// Anyone may pass, authenticated or not
    Anonymous,
    /// Any authenticated principal may pass
    Authenticated,
    /// The principal must hold the named role
    RoleRequired(String),
    /// The principal must hold a permission implying the named one
    PermissionRequired(String),
    /// End the session
    LogoutTrigger,
}

impl RuleKind {
    fn bracketed<'a>(definition: &'a str, prefix: &str) -> Option<&'a str> {
        definition
            .strip_prefix(prefix)?
            .strip_prefix('[')?
            .strip_suffix(']')
            .map(str::trim)
    }
}

impl FromStr for RuleKind {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        let definition = s.trim();
        match definition {
            "anon" => return Ok(RuleKind::Anonymous),
            "authc" => return Ok(RuleKind::Authenticated),
            "logout" => return Ok(RuleKind::LogoutTrigger),
            _ => {}
        }

        if let Some(role) = Self::bracketed(definition, "roles") {
            if role.is_empty() || role.contains(',') {
                return Err(AuthzError::InvalidRule(s.to_string()));
            }
            return Ok(RuleKind::RoleRequired(role.to_string()));
        }

        if let Some(permission) = Self::bracketed(definition, "perms") {
            if permission.is_empty() {
                return Err(AuthzError::InvalidRule(s.to_string()));
            }
            return Ok(RuleKind::PermissionRequired(permission.to_string()));
        }

        Err(AuthzError::InvalidRule(s.to_string()))
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Anonymous => write!(f, "anon"),
            RuleKind::Authenticated => write!(f, "authc"),
            RuleKind::RoleRequired(role) => write!(f, "roles[{}]", role),
            RuleKind::PermissionRequired(permission) => write!(f, "perms[{}]", permission),
            RuleKind::LogoutTrigger => write!(f, "logout"),
        }
    }
}

/// One entry of the filter chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRule {
    pub pattern: PathPattern,
    pub kind: RuleKind,
}

impl AccessRule {
    pub fn new(pattern: PathPattern, kind: RuleKind) -> Self {
        Self { pattern, kind }
    }

    /// Build a rule from its configuration form, e.g.
    /// `AccessRule::parse("/users.jsp", "roles[admin]")`.
    pub fn parse(pattern: &str, definition: &str) -> Result<Self> {
        Ok(Self::new(PathPattern::parse(pattern)?, definition.parse()?))
    }

    /// The decision this rule produces when it matches.
    pub fn decision(&self) -> AccessDecision {
        match &self.kind {
            RuleKind::Anonymous => AccessDecision::Allow,
            RuleKind::Authenticated => AccessDecision::RequireAuthentication,
            RuleKind::RoleRequired(role) => AccessDecision::RequireRole(role.clone()),
            RuleKind::PermissionRequired(permission) => {
                AccessDecision::RequirePermission(permission.clone())
            }
            RuleKind::LogoutTrigger => AccessDecision::TriggerLogout,
        }
    }
}

impl fmt::Display for AccessRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.pattern, self.kind)
    }
}

/// The outcome of evaluating the chain for one request path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "decision", content = "value", rename_all = "snake_case")]
pub enum AccessDecision {
    Allow,
    RequireAuthentication,
    RequireRole(String),
    RequirePermission(String),
    TriggerLogout,
}

impl AccessDecision {
    /// True when the decision can only be satisfied by an authenticated principal.
    pub fn requires_principal(&self) -> bool {
        matches!(
            self,
            AccessDecision::RequireAuthentication
                | AccessDecision::RequireRole(_)
                | AccessDecision::RequirePermission(_)
        )
    }
}

impl fmt::Display for AccessDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessDecision::Allow => write!(f, "allow"),
            AccessDecision::RequireAuthentication => write!(f, "require authentication"),
            AccessDecision::RequireRole(role) => write!(f, "require role '{}'", role),
            AccessDecision::RequirePermission(permission) => {
                write!(f, "require permission '{}'", permission)
            }
            AccessDecision::TriggerLogout => write!(f, "logout"),
        }
    }
}

/// Resolved roles and permissions of one principal, as held by the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRecord {
    pub principal: String,
    pub roles: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
    pub resolved_at: DateTime<Utc>,
}

impl AuthorizationRecord {
    /// Create a record stamped with the current time.
    pub fn new(
        principal: impl Into<String>,
        roles: impl IntoIterator<Item = String>,
        permissions: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            principal: principal.into(),
            roles: roles.into_iter().collect(),
            permissions: permissions.into_iter().collect(),
            resolved_at: Utc::now(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Whether any held permission implies `permission` (wildcards honored).
    pub fn is_permitted(&self, permission: &str) -> bool {
        any_implies(&self.permissions, permission)
    }

    /// Age of the record in whole seconds.
    pub fn age_seconds(&self) -> i64 {
        (Utc::now() - self.resolved_at).num_seconds()
    }
}
