//! Path-based access control for the realm gate.
//!
//! This crate decides what an incoming request needs before it may proceed.
//! It knows nothing about credentials or storage; it maps a request path to an
//! [`AccessDecision`](types::AccessDecision) by walking an ordered chain of
//! [`AccessRule`](types::AccessRule)s.
//!
//! # Evaluation Flow
//!
//! 1. **Request arrives** with a path such as `/users.jsp`
//! 2. **FilterChain** normalizes the path and tests each rule in order
//! 3. **First match wins**: its rule kind becomes the decision
//! 4. **Caller enforces** the decision (login redirect, role check, logout)
//!
//! # Example
//!
//! ```rust
//! use authz::{FilterChain, types::{AccessDecision, AccessRule}};
//!
//! let chain = FilterChain::new(vec![
//!     AccessRule::parse("/index.jsp", "anon").unwrap(),
//!     AccessRule::parse("/users.jsp", "roles[admin]").unwrap(),
//!     AccessRule::parse("/**", "authc").unwrap(),
//! ])
//! .unwrap();
//!
//! assert_eq!(chain.evaluate("/index.jsp"), AccessDecision::Allow);
//! assert_eq!(chain.evaluate("/users.jsp"), AccessDecision::RequireRole("admin".into()));
//! assert_eq!(chain.evaluate("/cars.jsp"), AccessDecision::RequireAuthentication);
//! ```

pub mod error;
pub mod pattern;
pub mod permission;
pub mod types;

use error::{AuthzError, Result};
use tracing::{debug, warn};
use types::{AccessDecision, AccessRule};

/// An ordered, immutable list of access rules.
///
/// Built once at startup and shared by reference; evaluation takes `&self`
/// and never mutates.
#[derive(Debug, Clone)]
pub struct FilterChain {
    rules: Vec<AccessRule>,
}

impl FilterChain {
    /// Build a chain from rules in evaluation order.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::EmptyChain`] if `rules` is empty
    /// - [`AuthzError::MissingCatchAll`] if the last rule is not `/**`
    ///
    /// Rules after an earlier catch-all are unreachable; they are accepted but
    /// logged at warn level.
    pub fn new(rules: Vec<AccessRule>) -> Result<Self> {
        let last = rules.last().ok_or(AuthzError::EmptyChain)?;
        if !last.pattern.is_catch_all() {
            return Err(AuthzError::MissingCatchAll(last.pattern.to_string()));
        }

        if let Some(position) = rules.iter().position(|r| r.pattern.is_catch_all()) {
            for shadowed in &rules[position + 1..] {
                warn!(
                    "Access rule '{}' is unreachable: it follows the catch-all at position {}",
                    shadowed, position
                );
            }
        }

        Ok(Self { rules })
    }

    /// Build a chain from `(pattern, definition)` pairs as found in configuration.
    pub fn from_definitions<I, P, D>(definitions: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, D)>,
        P: AsRef<str>,
        D: AsRef<str>,
    {
        let rules = definitions
            .into_iter()
            .map(|(pattern, definition)| AccessRule::parse(pattern.as_ref(), definition.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(rules)
    }

    /// The first rule whose pattern matches `path`, if any.
    pub fn matching_rule(&self, path: &str) -> Option<&AccessRule> {
        self.rules.iter().find(|rule| rule.pattern.matches(path))
    }

    /// Decide what `path` requires.
    ///
    /// An unmatched path cannot happen for a chain built by [`FilterChain::new`];
    /// if it does, the decision fails closed to `RequireAuthentication`.
    pub fn evaluate(&self, path: &str) -> AccessDecision {
        match self.matching_rule(path) {
            Some(rule) => {
                let decision = rule.decision();
                debug!("Path {} matched rule '{}' -> {}", path, rule, decision);
                decision
            }
            None => {
                warn!("No access rule matched {}; requiring authentication", path);
                AccessDecision::RequireAuthentication
            }
        }
    }

    /// The rules in evaluation order.
    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
