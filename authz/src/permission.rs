//! Wildcard permissions.
//!
//! A permission is a colon-separated list of parts, each part a comma-separated
//! set of tokens: `printer:print,query:lp7200`. The token `*` matches anything
//! in its part, and a held permission with fewer parts than the requested one
//! behaves as if the missing parts were `*`. So `user:*` and `user` both imply
//! `user:create`, while `user:create` does not imply `user:delete`.
//!
//! Matching is case-sensitive.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{AuthzError, Result};

const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardPermission {
    raw: String,
    parts: Vec<BTreeSet<String>>,
}

impl WildcardPermission {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AuthzError::InvalidPermission(raw.to_string()));
        }

        let mut parts = Vec::new();
        for part in trimmed.split(':') {
            let tokens: BTreeSet<String> = part
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
            if tokens.is_empty() {
                return Err(AuthzError::InvalidPermission(raw.to_string()));
            }
            parts.push(tokens);
        }

        Ok(Self {
            raw: trimmed.to_string(),
            parts,
        })
    }

    /// Whether holding `self` grants `requested`.
    pub fn implies(&self, requested: &WildcardPermission) -> bool {
        for (i, requested_part) in requested.parts.iter().enumerate() {
            let Some(held_part) = self.parts.get(i) else {
                // held permission is shorter: remaining parts are implied
                return true;
            };
            if !held_part.contains(WILDCARD) && !held_part.is_superset(requested_part) {
                return false;
            }
        }

        // held permission is longer: its extra parts must all be wildcards
        self.parts
            .iter()
            .skip(requested.parts.len())
            .all(|part| part.contains(WILDCARD))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for WildcardPermission {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for WildcardPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// True when any of the `held` permission strings implies `requested`.
///
/// Held strings that fail to parse are skipped; a malformed requested
/// permission is never granted.
pub fn any_implies<'a, I>(held: I, requested: &str) -> bool
where
    I: IntoIterator<Item = &'a String>,
{
    let Ok(requested) = WildcardPermission::parse(requested) else {
        return false;
    };
    held.into_iter()
        .filter_map(|p| WildcardPermission::parse(p).ok())
        .any(|p| p.implies(&requested))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("user:create", "user:create", true)]
    #[case("user:create", "user:delete", false)]
    #[case("user:*", "user:create", true)]
    #[case("user", "user:create", true)]
    #[case("user", "user:create:7", true)]
    #[case("user:create,delete", "user:delete", true)]
    #[case("user:create,delete", "user:create,delete", true)]
    #[case("user:create", "user:create,delete", false)]
    #[case("user:create:*", "user:create", true)]
    #[case("user:create:7", "user:create", false)]
    #[case("*", "car:drive", true)]
    #[case("*:read", "car:read", true)]
    #[case("*:read", "car:write", false)]
    #[case("car:drive", "user:drive", false)]
    #[case("Car:drive", "car:drive", false)]
    fn test_implies(#[case] held: &str, #[case] requested: &str, #[case] expected: bool) {
        let held = WildcardPermission::parse(held).unwrap();
        let requested = WildcardPermission::parse(requested).unwrap();
        assert_eq!(held.implies(&requested), expected);
    }

    #[test]
    fn test_invalid_permissions() {
        assert!(WildcardPermission::parse("").is_err());
        assert!(WildcardPermission::parse("user::create").is_err());
        assert!(WildcardPermission::parse("user:,").is_err());
    }

    #[test]
    fn test_any_implies() {
        let held = vec!["car:drive".to_string(), "user:*".to_string()];
        assert!(any_implies(&held, "user:delete"));
        assert!(any_implies(&held, "car:drive"));
        assert!(!any_implies(&held, "car:sell"));
        assert!(!any_implies(&held, ""));
    }
}
