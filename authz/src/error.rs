//! Error types for the access-control chain.
//!
//! # Security Note
//! These errors are raised while the chain is being built from configuration.
//! Request-time evaluation never fails: an unmatched path degrades to
//! requiring authentication, so nothing here is ever shown to a client.

use thiserror::Error;

/// Errors that can occur while building or parsing access rules.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthzError {
    /// The chain has no rules at all.
    #[error("Filter chain is empty")]
    EmptyChain,

    /// The last rule of the chain is not the `/**` catch-all.
    ///
    /// Without a catch-all some paths would match no rule.
    #[error("Filter chain must end with a catch-all '/**' rule, found '{0}'")]
    MissingCatchAll(String),

    /// A path pattern is malformed.
    #[error("Invalid path pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A rule definition such as `roles[admin]` could not be parsed.
    #[error("Invalid rule definition '{0}'")]
    InvalidRule(String),

    /// A permission string is malformed.
    #[error("Invalid permission '{0}'")]
    InvalidPermission(String),
}

/// A specialized Result type for access-control operations.
pub type Result<T> = std::result::Result<T, AuthzError>;
