//! Error types for the policy engine.

use thiserror::Error;

/// Errors raised while compiling access rules.
///
/// Authorization itself never fails; every error here surfaces when a
/// command document is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// A path rule was declared with an empty pattern.
    #[error("path rule pattern cannot be empty")]
    EmptyPattern,

    /// The glob pattern is not well-formed.
    #[error("invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// An operation name could not be parsed.
    #[error("unknown operation '{0}' (expected read, write or execute)")]
    UnknownOperation(String),
}

impl PolicyError {
    pub(crate) fn invalid_pattern(pattern: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}
