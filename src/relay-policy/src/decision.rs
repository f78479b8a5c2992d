//! Access decision types.

use serde::{Deserialize, Serialize};

/// Effect of a path rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// The rule grants access.
    Allow,
    /// The rule blocks access. Always wins over a matching `Allow`.
    Deny,
}

impl Effect {
    pub fn is_deny(&self) -> bool {
        matches!(self, Effect::Deny)
    }
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Effect::Allow => write!(f, "allow"),
            Effect::Deny => write!(f, "deny"),
        }
    }
}

/// Effect applied when a capability is enabled and no path rule matches.
///
/// The capability flag already gated broad access, so the absence of an
/// explicit rule is not a denial.
pub const UNMATCHED_PATH_EFFECT: Effect = Effect::Allow;

/// Reason reported when the capability flag for an operation is off.
pub const REASON_CAPABILITY_DISABLED: &str = "capability disabled";

/// Reason reported when a path's `..` segments climb above its root.
pub const REASON_PATH_ESCAPES_ROOT: &str = "path escapes its root";

/// Outcome of a single authorization check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDecision {
    /// Whether the operation may proceed.
    pub allowed: bool,
    /// Pattern of the rule that decided the outcome, if any.
    pub matched_rule: Option<String>,
    /// Human-readable explanation.
    pub reason: String,
}

impl PermissionDecision {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            matched_rule: None,
            reason: reason.into(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            matched_rule: None,
            reason: reason.into(),
        }
    }

    /// Builder: record the rule that produced this decision.
    #[must_use]
    pub fn with_rule(mut self, pattern: impl Into<String>) -> Self {
        self.matched_rule = Some(pattern.into());
        self
    }

    pub fn is_denied(&self) -> bool {
        !self.allowed
    }
}

impl std::fmt::Display for PermissionDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verdict = if self.allowed { "ALLOW" } else { "DENY" };
        match &self.matched_rule {
            Some(rule) => write!(f, "{verdict} ({}; rule '{rule}')", self.reason),
            None => write!(f, "{verdict} ({})", self.reason),
        }
    }
}
