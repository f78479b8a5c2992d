//! The authorization algorithm.

use tracing::debug;

use crate::capability::{Capabilities, Intent, Operation, PathRule};
use crate::decision::{
    Effect, PermissionDecision, REASON_CAPABILITY_DISABLED, REASON_PATH_ESCAPES_ROOT,
    UNMATCHED_PATH_EFFECT,
};
use crate::glob::escapes_root;

/// Anything that carries a capability set and ordered path rules.
///
/// Command specs implement this so the engine can authorize them without
/// depending on the command crate.
pub trait PolicySubject {
    /// Name used in logs and denial messages.
    fn subject_name(&self) -> &str;

    fn capabilities(&self) -> &Capabilities;

    /// Rules in declaration order.
    fn path_rules(&self) -> &[PathRule];
}

/// Decide whether `subject` may perform `operation` on `path`.
///
/// 1. A disabled capability denies outright; rules are never consulted.
/// 2. Without a path the capability flag alone decides.
/// 3. A path whose `..` segments climb above its root is denied. Other
///    `.` and `..` segments are resolved before matching.
/// 4. Otherwise every matching rule is collected in declaration order: the
///    first matching `Deny` wins, then the first matching `Allow`, and with
///    no match [`UNMATCHED_PATH_EFFECT`] applies.
pub fn authorize<S>(subject: &S, operation: Operation, path: Option<&str>) -> PermissionDecision
where
    S: PolicySubject + ?Sized,
{
    let decision = decide(subject, operation, path);
    debug!(
        command = subject.subject_name(),
        %operation,
        path = path.unwrap_or("-"),
        allowed = decision.allowed,
        rule = decision.matched_rule.as_deref().unwrap_or("-"),
        "authorization decided"
    );
    decision
}

fn decide<S>(subject: &S, operation: Operation, path: Option<&str>) -> PermissionDecision
where
    S: PolicySubject + ?Sized,
{
    if !subject.capabilities().allows(operation) {
        return PermissionDecision::deny(REASON_CAPABILITY_DISABLED);
    }

    let Some(path) = path else {
        return PermissionDecision::allow(format!("{operation} capability granted"));
    };

    if escapes_root(path) {
        return PermissionDecision::deny(REASON_PATH_ESCAPES_ROOT);
    }

    let matching: Vec<&PathRule> = subject
        .path_rules()
        .iter()
        .filter(|rule| rule.matches(path))
        .collect();

    if let Some(rule) = matching.iter().find(|rule| rule.effect.is_deny()) {
        return PermissionDecision::deny(format!("'{path}' is denied by a path rule"))
            .with_rule(rule.pattern.as_str());
    }

    if let Some(rule) = matching.first() {
        return PermissionDecision::allow(format!("'{path}' is allowed by a path rule"))
            .with_rule(rule.pattern.as_str());
    }

    match UNMATCHED_PATH_EFFECT {
        Effect::Allow => PermissionDecision::allow("no path rule matched; capability granted"),
        Effect::Deny => PermissionDecision::deny("no path rule matched"),
    }
}

/// Authorize a batch of intents in order.
///
/// Returns every decision when all are allowed, or the first denial together
/// with the intent that caused it. Evaluation stops at that denial.
pub fn authorize_all<S>(
    subject: &S,
    intents: &[Intent],
) -> Result<Vec<PermissionDecision>, (Intent, PermissionDecision)>
where
    S: PolicySubject + ?Sized,
{
    let mut decisions = Vec::with_capacity(intents.len());
    for intent in intents {
        let decision = authorize(subject, intent.operation, intent.path.as_deref());
        if decision.is_denied() {
            return Err((intent.clone(), decision));
        }
        decisions.push(decision);
    }
    Ok(decisions)
}

/// A standalone policy: a named capability set plus path rules.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    name: String,
    capabilities: Capabilities,
    rules: Vec<PathRule>,
}

impl AccessPolicy {
    /// Creates a policy with no path rules.
    pub fn new(name: impl Into<String>, capabilities: Capabilities) -> Self {
        Self {
            name: name.into(),
            capabilities,
            rules: Vec::new(),
        }
    }

    /// Builder: append a rule.
    #[must_use]
    pub fn with_rule(mut self, rule: PathRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Builder: append several rules.
    #[must_use]
    pub fn with_rules(mut self, rules: impl IntoIterator<Item = PathRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    pub fn authorize(&self, operation: Operation, path: Option<&str>) -> PermissionDecision {
        authorize(self, operation, path)
    }
}

impl PolicySubject for AccessPolicy {
    fn subject_name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn path_rules(&self) -> &[PathRule] {
        &self.rules
    }
}
