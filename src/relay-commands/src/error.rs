//! Per-dispatch errors.

use relay_policy::Intent;
use thiserror::Error;

use crate::spec::ArgType;
use crate::template::TemplateError;

/// Why a single dispatch was aborted. None of these are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Neither exact-name lookup nor the router resolved the input.
    #[error("No command matches '{input}'")]
    UnknownCommand { input: String },

    /// A required argument has no bound value.
    #[error("Command '{command}' requires argument '{argument}'")]
    MissingArgument { command: String, argument: String },

    /// A value was bound to a name the command does not declare.
    #[error("Command '{command}' has no argument named '{argument}'")]
    UnknownArgument { command: String, argument: String },

    /// A bound value does not fit the declared argument type.
    #[error("Argument '{argument}' of '{command}' expects a {expected}, got '{value}'")]
    InvalidArgument {
        command: String,
        argument: String,
        expected: ArgType,
        value: String,
    },

    /// The command's template is structurally invalid.
    #[error("Template of '{command}' is malformed: {source}")]
    MalformedTemplate {
        command: String,
        source: TemplateError,
    },

    /// A declared intent was denied by the command's policy.
    #[error("Permission denied for '{command}' to {intent}: {reason}")]
    PermissionDenied {
        command: String,
        intent: Intent,
        reason: String,
        matched_rule: Option<String>,
    },
}

impl DispatchError {
    /// Whether this is a policy denial.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, DispatchError::PermissionDenied { .. })
    }
}
