//! Built-in commands.
//!
//! These ship embedded in the binary and are registered before any user
//! documents, so a user document with the same name replaces them.
//!
//! - `explain` - Explain what a piece of code does
//! - `review` - Comprehensive code review (agent `code-reviewer`)
//! - `security-audit` - Security audit (agent `security-auditor`)
//! - `refactor` - Behaviour-preserving restructuring (agent `refactorer`)

mod templates;

use tracing::error;

use crate::spec::{CommandSpec, SpecSource};

pub use templates::{
    BUILTIN_COMMANDS, EXPLAIN_COMMAND, REFACTOR_COMMAND, REVIEW_COMMAND, SECURITY_AUDIT_COMMAND,
};

/// Parse every built-in document.
///
/// A document that fails to parse is logged and left out.
pub fn builtin_specs() -> Vec<CommandSpec> {
    BUILTIN_COMMANDS
        .iter()
        .filter_map(
            |document| match CommandSpec::parse(document, SpecSource::Builtin) {
                Ok(spec) => Some(spec),
                Err(e) => {
                    error!("Built-in command document is invalid: {e}");
                    None
                }
            },
        )
        .collect()
}
