//! Capability flags, operations and path rules.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::decision::Effect;
use crate::error::PolicyError;
use crate::glob::GlobPattern;

/// Kind of operation a command wants to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Write,
    Execute,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Read => write!(f, "read"),
            Operation::Write => write!(f, "write"),
            Operation::Execute => write!(f, "execute"),
        }
    }
}

impl FromStr for Operation {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "read" | "r" => Ok(Operation::Read),
            "write" | "w" => Ok(Operation::Write),
            "execute" | "exec" | "x" => Ok(Operation::Execute),
            other => Err(PolicyError::UnknownOperation(other.to_string())),
        }
    }
}

/// Coarse capability flags declared by a command.
///
/// Every flag defaults to `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub read_files: bool,
    #[serde(default)]
    pub write_files: bool,
    #[serde(default)]
    pub execute_shell: bool,
}

impl Capabilities {
    /// No capabilities at all.
    pub fn none() -> Self {
        Self::default()
    }

    /// Read access only.
    pub fn read_only() -> Self {
        Self {
            read_files: true,
            ..Default::default()
        }
    }

    /// Every capability enabled.
    pub fn full_access() -> Self {
        Self {
            read_files: true,
            write_files: true,
            execute_shell: true,
        }
    }

    /// Whether the flag for `operation` is set.
    pub fn allows(&self, operation: Operation) -> bool {
        match operation {
            Operation::Read => self.read_files,
            Operation::Write => self.write_files,
            Operation::Execute => self.execute_shell,
        }
    }
}

/// A compiled path rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRule {
    pub pattern: GlobPattern,
    pub effect: Effect,
}

impl PathRule {
    /// Compile a rule. Empty patterns are rejected.
    pub fn new(pattern: &str, effect: Effect) -> Result<Self, PolicyError> {
        if pattern.trim().is_empty() {
            return Err(PolicyError::EmptyPattern);
        }
        Ok(Self {
            pattern: GlobPattern::new(pattern)?,
            effect,
        })
    }

    pub fn allow(pattern: &str) -> Result<Self, PolicyError> {
        Self::new(pattern, Effect::Allow)
    }

    pub fn deny(pattern: &str) -> Result<Self, PolicyError> {
        Self::new(pattern, Effect::Deny)
    }

    pub fn matches(&self, path: &str) -> bool {
        self.pattern.matches(path)
    }
}

/// An operation the execution backend intends to perform on behalf of a
/// command. `path` is absent for operations such as running a shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub operation: Operation,
    #[serde(default)]
    pub path: Option<String>,
}

impl Intent {
    pub fn new(operation: Operation, path: Option<String>) -> Self {
        Self { operation, path }
    }

    pub fn read(path: impl Into<String>) -> Self {
        Self::new(Operation::Read, Some(path.into()))
    }

    pub fn write(path: impl Into<String>) -> Self {
        Self::new(Operation::Write, Some(path.into()))
    }

    pub fn execute() -> Self {
        Self::new(Operation::Execute, None)
    }
}

impl FromStr for Intent {
    type Err = PolicyError;

    /// Parse `op` or `op:path`, e.g. `write:src/main.rs` or `execute`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((op, path)) if !path.is_empty() => {
                Ok(Self::new(op.parse()?, Some(path.to_string())))
            }
            Some((op, _)) => Ok(Self::new(op.parse()?, None)),
            None => Ok(Self::new(s.parse()?, None)),
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}:{path}", self.operation),
            None => write!(f, "{}", self.operation),
        }
    }
}
