//! Relay Policy - least-privilege file access for commands.
//!
//! Every command declares coarse capability flags (`read_files`,
//! `write_files`, `execute_shell`) and an ordered list of glob path rules.
//! Before the execution backend touches the filesystem on behalf of a
//! command, each intended operation is run through [`authorize`]:
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │        Operation (+ optional path)         │
//! └────────────────────┬───────────────────────┘
//!                      │
//!                      ▼
//! ┌────────────────────────────────────────────┐
//! │   Capability flag set for this operation?  │
//! └────────────────────┬───────────────────────┘
//!        ┌─────────────┴─────────────┐
//!        ▼                           ▼
//!       [No]                       [Yes]
//!        │                           │
//!        ▼                           ▼
//!   ┌─────────┐           ┌─────────────────────┐
//!   │  DENY   │           │ Any Deny rule match? │
//!   └─────────┘           └──────────┬──────────┘
//!                        ┌───────────┴───────────┐
//!                        ▼                       ▼
//!                      [Yes]                    [No]
//!                        │                       │
//!                        ▼                       ▼
//!                   ┌─────────┐             ┌─────────┐
//!                   │  DENY   │             │  ALLOW  │
//!                   └─────────┘             └─────────┘
//! ```
//!
//! Paths are matched with the segment-based glob matcher in [`glob`].

#[cfg(test)]
mod tests;

mod capability;
mod decision;
mod error;
pub mod glob;
mod policy;

pub use capability::{Capabilities, Intent, Operation, PathRule};
pub use decision::{
    Effect, PermissionDecision, REASON_CAPABILITY_DISABLED, REASON_PATH_ESCAPES_ROOT,
    UNMATCHED_PATH_EFFECT,
};
pub use error::PolicyError;
pub use glob::{GlobPattern, escapes_root, matches};
pub use policy::{AccessPolicy, PolicySubject, authorize, authorize_all};
