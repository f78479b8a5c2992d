//! Relay CLI library module.
//!
//! - `cli/` - argument parsing and command dispatch
//! - `config` - `config.toml` discovery and loading
//! - `context` - template context variables (git diff, files, environment)

pub mod cli;
pub mod config;
pub mod context;

pub use config::RelayConfig;
