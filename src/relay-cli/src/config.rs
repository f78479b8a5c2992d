//! `config.toml` loading.
//!
//! Lookup order:
//! 1. `--config <path>` (must exist)
//! 2. `.relay/config.toml` in the working directory
//! 3. `<global>/config.toml`, where `<global>` is `$RELAY_HOME` or
//!    `<config_dir>/relay`
//! 4. Built-in defaults

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use relay_commands::{CommandLoader, PROJECT_COMMAND_DIR};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Environment variable overriding the global configuration root.
pub const RELAY_HOME_ENV: &str = "RELAY_HOME";

const CONFIG_FILE: &str = "config.toml";
const PROJECT_CONFIG: &str = ".relay/config.toml";

/// Settings read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    /// Extra command directories, searched after the defaults.
    pub commands_dirs: Vec<PathBuf>,
    /// Register the built-in commands.
    pub include_builtins: bool,
    /// Default log level when no flag or environment override is given.
    pub log_level: Option<String>,
    /// Hot-reload commands in `relay repl`.
    pub watch: bool,
    /// Expose the working tree's `git diff` to templates as `git_diff`.
    pub git_diff: bool,
    /// Environment variables templates may read as `env.<NAME>`.
    pub env_allowlist: Vec<String>,
}

/// Environment variables exposed to templates unless configured otherwise.
pub const DEFAULT_ENV_ALLOWLIST: &[&str] = &["USER", "HOME", "SHELL", "LANG"];

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            commands_dirs: Vec::new(),
            include_builtins: true,
            log_level: None,
            watch: false,
            git_diff: true,
            env_allowlist: DEFAULT_ENV_ALLOWLIST
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}

impl RelayConfig {
    /// Parse a config file body.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load the configuration, returning it with the file it came from.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            if !path.is_file() {
                bail!("Config file not found: {}", path.display());
            }
            return Ok((Self::read(path)?, Some(path.to_path_buf())));
        }

        for path in default_config_paths() {
            if path.is_file() {
                return Ok((Self::read(&path)?, Some(path)));
            }
            debug!("No config at {}", path.display());
        }

        Ok((Self::default(), None))
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Command directories in precedence order: project-local, global, then
    /// configured extras.
    pub fn command_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![PathBuf::from(PROJECT_COMMAND_DIR)];
        if let Some(global) = global_dir() {
            dirs.push(global.join("commands"));
        }
        for extra in &self.commands_dirs {
            if !dirs.contains(extra) {
                dirs.push(extra.clone());
            }
        }
        dirs
    }

    pub fn loader(&self) -> CommandLoader {
        CommandLoader::with_dirs(self.command_dirs())
    }
}

/// `$RELAY_HOME`, else `<config_dir>/relay`.
pub fn global_dir() -> Option<PathBuf> {
    match std::env::var_os(RELAY_HOME_ENV) {
        Some(home) if !home.is_empty() => Some(PathBuf::from(home)),
        _ => dirs::config_dir().map(|dir| dir.join("relay")),
    }
}

fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(PROJECT_CONFIG)];
    if let Some(global) = global_dir() {
        paths.push(global.join(CONFIG_FILE));
    }
    paths
}
