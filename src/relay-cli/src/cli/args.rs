//! CLI argument structures and parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use relay_policy::{Intent, Operation};

use super::styles::{AFTER_HELP, get_styles};

/// Log verbosity level for CLI output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    /// Only show errors
    Error,
    /// Show warnings and errors
    Warn,
    /// Show informational messages, warnings, and errors (default)
    #[default]
    Info,
    /// Show debug messages and above
    Debug,
    /// Show all messages including trace-level details
    Trace,
}

impl LogLevel {
    /// Convert to tracing filter string.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Parse from string (case-insensitive).
    pub fn from_str_loose(s: &str) -> Option<LogLevel> {
        match s.trim().to_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

/// Relay - command routing and dispatch
#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(author, version)]
#[command(about = "Relay - route input to commands and agents", long_about = None)]
#[command(styles = get_styles(), after_help = AFTER_HELP)]
pub struct Cli {
    /// Path to a config file (default: .relay/config.toml, then the global config)
    #[arg(long = "config", short = 'c', global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run as if started in this directory
    #[arg(long = "project", short = 'C', global = true, value_name = "DIR")]
    pub project: Option<PathBuf>,

    /// Enable verbose output (same as --log-level debug)
    #[arg(long = "verbose", short = 'v', global = true)]
    pub verbose: bool,

    /// Enable trace-level logging for debugging
    #[arg(long = "trace", global = true)]
    pub trace: bool,

    /// Log verbosity
    #[arg(long = "log-level", global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Do not register the built-in commands
    #[arg(long = "no-builtins", global = true)]
    pub no_builtins: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List registered commands
    #[command(visible_alias = "ls")]
    List(ListArgs),

    /// Show one command's definition
    Show(ShowArgs),

    /// Show which command free-text input routes to
    Route(RouteArgs),

    /// Evaluate a permission for a command
    Check(CheckArgs),

    /// Resolve, authorize and render a command
    #[command(visible_alias = "d")]
    Dispatch(DispatchArgs),

    /// Dispatch every line read from stdin
    Repl(ReplArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Only list commands in this category
    #[arg(long)]
    pub category: Option<String>,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Command name or alias
    pub name: String,
}

#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Print every matching candidate, best first
    #[arg(long)]
    pub all: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Input text
    #[arg(required = true, num_args = 1..)]
    pub input: Vec<String>,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Command name or alias
    pub command: String,

    /// Operation: read, write or execute
    pub operation: Operation,

    /// Target path
    pub path: Option<String>,
}

#[derive(Args, Debug)]
pub struct DispatchArgs {
    /// Input text or slash invocation, e.g. `/review src/lib.rs`
    #[arg(required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Bind an argument explicitly (repeatable)
    #[arg(long = "arg", short = 'a', value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub args: Vec<(String, String)>,

    /// Declare an intended operation as op[:path] (repeatable)
    #[arg(long = "intent", short = 'i', value_name = "OP[:PATH]")]
    pub intents: Vec<Intent>,

    /// Expose a file to the template as part of `files` (repeatable)
    #[arg(long = "file", short = 'f', value_name = "PATH")]
    pub files: Vec<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ReplArgs {
    /// Reload commands when their files change
    #[arg(long)]
    pub watch: bool,
}

/// Parse `key=value`.
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}
