//! CLI styling and formatting.

use clap::builder::styling::{AnsiColor, Effects, Styles};

/// Relay CLI help theme.
pub fn get_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Yellow.on_default())
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
        .valid(AnsiColor::Cyan.on_default())
        .invalid(AnsiColor::Yellow.on_default())
}

/// After-help section with examples, environment variables and paths.
pub const AFTER_HELP: &str = color_print::cstr!(
    r#"<cyan,bold>EXAMPLES</>
    <green,bold>relay list</>                                 List registered commands
    <green,bold>relay route</> <dim>"please review this diff"</>       Show which command would handle input
    <green,bold>relay dispatch</> <dim>"/refactor src/lib.rs"</>       Render a command's prompt
    <green,bold>relay check</> <dim>review read src/.env</>            Evaluate a permission

<cyan,bold>ENVIRONMENT VARIABLES</>
    <yellow>RELAY_HOME</>           Override the global directory (default: ~/.config/relay)
    <yellow>RELAY_LOG_LEVEL</>      Log verbosity (error, warn, info, debug, trace)

<cyan,bold>PATHS</>
    <dim>Config</>      .relay/config.toml, ~/.config/relay/config.toml
    <dim>Commands</>    .relay/commands/ (project), ~/.config/relay/commands/ (global)"#
);
