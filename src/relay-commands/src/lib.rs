//! Command registry and dispatch for Relay.
//!
//! This crate turns a catalog of declaratively defined commands into a
//! dispatch runtime: it picks the right command for user input, checks the
//! command's file-access policy for every operation the execution backend
//! intends to perform, and expands the command's prompt template.
//!
//! ```text
//!   raw input ──► exact name / alias ──┐
//!        │                             ├──► bind args ──► authorize intents ──► render
//!        └──────► activation router ───┘        │                │                │
//!                                         MissingArgument  PermissionDenied  DispatchResult
//! ```
//!
//! # Command File Format
//!
//! Commands are defined in `.md` files with YAML frontmatter:
//!
//! ```markdown
//! ---
//! name: refactor
//! description: Restructure code without changing its behaviour
//! category: code
//! agent: true
//! agent_id: refactorer
//! activation_hints: ["refactor", "clean up"]
//! aliases: [rf]
//! permissions:
//!   read_files: true
//!   write_files: true
//! path_rules:
//!   - pattern: "src/**"
//!     effect: allow
//!   - pattern: "**/secrets/**"
//!     effect: deny
//! args:
//!   - name: target
//!     type: file
//!     required: true
//!   - name: goal
//! ---
//!
//! # Template
//!
//! Refactor: {{target}}{{#if goal}} goal={{goal}}{{/if}}
//! ```
//!
//! # Search Paths
//!
//! Commands are loaded from:
//! 1. `.relay/commands/` (project-local)
//! 2. `<config_dir>/relay/commands/` (global)
//!
//! Earlier directories win on duplicate names, and any document replaces a
//! built-in command of the same name.
//!
//! # Dispatch
//!
//! ```rust,ignore
//! use relay_commands::{CommandLoader, DispatchRequest, Dispatcher};
//! use relay_policy::Intent;
//!
//! let (registry, _failures) = CommandLoader::new().load_registry(true).await;
//! let dispatcher = Dispatcher::from_registry(registry);
//! let result = dispatcher.dispatch(
//!     &DispatchRequest::new("/refactor src/main.rs goal=perf")
//!         .with_intent(Intent::write("src/main.rs")),
//! )?;
//! println!("{}", result.rendered_text);
//! ```

mod args;
pub mod builtin;
mod dispatch;
mod error;
mod handle;
mod invocation;
mod loader;
mod registry;
pub mod router;
mod spec;
pub mod template;
mod watcher;

pub use args::{
    ENV_VAR_PREFIX, FILES_VAR, GIT_DIFF_VAR, WORKSPACE_ROOT_VAR, bind, is_context_variable,
    resolve as resolve_arguments,
};
pub use dispatch::{
    DispatchRequest, DispatchResult, Dispatcher, Resolution, dispatch, render,
    render_with_context, resolve,
};
pub use error::DispatchError;
pub use handle::{RegistryHandle, ReloadEvent};
pub use invocation::{Invocation, first_token, parse_invocation};
pub use loader::{
    CommandLoader, LoadFailure, LoadReport, LoaderError, PROJECT_COMMAND_DIR, is_command_file,
    sync,
};
pub use registry::CommandRegistry;
pub use router::{RouteMatch, rank, route};
pub use spec::{ArgSpec, ArgType, CommandSpec, SpecError, SpecSource, is_identifier};
pub use template::{Template, TemplateError, placeholders};
pub use watcher::{CommandWatcher, DEBOUNCE, WatchError};
