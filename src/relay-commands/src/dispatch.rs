//! Dispatch coordination: resolve, bind, authorize, render.

use std::collections::HashMap;

use indexmap::IndexMap;
use relay_policy::{Intent, PermissionDecision, authorize_all};
use serde::Serialize;
use tracing::{debug, info};

use crate::args;
use crate::error::DispatchError;
use crate::handle::RegistryHandle;
use crate::invocation::{first_token, parse_invocation};
use crate::registry::CommandRegistry;
use crate::router;
use crate::spec::CommandSpec;
use crate::template::Template;

/// One dispatch request.
#[derive(Debug, Clone, Default)]
pub struct DispatchRequest {
    /// Free text or a slash invocation such as `/refactor main.rs goal=perf`.
    pub raw_input: String,
    /// Explicitly bound values; these beat anything parsed from the input.
    pub bound_args: HashMap<String, String>,
    /// Operations the execution backend intends to perform.
    pub intents: Vec<Intent>,
    /// Context variables gathered by the caller (`git_diff`, `files`,
    /// `workspace_root`, `env.<NAME>`). Arguments of the same name win.
    pub context: HashMap<String, String>,
}

impl DispatchRequest {
    pub fn new(raw_input: impl Into<String>) -> Self {
        Self {
            raw_input: raw_input.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.bound_args.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intents.push(intent);
        self
    }

    #[must_use]
    pub fn with_context(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(name.into(), value.into());
        self
    }
}

/// How the command was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Resolution {
    /// The first token is the command's name.
    ByName,
    /// The first token is one of the command's aliases.
    ByAlias,
    /// The router picked the command from activation hints.
    Routed { score: usize },
}

/// The hand-off to the execution backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    pub spec_name: String,
    pub rendered_text: String,
    pub agent_id: Option<String>,
    /// Resolved argument values in declaration order, then context variables.
    pub arguments: IndexMap<String, String>,
    pub resolution: Resolution,
    /// One allow decision per declared intent, in order.
    pub decisions: Vec<PermissionDecision>,
}

/// Dispatch `request` against one registry snapshot.
///
/// 1. Exact-name (or alias) lookup on the first token, else the router.
/// 2. Bind arguments; a missing required argument fails before any
///    permission check.
/// 3. Authorize every declared intent; the first denial aborts.
/// 4. Render the template.
pub fn dispatch(
    registry: &CommandRegistry,
    request: &DispatchRequest,
) -> Result<DispatchResult, DispatchError> {
    let (spec, resolution) =
        resolve(registry, &request.raw_input).ok_or_else(|| DispatchError::UnknownCommand {
            input: request.raw_input.trim().to_string(),
        })?;
    debug!(command = %spec.name, ?resolution, "command resolved");

    let invocation = match resolution {
        Resolution::ByName | Resolution::ByAlias => parse_invocation(&request.raw_input),
        Resolution::Routed { .. } => None,
    };
    let bound = args::bind(spec, invocation.as_ref(), &request.bound_args)?;
    let arguments = args::resolve(spec, &bound, &request.context)?;

    let decisions = authorize_all(spec, &request.intents).map_err(|(intent, decision)| {
        info!(command = %spec.name, %intent, reason = %decision.reason, "dispatch denied");
        DispatchError::PermissionDenied {
            command: spec.name.clone(),
            intent,
            reason: decision.reason,
            matched_rule: decision.matched_rule,
        }
    })?;

    let rendered_text = render_resolved(spec, &arguments)?;

    Ok(DispatchResult {
        spec_name: spec.name.clone(),
        rendered_text,
        agent_id: spec.agent_id.clone(),
        arguments,
        resolution,
        decisions,
    })
}

/// Render `spec` with `bound_args`, applying defaults.
///
/// Fails with `MissingArgument` when a required argument has no value and
/// with `MalformedTemplate` when the template is structurally invalid.
pub fn render(
    spec: &CommandSpec,
    bound_args: &HashMap<String, String>,
) -> Result<String, DispatchError> {
    render_with_context(spec, bound_args, &HashMap::new())
}

/// Like [`render`], with caller-supplied context variables available to the
/// template.
pub fn render_with_context(
    spec: &CommandSpec,
    bound_args: &HashMap<String, String>,
    context: &HashMap<String, String>,
) -> Result<String, DispatchError> {
    let arguments = args::resolve(spec, bound_args, context)?;
    render_resolved(spec, &arguments)
}

fn render_resolved(
    spec: &CommandSpec,
    arguments: &IndexMap<String, String>,
) -> Result<String, DispatchError> {
    let template =
        Template::parse(&spec.template).map_err(|source| DispatchError::MalformedTemplate {
            command: spec.name.clone(),
            source,
        })?;
    Ok(template.render(arguments))
}

/// Find the command for `input`: exact name, then alias, then the router.
pub fn resolve<'a>(
    registry: &'a CommandRegistry,
    input: &str,
) -> Option<(&'a CommandSpec, Resolution)> {
    if let Some(token) = first_token(input) {
        if let Some(spec) = registry.get_exact(token) {
            return Some((spec, Resolution::ByName));
        }
        if let Some(spec) = registry.get(token) {
            return Some((spec, Resolution::ByAlias));
        }
    }
    router::best(input, registry).map(|m| (m.spec, Resolution::Routed { score: m.score }))
}

/// Dispatches against whatever registry is current at call time.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    handle: RegistryHandle,
}

impl Dispatcher {
    pub fn new(handle: RegistryHandle) -> Self {
        Self { handle }
    }

    pub fn from_registry(registry: CommandRegistry) -> Self {
        Self::new(RegistryHandle::new(registry))
    }

    pub fn handle(&self) -> &RegistryHandle {
        &self.handle
    }

    /// Dispatch against a snapshot taken now. A concurrent reload does not
    /// affect a dispatch already in progress.
    pub fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchResult, DispatchError> {
        let snapshot = self.handle.snapshot();
        dispatch(&snapshot, request)
    }
}
