//! Command specs and definition-document parsing.

use std::collections::HashSet;
use std::path::PathBuf;

use relay_policy::{Capabilities, Effect, PathRule, PolicyError, PolicySubject};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::template;

/// Errors raised while parsing or validating a command definition.
#[derive(Debug, Error)]
pub enum SpecError {
    /// Invalid frontmatter format.
    #[error("Invalid frontmatter: {0}")]
    InvalidFrontmatter(String),

    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A field is present but its value is unacceptable.
    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// An argument declaration is malformed.
    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    /// A path rule pattern failed to compile.
    #[error("Invalid path rule: {0}")]
    PathRule(#[from] PolicyError),
}

impl SpecError {
    fn field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    fn argument(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Value type of a declared argument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    #[default]
    String,
    Number,
    Boolean,
    File,
}

impl ArgType {
    /// Whether `value` is acceptable for this type.
    ///
    /// `String` and `File` accept anything; the core never touches the
    /// filesystem, so a `File` value is only a path string.
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            ArgType::String | ArgType::File => true,
            ArgType::Number => value.trim().parse::<f64>().is_ok_and(f64::is_finite),
            ArgType::Boolean => matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "true" | "false" | "yes" | "no" | "1" | "0"
            ),
        }
    }
}

impl std::fmt::Display for ArgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgType::String => write!(f, "string"),
            ArgType::Number => write!(f, "number"),
            ArgType::Boolean => write!(f, "boolean"),
            ArgType::File => write!(f, "file"),
        }
    }
}

/// A declared argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgSpec {
    pub name: String,
    pub arg_type: ArgType,
    pub required: bool,
    pub description: String,
    /// Never set on a required argument.
    pub default: Option<String>,
}

impl ArgSpec {
    /// A required string argument.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arg_type: ArgType::String,
            required: true,
            description: String::new(),
            default: None,
        }
    }

    /// An optional string argument.
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name)
        }
    }

    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    #[must_use]
    pub fn with_type(mut self, arg_type: ArgType) -> Self {
        self.arg_type = arg_type;
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Where a spec was defined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecSource {
    /// Embedded in the binary.
    Builtin,
    /// Loaded from a definition document on disk.
    File(PathBuf),
}

impl std::fmt::Display for SpecSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpecSource::Builtin => write!(f, "builtin"),
            SpecSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// One registered command or agent.
#[derive(Debug, Clone, Serialize)]
pub struct CommandSpec {
    pub name: String,
    pub description: String,
    pub category: String,
    pub is_agent: bool,
    /// Present exactly when `is_agent` is true.
    pub agent_id: Option<String>,
    /// Empty means the router never selects this spec.
    pub activation_hints: Vec<String>,
    pub aliases: Vec<String>,
    pub permissions: Capabilities,
    /// Declaration order is significant.
    pub path_rules: Vec<PathRule>,
    pub args: Vec<ArgSpec>,
    pub template: String,
    pub source: SpecSource,
}

impl CommandSpec {
    /// Create a plain command with no hints, args or permissions.
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: "Custom command".to_string(),
            category: "custom".to_string(),
            is_agent: false,
            agent_id: None,
            activation_hints: Vec::new(),
            aliases: Vec::new(),
            permissions: Capabilities::none(),
            path_rules: Vec::new(),
            args: Vec::new(),
            template: template.into(),
            source: SpecSource::Builtin,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Builder: mark as an agent handled by `agent_id`.
    #[must_use]
    pub fn as_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.is_agent = true;
        self.agent_id = Some(agent_id.into());
        self
    }

    #[must_use]
    pub fn with_hints<I, S>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.activation_hints = hints.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_permissions(mut self, permissions: Capabilities) -> Self {
        self.permissions = permissions;
        self
    }

    #[must_use]
    pub fn with_rule(mut self, rule: PathRule) -> Self {
        self.path_rules.push(rule);
        self
    }

    #[must_use]
    pub fn with_arg(mut self, arg: ArgSpec) -> Self {
        self.args.push(arg);
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: SpecSource) -> Self {
        self.source = source;
        self
    }

    /// Parse a definition document.
    ///
    /// The document is Markdown with a `---` fenced YAML frontmatter block.
    /// The template is the text after a `Template` heading when the body has
    /// one, otherwise the whole body.
    pub fn parse(content: &str, source: SpecSource) -> Result<Self, SpecError> {
        let (frontmatter, body) = split_frontmatter(content)?;
        let document: SpecDocument = serde_yaml::from_str(frontmatter)?;
        let spec = document.into_spec(extract_template(body), source)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Check the structural invariants of a spec.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.name.trim().is_empty() {
            return Err(SpecError::MissingField("name"));
        }
        if !is_identifier(&self.name) {
            return Err(SpecError::field(
                "name",
                format!("'{}' may only contain letters, digits, '-' and '_'", self.name),
            ));
        }
        if self.description.trim().is_empty() {
            return Err(SpecError::MissingField("description"));
        }
        if self.category.trim().is_empty() {
            return Err(SpecError::MissingField("category"));
        }

        match (self.is_agent, self.agent_id.as_deref().map(str::trim)) {
            (true, None) | (true, Some("")) => return Err(SpecError::MissingField("agent_id")),
            (false, Some(_)) => {
                return Err(SpecError::field(
                    "agent_id",
                    "only agents (agent: true) may declare an agent_id",
                ));
            }
            _ => {}
        }

        for alias in &self.aliases {
            if !is_identifier(alias) {
                return Err(SpecError::field(
                    "aliases",
                    format!("'{alias}' is not a valid command name"),
                ));
            }
            if alias == &self.name {
                return Err(SpecError::field(
                    "aliases",
                    format!("'{alias}' repeats the command name"),
                ));
            }
        }

        let mut seen = HashSet::new();
        for arg in &self.args {
            if arg.name.trim().is_empty() {
                return Err(SpecError::argument(&arg.name, "name is empty"));
            }
            if !is_identifier(&arg.name) {
                return Err(SpecError::argument(
                    &arg.name,
                    "may only contain letters, digits, '-' and '_'",
                ));
            }
            if !seen.insert(arg.name.as_str()) {
                return Err(SpecError::argument(&arg.name, "declared more than once"));
            }
            if arg.required && arg.default.is_some() {
                return Err(SpecError::argument(
                    &arg.name,
                    "a required argument cannot have a default",
                ));
            }
            if let Some(default) = &arg.default
                && !arg.arg_type.accepts(default)
            {
                return Err(SpecError::argument(
                    &arg.name,
                    format!("default '{default}' is not a valid {}", arg.arg_type),
                ));
            }
        }

        Ok(())
    }

    /// Look up a declared argument.
    pub fn arg(&self, name: &str) -> Option<&ArgSpec> {
        self.args.iter().find(|arg| arg.name == name)
    }

    /// Names referenced by the template, in first-use order.
    pub fn placeholders(&self) -> Vec<String> {
        template::placeholders(&self.template)
    }

    /// Whether the router may select this spec.
    pub fn is_routable(&self) -> bool {
        self.activation_hints.iter().any(|hint| !hint.trim().is_empty())
    }
}

impl PolicySubject for CommandSpec {
    fn subject_name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &Capabilities {
        &self.permissions
    }

    fn path_rules(&self) -> &[PathRule] {
        &self.path_rules
    }
}

/// Whether `s` is a valid command, alias or argument name.
pub fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Raw frontmatter, before validation.
#[derive(Debug, Deserialize)]
struct SpecDocument {
    name: Option<String>,
    description: Option<String>,
    category: Option<String>,
    agent: Option<bool>,
    #[serde(default)]
    agent_id: Option<String>,
    #[serde(default)]
    activation_hints: Vec<String>,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    permissions: Capabilities,
    #[serde(default)]
    path_rules: Vec<RuleDocument>,
    #[serde(default)]
    args: Vec<ArgDocument>,
}

#[derive(Debug, Deserialize)]
struct RuleDocument {
    pattern: String,
    effect: Effect,
}

#[derive(Debug, Deserialize)]
struct ArgDocument {
    name: Option<String>,
    #[serde(rename = "type", default)]
    arg_type: ArgType,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    description: String,
    #[serde(default)]
    default: Option<serde_yaml::Value>,
}

impl SpecDocument {
    fn into_spec(self, template: String, source: SpecSource) -> Result<CommandSpec, SpecError> {
        let name = self.name.ok_or(SpecError::MissingField("name"))?;
        let description = self
            .description
            .ok_or(SpecError::MissingField("description"))?;
        let category = self.category.ok_or(SpecError::MissingField("category"))?;
        let is_agent = self.agent.ok_or(SpecError::MissingField("agent"))?;

        let path_rules = self
            .path_rules
            .into_iter()
            .map(|rule| PathRule::new(&rule.pattern, rule.effect))
            .collect::<Result<Vec<_>, _>>()?;

        let args = self
            .args
            .into_iter()
            .map(ArgDocument::into_arg)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CommandSpec {
            name: name.trim().to_string(),
            description: description.trim().to_string(),
            category: category.trim().to_string(),
            is_agent,
            agent_id: self.agent_id.map(|id| id.trim().to_string()),
            activation_hints: self.activation_hints,
            aliases: self.aliases,
            permissions: self.permissions,
            path_rules,
            args,
            template,
            source,
        })
    }
}

impl ArgDocument {
    fn into_arg(self) -> Result<ArgSpec, SpecError> {
        let name = self.name.unwrap_or_default().trim().to_string();
        let default = match self.default {
            None | Some(serde_yaml::Value::Null) => None,
            Some(serde_yaml::Value::String(s)) => Some(s),
            Some(serde_yaml::Value::Number(n)) => Some(n.to_string()),
            Some(serde_yaml::Value::Bool(b)) => Some(b.to_string()),
            Some(_) => return Err(SpecError::argument(&name, "default must be a scalar")),
        };
        Ok(ArgSpec {
            name,
            arg_type: self.arg_type,
            required: self.required,
            description: self.description,
            default,
        })
    }
}

/// Split a document into its frontmatter and body.
fn split_frontmatter(content: &str) -> Result<(&str, &str), SpecError> {
    let content = content.trim_start_matches('\u{feff}').trim_start();

    let Some(rest) = content.strip_prefix("---") else {
        return Err(SpecError::InvalidFrontmatter(
            "document must start with a '---' frontmatter block".to_string(),
        ));
    };
    let rest = rest.trim_start_matches([' ', '\t']);
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .ok_or_else(|| {
            SpecError::InvalidFrontmatter("opening '---' must be on its own line".to_string())
        })?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Ok((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }

    Err(SpecError::InvalidFrontmatter(
        "Missing closing '---' delimiter".to_string(),
    ))
}

/// Pick the template out of a document body.
fn extract_template(body: &str) -> String {
    let mut in_fence = false;
    let mut offset = 0;

    for line in body.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
        } else if !in_fence && is_template_heading(trimmed) {
            return trim_blank_lines(&body[offset + line.len()..]);
        }
        offset += line.len();
    }

    trim_blank_lines(body)
}

fn is_template_heading(line: &str) -> bool {
    let text = line.trim_start_matches('#');
    line.len() != text.len()
        && (text.is_empty() || text.starts_with(' '))
        && text.trim().trim_end_matches('#').trim().eq_ignore_ascii_case("template")
}

/// Drop leading and trailing blank lines, keeping indentation of the first
/// non-blank line.
fn trim_blank_lines(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end]
            .iter()
            .map(|l| l.trim_end())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}
