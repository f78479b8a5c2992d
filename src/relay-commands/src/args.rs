//! Argument binding and resolution.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::warn;

use crate::error::DispatchError;
use crate::invocation::Invocation;
use crate::spec::CommandSpec;

/// Context variable holding the working tree's uncommitted changes.
pub const GIT_DIFF_VAR: &str = "git_diff";
/// Context variable holding the selected files, one per line.
pub const FILES_VAR: &str = "files";
/// Context variable holding the workspace root directory.
pub const WORKSPACE_ROOT_VAR: &str = "workspace_root";
/// Prefix of context variables carrying environment values, e.g. `env.HOME`.
pub const ENV_VAR_PREFIX: &str = "env.";

/// Whether `name` is a context variable a caller may supply alongside the
/// arguments.
pub fn is_context_variable(name: &str) -> bool {
    match name.strip_prefix(ENV_VAR_PREFIX) {
        Some(var) => !var.is_empty(),
        None => matches!(name, GIT_DIFF_VAR | FILES_VAR | WORKSPACE_ROOT_VAR),
    }
}

/// Resolve every declared argument of `spec`: bound value, else default,
/// else absent. Undeclared bound values are carried through so templates can
/// reference them, followed by the context variables in `context` that no
/// argument shadows.
///
/// Returns the resolved values in declaration order, or `MissingArgument`
/// for the first required argument with nothing bound.
pub fn resolve(
    spec: &CommandSpec,
    bound: &HashMap<String, String>,
    context: &HashMap<String, String>,
) -> Result<IndexMap<String, String>, DispatchError> {
    let mut resolved = IndexMap::with_capacity(spec.args.len());

    for arg in &spec.args {
        match bound.get(&arg.name).or(arg.default.as_ref()) {
            Some(value) => {
                resolved.insert(arg.name.clone(), value.clone());
            }
            None if arg.required => {
                return Err(DispatchError::MissingArgument {
                    command: spec.name.clone(),
                    argument: arg.name.clone(),
                });
            }
            None => {}
        }
    }

    let mut extra: Vec<_> = bound
        .iter()
        .filter(|(name, _)| spec.arg(name).is_none())
        .collect();
    extra.sort();
    for (name, value) in extra {
        resolved.insert(name.clone(), value.clone());
    }

    let mut variables: Vec<_> = context.iter().collect();
    variables.sort();
    for (name, value) in variables {
        if !is_context_variable(name) {
            warn!(command = %spec.name, variable = %name, "ignoring unknown context variable");
            continue;
        }
        resolved.entry(name.clone()).or_insert_with(|| value.clone());
    }

    Ok(resolved)
}

/// Merge every binding source for a dispatch.
///
/// Priority, highest first: `explicit`, `key=value` tokens, positional tokens
/// mapped onto declared arguments not yet bound (in declaration order).
/// Defaults are applied later by [`resolve`]. Unknown names and values that
/// do not fit the declared type are rejected.
pub fn bind(
    spec: &CommandSpec,
    invocation: Option<&Invocation>,
    explicit: &HashMap<String, String>,
) -> Result<HashMap<String, String>, DispatchError> {
    let mut bound: HashMap<String, String> = HashMap::new();

    for name in explicit.keys() {
        ensure_declared(spec, name)?;
    }
    bound.extend(explicit.iter().map(|(k, v)| (k.clone(), v.clone())));

    if let Some(invocation) = invocation {
        for (name, value) in &invocation.named {
            ensure_declared(spec, name)?;
            bound.entry(name.clone()).or_insert_with(|| value.clone());
        }

        let unbound: Vec<&str> = spec
            .args
            .iter()
            .filter(|arg| !bound.contains_key(&arg.name))
            .map(|arg| arg.name.as_str())
            .collect();
        let mut positional = invocation.positional.iter();
        for (name, value) in unbound.into_iter().zip(positional.by_ref()) {
            bound.insert(name.to_string(), value.clone());
        }

        let surplus: Vec<&str> = positional.map(String::as_str).collect();
        if !surplus.is_empty() {
            warn!(
                command = %spec.name,
                ignored = ?surplus,
                "ignoring surplus positional arguments"
            );
        }
    }

    for arg in &spec.args {
        if let Some(value) = bound.get(&arg.name)
            && !arg.arg_type.accepts(value)
        {
            return Err(DispatchError::InvalidArgument {
                command: spec.name.clone(),
                argument: arg.name.clone(),
                expected: arg.arg_type,
                value: value.clone(),
            });
        }
    }

    Ok(bound)
}

fn ensure_declared(spec: &CommandSpec, name: &str) -> Result<(), DispatchError> {
    if spec.arg(name).is_some() {
        Ok(())
    } else {
        Err(DispatchError::UnknownArgument {
            command: spec.name.clone(),
            argument: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::parse_invocation;
    use crate::spec::{ArgSpec, ArgType};
    use pretty_assertions::assert_eq;

    fn refactor() -> CommandSpec {
        CommandSpec::new("refactor", "Refactor: {{target}}")
            .with_arg(ArgSpec::required("target"))
            .with_arg(ArgSpec::optional("goal"))
            .with_arg(
                ArgSpec::optional("passes")
                    .with_type(ArgType::Number)
                    .with_default("2"),
            )
    }

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_applies_defaults_in_declaration_order() {
        let resolved =
            resolve(&refactor(), &map(&[("target", "main.rs")]), &HashMap::new()).unwrap();
        let pairs: Vec<(&str, &str)> = resolved
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(pairs, vec![("target", "main.rs"), ("passes", "2")]);
    }

    #[test]
    fn test_resolve_missing_required() {
        let err =
            resolve(&refactor(), &map(&[("goal", "perf")]), &HashMap::new()).unwrap_err();
        assert_eq!(
            err,
            DispatchError::MissingArgument {
                command: "refactor".to_string(),
                argument: "target".to_string(),
            }
        );
    }

    #[test]
    fn test_resolve_carries_undeclared_values() {
        let resolved = resolve(
            &refactor(),
            &map(&[("target", "a"), ("extra", "x")]),
            &HashMap::new(),
        )
        .unwrap();
        assert_eq!(resolved.get("extra").map(String::as_str), Some("x"));
    }

    #[test]
    fn test_resolve_appends_context_variables() {
        let context = map(&[
            ("workspace_root", "/work"),
            ("git_diff", "diff --git a/x b/x"),
            ("env.USER", "dev"),
        ]);
        let resolved = resolve(&refactor(), &map(&[("target", "a")]), &context).unwrap();
        let names: Vec<&str> = resolved.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            vec!["target", "passes", "env.USER", "git_diff", "workspace_root"]
        );
        assert_eq!(resolved["git_diff"], "diff --git a/x b/x");
    }

    #[test]
    fn test_arguments_shadow_context_variables() {
        let spec = CommandSpec::new("list", "{{files}}").with_arg(ArgSpec::optional("files"));
        let context = map(&[("files", "from-context")]);

        let resolved = resolve(&spec, &map(&[("files", "a.rs")]), &context).unwrap();
        assert_eq!(resolved["files"], "a.rs");

        let resolved = resolve(&spec, &HashMap::new(), &context).unwrap();
        assert_eq!(resolved["files"], "from-context");
    }

    #[test]
    fn test_unknown_context_variable_ignored() {
        let context = map(&[("target", "sneaky"), ("env.", "x"), ("password", "hunter2")]);
        let resolved = resolve(&refactor(), &map(&[("target", "a")]), &context).unwrap();
        assert_eq!(resolved["target"], "a");
        assert!(!resolved.contains_key("password"));
        assert!(!resolved.contains_key("env."));
    }

    #[test]
    fn test_is_context_variable() {
        assert!(is_context_variable("git_diff"));
        assert!(is_context_variable("files"));
        assert!(is_context_variable("workspace_root"));
        assert!(is_context_variable("env.HOME"));
        assert!(!is_context_variable("env."));
        assert!(!is_context_variable("target"));
    }

    #[test]
    fn test_bind_priority() {
        let inv = parse_invocation("/refactor 5 goal=speed").unwrap();
        let bound = bind(
            &refactor(),
            Some(&inv),
            &map(&[("target", "main.rs"), ("goal", "perf")]),
        )
        .unwrap();

        // explicit values win; the positional skips bound args and lands on `passes`
        assert_eq!(
            bound,
            map(&[("target", "main.rs"), ("goal", "perf"), ("passes", "5")])
        );
    }

    #[test]
    fn test_bind_rejects_bad_type_from_positional() {
        let inv = parse_invocation("/refactor main.rs perf many").unwrap();
        let err = bind(&refactor(), Some(&inv), &HashMap::new()).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::InvalidArgument { ref argument, expected: ArgType::Number, .. }
                if argument == "passes"
        ));
    }

    #[test]
    fn test_bind_positional_in_order() {
        let inv = parse_invocation("/refactor main.rs perf 3 surplus").unwrap();
        let bound = bind(&refactor(), Some(&inv), &HashMap::new()).unwrap();
        assert_eq!(bound, map(&[("target", "main.rs"), ("goal", "perf"), ("passes", "3")]));
    }

    #[test]
    fn test_bind_unknown_argument() {
        let err = bind(&refactor(), None, &map(&[("colour", "red")])).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownArgument { .. }));

        let inv = parse_invocation("/refactor colour=red").unwrap();
        let err = bind(&refactor(), Some(&inv), &HashMap::new()).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownArgument { .. }));
    }
}
