//! Command dispatch and execution handlers.

use std::collections::HashMap;
use std::io::Write;

use anyhow::{Context, Result, bail};
use relay_commands::{
    CommandLoader, CommandRegistry, CommandSpec, CommandWatcher, DispatchRequest, DispatchResult,
    Dispatcher, RegistryHandle, Resolution, router,
};
use relay_policy::{PermissionDecision, authorize};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::args::*;
use crate::config::RelayConfig;
use crate::context::{self, ContextOptions};

/// Dispatch a CLI command to its handler.
pub async fn dispatch_command(cli: Cli, config: RelayConfig) -> Result<()> {
    let include_builtins = config.include_builtins && !cli.no_builtins;
    let loader = config.loader();
    debug!(dirs = ?loader.search_dirs(), include_builtins, "loading commands");

    let registry = load_registry(&loader, include_builtins).await;

    match cli.command {
        Commands::List(args) => list(&registry, &args, &mut std::io::stdout().lock()),
        Commands::Show(args) => show(&registry, &args, &mut std::io::stdout().lock()),
        Commands::Route(args) => route(&registry, &args, &mut std::io::stdout().lock()),
        Commands::Check(args) => check(&registry, &args, &mut std::io::stdout().lock()),
        Commands::Dispatch(args) => {
            let options = context_options(&config)?.with_files(args.files.clone());
            let context = context::gather(&options).await;
            dispatch(registry, &args, context, &mut std::io::stdout().lock())
        }
        Commands::Repl(args) => {
            let options = context_options(&config)?;
            let watch = args.watch || config.watch;
            repl(registry, loader, include_builtins, watch, options).await
        }
    }
}

fn context_options(config: &RelayConfig) -> Result<ContextOptions> {
    let workspace_root =
        std::env::current_dir().context("Failed to read the working directory")?;
    Ok(ContextOptions::from_config(config, workspace_root))
}

async fn load_registry(loader: &CommandLoader, include_builtins: bool) -> CommandRegistry {
    let (registry, failures) = loader.load_registry(include_builtins).await;
    for failure in &failures {
        warn!("Skipping command document {failure}");
    }
    registry
}

fn list(registry: &CommandRegistry, args: &ListArgs, out: &mut impl Write) -> Result<()> {
    let specs = match &args.category {
        Some(category) => registry.by_category(category),
        None => registry.list(),
    };

    if args.json {
        let summaries: Vec<_> = specs.iter().map(|spec| command_summary(spec)).collect();
        writeln!(out, "{}", serde_json::to_string_pretty(&summaries)?)?;
        return Ok(());
    }

    if specs.is_empty() {
        writeln!(out, "No commands found.")?;
        return Ok(());
    }

    let width = specs.iter().map(|s| s.name.len()).max().unwrap_or(0);
    for spec in specs {
        let kind = if spec.is_agent { "agent" } else { "command" };
        writeln!(
            out,
            "{:<width$}  {:<8} {:<10} {}",
            spec.name, kind, spec.category, spec.description
        )?;
    }
    Ok(())
}

fn show(registry: &CommandRegistry, args: &ShowArgs, out: &mut impl Write) -> Result<()> {
    let spec = lookup(registry, &args.name)?;

    writeln!(out, "name:        {}", spec.name)?;
    writeln!(out, "description: {}", spec.description)?;
    writeln!(out, "category:    {}", spec.category)?;
    if let Some(agent_id) = &spec.agent_id {
        writeln!(out, "agent:       {agent_id}")?;
    }
    if !spec.aliases.is_empty() {
        writeln!(out, "aliases:     {}", spec.aliases.join(", "))?;
    }
    if !spec.activation_hints.is_empty() {
        writeln!(out, "hints:       {}", spec.activation_hints.join(", "))?;
    }
    writeln!(out, "source:      {}", spec.source)?;

    let p = &spec.permissions;
    writeln!(
        out,
        "permissions: read={} write={} execute={}",
        p.read_files, p.write_files, p.execute_shell
    )?;
    for rule in &spec.path_rules {
        writeln!(out, "  {} {}", rule.effect, rule.pattern.as_str())?;
    }

    if !spec.args.is_empty() {
        writeln!(out, "args:")?;
        for arg in &spec.args {
            let mut line = format!("  {} ({})", arg.name, arg.arg_type);
            if arg.required {
                line.push_str(" required");
            }
            if let Some(default) = &arg.default {
                line.push_str(&format!(" default={default}"));
            }
            if !arg.description.is_empty() {
                line.push_str(&format!(" - {}", arg.description));
            }
            writeln!(out, "{line}")?;
        }
    }

    let placeholders = spec.placeholders();
    if !placeholders.is_empty() {
        writeln!(out, "placeholders: {}", placeholders.join(", "))?;
    }
    Ok(())
}

fn route(registry: &CommandRegistry, args: &RouteArgs, out: &mut impl Write) -> Result<()> {
    let input = join_input(&args.input);
    let mut matches = router::rank(&input, registry);
    if matches.is_empty() {
        bail!("No command matches: {input}");
    }
    if !args.all {
        matches.truncate(1);
    }

    if args.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&matches)?)?;
    } else {
        for m in &matches {
            writeln!(out, "{}\tscore={}", m.name(), m.score)?;
        }
    }
    Ok(())
}

fn check(registry: &CommandRegistry, args: &CheckArgs, out: &mut impl Write) -> Result<()> {
    let spec = lookup(registry, &args.command)?;
    let decision = authorize(spec, args.operation, args.path.as_deref());
    writeln!(out, "{}", describe_decision(&decision))?;

    if !decision.allowed {
        bail!("{} denied for '{}'", args.operation, spec.name);
    }
    Ok(())
}

fn dispatch(
    registry: CommandRegistry,
    args: &DispatchArgs,
    context: HashMap<String, String>,
    out: &mut impl Write,
) -> Result<()> {
    let dispatcher = Dispatcher::from_registry(registry);
    let result = dispatcher.dispatch(&build_request(args, context))?;

    if args.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
    } else {
        print_result(&result, out)?;
    }
    Ok(())
}

async fn repl(
    registry: CommandRegistry,
    loader: CommandLoader,
    include_builtins: bool,
    watch: bool,
    options: ContextOptions,
) -> Result<()> {
    let handle = RegistryHandle::new(registry);
    let dispatcher = Dispatcher::new(handle.clone());

    let mut watcher = None;
    if watch {
        let (tx, mut rx) = mpsc::channel(8);
        let mut w = CommandWatcher::new(handle, loader, include_builtins).with_events(tx);
        w.start().context("Failed to start command watcher")?;
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                eprintln!("[reloaded: {} commands]", event.count);
                for failure in event.failures {
                    eprintln!("  skipped {failure}");
                }
            }
        });
        watcher = Some(w);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut total = 0usize;
    let mut failed = 0usize;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        total += 1;
        let mut request = DispatchRequest::new(line);
        request.context = context::gather(&options).await;
        match dispatcher.dispatch(&request) {
            Ok(result) => {
                let mut out = std::io::stdout().lock();
                print_result(&result, &mut out)?;
                writeln!(out)?;
            }
            Err(e) => {
                failed += 1;
                eprintln!("error: {e}");
            }
        }
    }

    if let Some(mut w) = watcher {
        w.stop();
    }
    info!(total, failed, "repl finished");

    if failed > 0 {
        bail!("{failed} of {total} dispatches failed");
    }
    Ok(())
}

fn lookup<'a>(registry: &'a CommandRegistry, name: &str) -> Result<&'a CommandSpec> {
    let name = name.trim_start_matches('/');
    match registry.get(name) {
        Some(spec) => Ok(spec),
        None => bail!("Unknown command: {name}"),
    }
}

fn build_request(args: &DispatchArgs, context: HashMap<String, String>) -> DispatchRequest {
    let mut request = DispatchRequest::new(join_input(&args.input));
    request.context = context;
    for (key, value) in &args.args {
        request = request.with_arg(key.clone(), value.clone());
    }
    for intent in &args.intents {
        request = request.with_intent(intent.clone());
    }
    request
}

fn join_input(parts: &[String]) -> String {
    parts.join(" ")
}

fn command_summary(spec: &CommandSpec) -> serde_json::Value {
    json!({
        "name": spec.name,
        "description": spec.description,
        "category": spec.category,
        "agent_id": spec.agent_id,
        "aliases": spec.aliases,
        "source": spec.source.to_string(),
    })
}

fn describe_decision(decision: &PermissionDecision) -> String {
    let verdict = if decision.allowed { "allow" } else { "deny" };
    match &decision.matched_rule {
        Some(rule) => format!("{verdict}: {} [{rule}]", decision.reason),
        None => format!("{verdict}: {}", decision.reason),
    }
}

fn print_result(result: &DispatchResult, out: &mut impl Write) -> Result<()> {
    let via = match result.resolution {
        Resolution::ByName => "name".to_string(),
        Resolution::ByAlias => "alias".to_string(),
        Resolution::Routed { score } => format!("router, score {score}"),
    };
    match &result.agent_id {
        Some(agent) => debug!(command = %result.spec_name, %agent, %via, "dispatched"),
        None => debug!(command = %result.spec_name, %via, "dispatched"),
    }
    writeln!(out, "{}", result.rendered_text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use relay_commands::ArgSpec;
    use relay_policy::{Capabilities, Intent, PathRule};

    fn registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        registry
            .register(
                CommandSpec::new("docs", "Document {{target}}")
                    .with_description("Write documentation")
                    .with_category("writing")
                    .with_hints(["document", "docs"])
                    .with_aliases(["doc"])
                    .with_permissions(Capabilities::read_only())
                    .with_rule(PathRule::deny("**/.env").unwrap())
                    .with_arg(ArgSpec::required("target")),
            )
            .unwrap();
        registry
            .register(
                CommandSpec::new("fix", "Fix it")
                    .with_category("code")
                    .as_agent("fixer")
                    .with_hints(["fix"]),
            )
            .unwrap();
        registry
    }

    fn parse(args: &[&str]) -> Commands {
        let mut argv = vec!["relay"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().command
    }

    fn output(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> (Result<()>, String) {
        let mut buf = Vec::new();
        let result = f(&mut buf);
        (result, String::from_utf8(buf).unwrap())
    }

    #[test]
    fn test_list_by_category() {
        let Commands::List(args) = parse(&["list", "--category", "CODE"]) else {
            unreachable!()
        };
        let (result, text) = output(|out| list(&registry(), &args, out));
        result.unwrap();
        assert!(text.contains("fix"));
        assert!(text.contains("agent"));
        assert!(!text.contains("docs"));
    }

    #[test]
    fn test_list_json() {
        let Commands::List(args) = parse(&["list", "--json"]) else {
            unreachable!()
        };
        let (result, text) = output(|out| list(&registry(), &args, out));
        result.unwrap();

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value[0]["name"], "docs");
        assert_eq!(value[0]["aliases"][0], "doc");
        assert_eq!(value[1]["agent_id"], "fixer");
        assert_eq!(value[1]["source"], "builtin");
    }

    #[test]
    fn test_show_by_alias() {
        let Commands::Show(args) = parse(&["show", "/doc"]) else {
            unreachable!()
        };
        let (result, text) = output(|out| show(&registry(), &args, out));
        result.unwrap();
        assert!(text.contains("name:        docs"));
        assert!(text.contains("target (string) required"));
        assert!(text.contains("placeholders: target"));
    }

    #[test]
    fn test_route_all() {
        let Commands::Route(args) = parse(&["route", "--all", "fix", "the", "docs"]) else {
            unreachable!()
        };
        let (result, text) = output(|out| route(&registry(), &args, out));
        result.unwrap();
        assert_eq!(text, "docs\tscore=4\nfix\tscore=3\n");
    }

    #[test]
    fn test_route_no_match() {
        let Commands::Route(args) = parse(&["route", "bake", "bread"]) else {
            unreachable!()
        };
        let (result, _) = output(|out| route(&registry(), &args, out));
        assert!(result.is_err());
    }

    #[test]
    fn test_check_allow_and_deny() {
        let Commands::Check(args) = parse(&["check", "docs", "read", "src/lib.rs"]) else {
            unreachable!()
        };
        let (result, text) = output(|out| check(&registry(), &args, out));
        result.unwrap();
        assert!(text.starts_with("allow"));

        let Commands::Check(args) = parse(&["check", "docs", "read", "app/.env"]) else {
            unreachable!()
        };
        let (result, text) = output(|out| check(&registry(), &args, out));
        assert!(result.is_err());
        assert!(text.starts_with("deny"));
        assert!(text.contains("[**/.env]"));

        let Commands::Check(args) = parse(&["check", "docs", "write", "README.md"]) else {
            unreachable!()
        };
        let (result, text) = output(|out| check(&registry(), &args, out));
        assert!(result.is_err());
        assert_eq!(text, "deny: capability disabled\n");
    }

    #[test]
    fn test_dispatch_text_and_json() {
        let Commands::Dispatch(args) = parse(&["dispatch", "/docs", "README.md"]) else {
            unreachable!()
        };
        let (result, text) = output(|out| dispatch(registry(), &args, HashMap::new(), out));
        result.unwrap();
        assert_eq!(text, "Document README.md\n");

        let Commands::Dispatch(args) = parse(&[
            "dispatch",
            "please",
            "document",
            "this",
            "--arg",
            "target=lib.rs",
            "--json",
        ]) else {
            unreachable!()
        };
        let (result, text) = output(|out| dispatch(registry(), &args, HashMap::new(), out));
        result.unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["spec_name"], "docs");
        assert_eq!(value["rendered_text"], "Document lib.rs");
        assert_eq!(value["resolution"]["kind"], "routed");
    }

    #[test]
    fn test_dispatch_denied_is_error() {
        let Commands::Dispatch(args) = parse(&[
            "dispatch",
            "/docs",
            "x",
            "--intent",
            "read:config/.env",
        ]) else {
            unreachable!()
        };
        let (result, text) = output(|out| dispatch(registry(), &args, HashMap::new(), out));
        assert!(result.is_err());
        assert!(text.is_empty());
    }

    #[test]
    fn test_build_request() {
        let Commands::Dispatch(args) = parse(&[
            "dispatch", "/docs", "a", "-a", "target=b", "-i", "execute",
        ]) else {
            unreachable!()
        };
        let context = HashMap::from([("workspace_root".to_string(), "/work".to_string())]);
        let request = build_request(&args, context.clone());
        assert_eq!(request.raw_input, "/docs a");
        assert_eq!(request.bound_args.get("target").map(String::as_str), Some("b"));
        assert_eq!(request.intents, vec![Intent::execute()]);
        assert_eq!(request.context, context);
    }

    #[test]
    fn test_dispatch_renders_context() {
        let mut registry = registry();
        registry
            .register(CommandSpec::new(
                "status",
                "In {{workspace_root}}:\n{{files}}\n{{#if git_diff}}{{git_diff}}{{else}}clean{{/if}}",
            ))
            .unwrap();
        let Commands::Dispatch(args) =
            parse(&["dispatch", "/status", "-f", "a.rs", "-f", "b.rs"])
        else {
            unreachable!()
        };
        let context = HashMap::from([
            ("workspace_root".to_string(), "/work".to_string()),
            ("files".to_string(), "a.rs\nb.rs".to_string()),
        ]);

        let (result, text) = output(|out| dispatch(registry, &args, context, out));
        result.unwrap();
        assert_eq!(text, "In /work:\na.rs\nb.rs\nclean\n");
    }
}
