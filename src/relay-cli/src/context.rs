//! Template context gathering.
//!
//! Collects the context variables a dispatched template may reference:
//! `workspace_root`, `files`, `git_diff` and the allowlisted `env.<NAME>`
//! values.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use relay_commands::{ENV_VAR_PREFIX, FILES_VAR, GIT_DIFF_VAR, WORKSPACE_ROOT_VAR};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::RelayConfig;

/// What to gather for one dispatch.
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    pub workspace_root: PathBuf,
    pub files: Vec<PathBuf>,
    pub include_git_diff: bool,
    pub env_allowlist: Vec<String>,
}

impl ContextOptions {
    pub fn from_config(config: &RelayConfig, workspace_root: PathBuf) -> Self {
        Self {
            workspace_root,
            files: Vec::new(),
            include_git_diff: config.git_diff,
            env_allowlist: config.env_allowlist.clone(),
        }
    }

    #[must_use]
    pub fn with_files(mut self, files: Vec<PathBuf>) -> Self {
        self.files = files;
        self
    }
}

/// Gather the context variables described by `options`.
///
/// A missing git binary or a directory outside a repository leaves
/// `git_diff` unset; other git failures are logged and skipped.
pub async fn gather(options: &ContextOptions) -> HashMap<String, String> {
    let mut context = HashMap::new();
    context.insert(
        WORKSPACE_ROOT_VAR.to_string(),
        options.workspace_root.display().to_string(),
    );

    if !options.files.is_empty() {
        let files: Vec<String> = options
            .files
            .iter()
            .map(|file| file.display().to_string())
            .collect();
        context.insert(FILES_VAR.to_string(), files.join("\n"));
    }

    if options.include_git_diff {
        match git_diff(&options.workspace_root).await {
            Ok(Some(diff)) if !diff.is_empty() => {
                context.insert(GIT_DIFF_VAR.to_string(), diff);
            }
            Ok(Some(_)) => debug!("Working tree has no changes"),
            Ok(None) => debug!("Not inside a git repository"),
            Err(e) => warn!("Failed to read git diff: {}", e),
        }
    }

    context.extend(allowed_env(&options.env_allowlist, |name| std::env::var(name).ok()));
    context
}

/// `env.<NAME>` entries for every allowlisted variable that `lookup` finds.
pub fn allowed_env(
    allowlist: &[String],
    lookup: impl Fn(&str) -> Option<String>,
) -> HashMap<String, String> {
    allowlist
        .iter()
        .filter_map(|name| {
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            lookup(name).map(|value| (format!("{ENV_VAR_PREFIX}{name}"), value))
        })
        .collect()
}

/// Tracked changes in `dir`, or `None` outside a git repository.
pub async fn git_diff(dir: &Path) -> io::Result<Option<String>> {
    if !is_git_repo(dir).await? {
        return Ok(None);
    }
    run_git_diff(dir, &["diff"]).await.map(Some)
}

async fn is_git_repo(dir: &Path) -> io::Result<bool> {
    let status = Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(s) => Ok(s.success()),
        // git not installed
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

async fn run_git_diff(dir: &Path, args: &[&str]) -> io::Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await?;

    // 1 means differences were found
    if output.status.success() || output.status.code() == Some(1) {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(io::Error::other(format!(
            "git {:?} failed with status {}",
            args, output.status
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_allowed_env_filters_and_prefixes() {
        let allowlist = vec!["USER".to_string(), " LANG ".to_string(), String::new()];
        let env = allowed_env(&allowlist, |name| match name {
            "USER" => Some("dev".to_string()),
            "SECRET" => Some("nope".to_string()),
            _ => None,
        });
        assert_eq!(
            env,
            HashMap::from([("env.USER".to_string(), "dev".to_string())])
        );
    }

    #[tokio::test]
    async fn test_gather_without_git() {
        let temp = TempDir::new().unwrap();
        let options = ContextOptions {
            workspace_root: temp.path().to_path_buf(),
            files: vec![PathBuf::from("src/lib.rs"), PathBuf::from("README.md")],
            include_git_diff: false,
            env_allowlist: Vec::new(),
        };

        let context = gather(&options).await;
        assert_eq!(
            context.get(WORKSPACE_ROOT_VAR),
            Some(&temp.path().display().to_string())
        );
        assert_eq!(
            context.get(FILES_VAR).map(String::as_str),
            Some("src/lib.rs\nREADME.md")
        );
        assert!(!context.contains_key(GIT_DIFF_VAR));
    }

    #[tokio::test]
    async fn test_git_diff_outside_repository() {
        let temp = TempDir::new().unwrap();
        // Ok(None) when git is missing or the temp dir is not a work tree
        let diff = git_diff(temp.path()).await.unwrap();
        assert_eq!(diff, None);
    }
}
