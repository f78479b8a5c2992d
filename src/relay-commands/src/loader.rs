//! Command loader for reading definition documents from the filesystem.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::registry::CommandRegistry;
use crate::spec::{CommandSpec, SpecError, SpecSource};

/// Project-local command directory, relative to the working directory.
pub const PROJECT_COMMAND_DIR: &str = ".relay/commands";

/// Errors that can occur when loading commands.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// IO error reading files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not a valid command definition.
    #[error("Invalid spec: {0}")]
    InvalidSpec(#[from] SpecError),
}

/// A document that was rejected during loading.
#[derive(Debug)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: LoaderError,
}

impl std::fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}

/// Outcome of a load: accepted specs in precedence order plus rejected
/// documents.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub specs: Vec<CommandSpec>,
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    /// Fold another report in. Specs whose names were already accepted are
    /// skipped.
    fn absorb(&mut self, other: LoadReport, seen: &mut HashSet<String>) {
        for spec in other.specs {
            if seen.insert(spec.name.clone()) {
                self.specs.push(spec);
            } else {
                debug!(
                    "Skipping duplicate command '{}' from {}",
                    spec.name, spec.source
                );
            }
        }
        self.failures.extend(other.failures);
    }

    /// Build a registry from the accepted specs, on top of the built-ins
    /// when `include_builtins` is set. User specs replace built-ins with the
    /// same name.
    pub fn into_registry(self, include_builtins: bool) -> (CommandRegistry, Vec<LoadFailure>) {
        let mut registry = if include_builtins {
            CommandRegistry::with_builtins()
        } else {
            CommandRegistry::new()
        };
        registry.extend(self.specs);
        info!(
            commands = registry.len(),
            failures = self.failures.len(),
            "command registry built"
        );
        (registry, self.failures)
    }
}

/// Loader for command definition documents.
#[derive(Debug, Clone)]
pub struct CommandLoader {
    /// Search directories in order of priority.
    search_dirs: Vec<PathBuf>,
}

impl Default for CommandLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandLoader {
    /// Create a new loader with default search paths.
    ///
    /// Default paths:
    /// 1. `.relay/commands/` (project-local)
    /// 2. `<config_dir>/relay/commands/` (global)
    pub fn new() -> Self {
        Self {
            search_dirs: sync::default_search_dirs(),
        }
    }

    /// Create a loader with custom search directories.
    pub fn with_dirs(dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            search_dirs: dirs.into_iter().collect(),
        }
    }

    /// Get the search directories.
    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// Load every document from every search directory.
    ///
    /// Commands from earlier directories take precedence over later ones.
    /// Missing directories are skipped.
    pub async fn load_all(&self) -> LoadReport {
        let mut report = LoadReport::default();
        let mut seen = HashSet::new();

        for dir in &self.search_dirs {
            match self.load_from_directory(dir).await {
                Ok(dir_report) => report.absorb(dir_report, &mut seen),
                Err(LoaderError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("Command directory {:?} does not exist, skipping", dir);
                }
                Err(error) => {
                    warn!("Error loading commands from {:?}: {}", dir, error);
                    report.failures.push(LoadFailure {
                        path: dir.clone(),
                        error,
                    });
                }
            }
        }

        report
    }

    /// Load and build a registry in one step.
    pub async fn load_registry(&self, include_builtins: bool) -> (CommandRegistry, Vec<LoadFailure>) {
        self.load_all().await.into_registry(include_builtins)
    }

    /// Load every `.md` document in a directory, in file-name order.
    pub async fn load_from_directory(&self, dir: &Path) -> Result<LoadReport, LoaderError> {
        let mut paths = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if is_command_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut report = LoadReport::default();
        let mut seen = HashSet::new();
        for path in paths {
            match self.load_from_file(&path).await {
                Ok(spec) if seen.insert(spec.name.clone()) => {
                    debug!("Loaded command '{}' from {:?}", spec.name, path);
                    report.specs.push(spec);
                }
                Ok(spec) => {
                    debug!("Skipping duplicate command '{}' from {:?}", spec.name, path);
                }
                Err(error) => {
                    warn!("Failed to load command from {:?}: {}", path, error);
                    report.failures.push(LoadFailure { path, error });
                }
            }
        }

        Ok(report)
    }

    /// Load a single document.
    pub async fn load_from_file(&self, path: &Path) -> Result<CommandSpec, LoaderError> {
        let content = fs::read_to_string(path).await?;
        Ok(CommandSpec::parse(
            &content,
            SpecSource::File(path.to_path_buf()),
        )?)
    }
}

/// Whether `path` names a command definition document.
pub fn is_command_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "md")
}

/// Synchronous version of the loader for contexts where async is not available.
pub mod sync {
    use std::collections::HashSet;
    use std::fs;
    use std::path::{Path, PathBuf};

    use super::{LoadFailure, LoadReport, LoaderError, PROJECT_COMMAND_DIR, is_command_file};
    use crate::spec::{CommandSpec, SpecSource};

    /// Load every document from a directory. A missing directory yields an
    /// empty report.
    pub fn load_from_directory(dir: &Path) -> Result<LoadReport, LoaderError> {
        let mut report = LoadReport::default();

        if !dir.exists() {
            return Ok(report);
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if is_command_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut seen = HashSet::new();
        for path in paths {
            match load_from_file(&path) {
                Ok(spec) if seen.insert(spec.name.clone()) => report.specs.push(spec),
                Ok(spec) => {
                    tracing::debug!("Skipping duplicate command '{}' from {:?}", spec.name, path);
                }
                Err(error) => {
                    tracing::warn!("Failed to load command from {:?}: {}", path, error);
                    report.failures.push(LoadFailure { path, error });
                }
            }
        }

        Ok(report)
    }

    /// Load a single document synchronously.
    pub fn load_from_file(path: &Path) -> Result<CommandSpec, LoaderError> {
        let content = fs::read_to_string(path)?;
        Ok(CommandSpec::parse(
            &content,
            SpecSource::File(path.to_path_buf()),
        )?)
    }

    /// Get default search directories.
    pub fn default_search_dirs() -> Vec<PathBuf> {
        let mut dirs = vec![PathBuf::from(PROJECT_COMMAND_DIR)];

        if let Some(config_dir) = dirs::config_dir() {
            dirs.push(config_dir.join("relay").join("commands"));
        }

        dirs
    }

    /// Load every document from `dirs`, earlier directories first.
    pub fn load_all(dirs: &[PathBuf]) -> LoadReport {
        let mut report = LoadReport::default();
        let mut seen = HashSet::new();

        for dir in dirs {
            match load_from_directory(dir) {
                Ok(dir_report) => report.absorb(dir_report, &mut seen),
                Err(error) => report.failures.push(LoadFailure {
                    path: dir.clone(),
                    error,
                }),
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn document(name: &str, description: &str) -> String {
        format!(
            "---\nname: {name}\ndescription: {description}\ncategory: test\nagent: false\n---\nTemplate for {name}"
        )
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("whatever.md");
        std::fs::write(&file_path, document("greet", "A test command")).unwrap();

        let loader = CommandLoader::new();
        let spec = loader.load_from_file(&file_path).await.unwrap();

        // the name comes from the frontmatter, not the filename
        assert_eq!(spec.name, "greet");
        assert_eq!(spec.description, "A test command");
        assert_eq!(spec.source, SpecSource::File(file_path));
    }

    #[tokio::test]
    async fn test_load_from_directory_reports_failures() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("cmd1.md"), document("cmd1", "Cmd 1")).unwrap();
        std::fs::write(temp.path().join("cmd2.md"), document("cmd2", "Cmd 2")).unwrap();
        std::fs::write(temp.path().join("broken.md"), "---\nname: broken\n---\nx").unwrap();
        std::fs::write(temp.path().join("not-a-command.txt"), "ignored").unwrap();

        let loader = CommandLoader::new();
        let report = loader.load_from_directory(temp.path()).await.unwrap();

        let names: Vec<_> = report.specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["cmd1", "cmd2"]);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].path.ends_with("broken.md"));
        assert!(matches!(
            report.failures[0].error,
            LoaderError::InvalidSpec(SpecError::MissingField("description"))
        ));
    }

    #[tokio::test]
    async fn test_command_precedence() {
        let temp1 = TempDir::new().unwrap();
        let temp2 = TempDir::new().unwrap();
        std::fs::write(temp1.path().join("dupe.md"), document("dupe", "First")).unwrap();
        std::fs::write(temp2.path().join("dupe.md"), document("dupe", "Second")).unwrap();

        let loader =
            CommandLoader::with_dirs([temp1.path().to_path_buf(), temp2.path().to_path_buf()]);
        let report = loader.load_all().await;

        assert_eq!(report.specs.len(), 1);
        assert_eq!(report.specs[0].description, "First");
    }

    #[tokio::test]
    async fn test_missing_directory_is_skipped() {
        let temp = TempDir::new().unwrap();
        let loader = CommandLoader::with_dirs([temp.path().join("does-not-exist")]);
        let report = loader.load_all().await;
        assert!(report.specs.is_empty());
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_user_spec_replaces_builtin() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("review.md"), document("review", "Team review")).unwrap();

        let loader = CommandLoader::with_dirs([temp.path().to_path_buf()]);
        let (registry, failures) = loader.load_registry(true).await;

        assert!(failures.is_empty());
        assert_eq!(registry.get("review").unwrap().description, "Team review");
        assert_eq!(registry.position("review"), Some(1));
    }

    #[test]
    fn test_sync_load() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("sync-cmd.md"), document("sync-cmd", "Sync")).unwrap();

        let report = sync::load_all(&[temp.path().to_path_buf(), temp.path().join("missing")]);

        assert_eq!(report.specs.len(), 1);
        assert_eq!(report.specs[0].name, "sync-cmd");
        assert!(report.failures.is_empty());
    }
}
