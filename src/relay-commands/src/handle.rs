//! Shared, atomically swappable registry snapshots.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::loader::CommandLoader;
use crate::registry::CommandRegistry;

/// Summary of a registry rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadEvent {
    /// Commands in the published registry.
    pub count: usize,
    /// One line per rejected document.
    pub failures: Vec<String>,
}

/// Cheaply cloneable handle to the current registry.
///
/// Readers take a snapshot and keep using it for as long as they like; a
/// reload builds a fresh registry off to the side and publishes it with a
/// single pointer swap, so in-flight dispatches never observe a partial
/// registry.
#[derive(Debug, Clone, Default)]
pub struct RegistryHandle {
    current: Arc<RwLock<Arc<CommandRegistry>>>,
}

impl RegistryHandle {
    pub fn new(registry: CommandRegistry) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(registry))),
        }
    }

    /// The registry as of now.
    pub fn snapshot(&self) -> Arc<CommandRegistry> {
        Arc::clone(&*self.current.read())
    }

    /// Replace the current registry, returning the previous one.
    pub fn publish(&self, registry: CommandRegistry) -> Arc<CommandRegistry> {
        let next = Arc::new(registry);
        std::mem::replace(&mut *self.current.write(), next)
    }

    /// Rebuild from `loader` and publish the result.
    pub async fn reload(&self, loader: &CommandLoader, include_builtins: bool) -> ReloadEvent {
        let (registry, failures) = loader.load_registry(include_builtins).await;
        let failures: Vec<String> = failures.iter().map(ToString::to_string).collect();
        for failure in &failures {
            warn!("Rejected command document: {failure}");
        }

        let count = registry.len();
        self.publish(registry);
        info!(commands = count, "command registry reloaded");

        ReloadEvent { count, failures }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::CommandSpec;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn registry_with(names: &[&str]) -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        registry.extend(names.iter().map(|n| CommandSpec::new(*n, "t")));
        registry
    }

    #[test]
    fn test_snapshot_survives_publish() {
        let handle = RegistryHandle::new(registry_with(&["a"]));
        let before = handle.snapshot();

        let previous = handle.publish(registry_with(&["a", "b"]));

        assert_eq!(before.names(), vec!["a"]);
        assert!(Arc::ptr_eq(&before, &previous));
        assert_eq!(handle.snapshot().names(), vec!["a", "b"]);
    }

    #[test]
    fn test_clones_share_state() {
        let handle = RegistryHandle::default();
        let other = handle.clone();
        other.publish(registry_with(&["x"]));
        assert_eq!(handle.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_reload_reports_counts_and_failures() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("ok.md"),
            "---\nname: ok\ndescription: d\ncategory: c\nagent: false\n---\nbody",
        )
        .unwrap();
        std::fs::write(temp.path().join("bad.md"), "no frontmatter").unwrap();

        let handle = RegistryHandle::default();
        let loader = CommandLoader::with_dirs([temp.path().to_path_buf()]);
        let event = handle.reload(&loader, false).await;

        assert_eq!(event.count, 1);
        assert_eq!(event.failures.len(), 1);
        assert!(event.failures[0].contains("bad.md"));
        assert!(handle.snapshot().contains("ok"));
    }
}
