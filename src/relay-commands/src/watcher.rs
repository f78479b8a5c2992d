//! File system watcher for hot reloading command documents.
//!
//! Any create, modify or remove of a `.md` file in a search directory
//! triggers a debounced rebuild of the whole registry, which is then
//! published through the [`RegistryHandle`].

use std::path::PathBuf;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::handle::{RegistryHandle, ReloadEvent};
use crate::loader::{CommandLoader, is_command_file};

/// Quiet period after the last relevant event before reloading.
pub const DEBOUNCE: Duration = Duration::from_millis(300);

/// Errors raised while starting the watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),
}

/// Watches command directories and republishes the registry on change.
pub struct CommandWatcher {
    handle: RegistryHandle,
    loader: CommandLoader,
    include_builtins: bool,
    /// Receives a summary after every reload.
    event_tx: Option<mpsc::Sender<ReloadEvent>>,
    watcher: Option<RecommendedWatcher>,
    task: Option<JoinHandle<()>>,
    watched_dirs: Vec<PathBuf>,
}

impl CommandWatcher {
    pub fn new(handle: RegistryHandle, loader: CommandLoader, include_builtins: bool) -> Self {
        Self {
            handle,
            loader,
            include_builtins,
            event_tx: None,
            watcher: None,
            task: None,
            watched_dirs: Vec::new(),
        }
    }

    /// Builder: send a [`ReloadEvent`] after every reload.
    #[must_use]
    pub fn with_events(mut self, event_tx: mpsc::Sender<ReloadEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Start watching every existing search directory.
    ///
    /// Must be called from within a tokio runtime. Directories that do not
    /// exist are skipped.
    pub fn start(&mut self) -> Result<(), WatchError> {
        if self.is_active() {
            warn!("Watcher already active, restarting...");
            self.stop();
        }

        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                if notify_tx.send(result).is_err() {
                    debug!("Command watcher task has stopped; dropping event");
                }
            },
            Config::default(),
        )?;

        self.watched_dirs.clear();
        for dir in self.loader.search_dirs() {
            if dir.is_dir() {
                debug!("Watching directory: {:?}", dir);
                match watcher.watch(dir, RecursiveMode::NonRecursive) {
                    Ok(()) => self.watched_dirs.push(dir.clone()),
                    Err(e) => warn!("Failed to watch directory {:?}: {}", dir, e),
                }
            } else {
                debug!("Directory does not exist, skipping: {:?}", dir);
            }
        }

        let handle = self.handle.clone();
        let loader = self.loader.clone();
        let include_builtins = self.include_builtins;
        let event_tx = self.event_tx.clone();
        self.task = Some(tokio::spawn(async move {
            handle_events(notify_rx, handle, loader, include_builtins, event_tx).await;
        }));
        self.watcher = Some(watcher);

        info!(
            "Command watcher started for {} directories",
            self.watched_dirs.len()
        );
        Ok(())
    }

    /// Stop watching. Pending events are discarded.
    pub fn stop(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            for dir in &self.watched_dirs {
                if let Err(e) = watcher.unwatch(dir) {
                    debug!("Failed to unwatch directory {:?}: {}", dir, e);
                }
            }
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.watched_dirs.clear();
    }

    pub fn is_active(&self) -> bool {
        self.watcher.is_some()
    }

    pub fn watched_dirs(&self) -> &[PathBuf] {
        &self.watched_dirs
    }
}

impl Drop for CommandWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Whether a notify event should trigger a reload.
fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event.paths.iter().any(|p| is_command_file(p))
}

async fn handle_events(
    mut rx: mpsc::UnboundedReceiver<Result<Event, notify::Error>>,
    handle: RegistryHandle,
    loader: CommandLoader,
    include_builtins: bool,
    event_tx: Option<mpsc::Sender<ReloadEvent>>,
) {
    while let Some(first) = rx.recv().await {
        if !accept(first) {
            continue;
        }

        // Keep absorbing events until the directory has been quiet for DEBOUNCE.
        loop {
            match tokio::time::timeout(DEBOUNCE, rx.recv()).await {
                Ok(Some(next)) => {
                    accept(next);
                }
                Ok(None) => return,
                Err(_) => break,
            }
        }

        let event = handle.reload(&loader, include_builtins).await;
        if let Some(tx) = &event_tx
            && tx.send(event).await.is_err()
        {
            debug!("Reload listener dropped");
        }
    }
    debug!("Watcher channel disconnected");
}

fn accept(result: Result<Event, notify::Error>) -> bool {
    match result {
        Ok(event) => {
            let relevant = is_relevant(&event);
            if relevant {
                debug!(paths = ?event.paths, "command document changed");
            }
            relevant
        }
        Err(e) => {
            error!("Watch error: {}", e);
            false
        }
    }
}
