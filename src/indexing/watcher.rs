//! File-system reconciler keeping the index in sync with edits.
//!
//! Bridges notify's synchronous callback into an async channel, then
//! maps debounced create/modify events to a single-file re-index and
//! remove events to an index delete. Events for hidden or excluded
//! files are dropped before they reach the service.

use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use super::walker::is_excluded_file;
use crate::completion::CompletionService;

/// Errors specific to file watching.
#[derive(Error, Debug)]
pub enum FileWatchError {
    #[error(
        "Failed to initialize file watcher: {reason}\nSuggestion: Check file system permissions and inotify limits"
    )]
    InitFailed { reason: String },

    #[error(
        "Cannot watch path {path:?}: {reason}\nSuggestion: Verify the path exists and you have read permissions"
    )]
    PathWatchFailed { path: PathBuf, reason: String },
}

/// What a raw notify event means for the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reconcile {
    Reindex,
    Delete,
    Ignore,
}

fn classify(kind: &EventKind) -> Reconcile {
    match kind {
        EventKind::Create(_) | EventKind::Modify(_) => Reconcile::Reindex,
        EventKind::Remove(_) => Reconcile::Delete,
        _ => Reconcile::Ignore,
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

fn is_watchable(service: &CompletionService, path: &Path) -> bool {
    if !path.is_file() || is_hidden(path) {
        return false;
    }
    match path.file_name() {
        Some(name) => !is_excluded_file(&name.to_string_lossy(), service.config()),
        None => false,
    }
}

/// Records what an event batch means for the index: changed paths are
/// staged for a debounced re-index, removed paths delete immediately.
async fn absorb(
    service: &CompletionService,
    event: &Event,
    pending: &mut HashMap<PathBuf, Instant>,
) {
    match classify(&event.kind) {
        Reconcile::Reindex => {
            for path in &event.paths {
                if is_watchable(service, path) {
                    pending.insert(path.clone(), Instant::now());
                }
            }
        }
        Reconcile::Delete => {
            for path in &event.paths {
                pending.remove(path);
                if let Err(e) = service.delete_file(&path.display().to_string()).await {
                    warn!(path = %path.display(), "delete from index failed: {e}");
                }
            }
        }
        Reconcile::Ignore => {}
    }
}

/// Watches a workspace root and reconciles the index on changes.
pub struct WorkspaceWatcher {
    service: Arc<CompletionService>,
    root: PathBuf,
    debounce_ms: u64,
    event_rx: mpsc::Receiver<notify::Result<Event>>,
    watcher: notify::RecommendedWatcher,
}

impl WorkspaceWatcher {
    /// Creates a watcher for `root`. Nothing is watched until
    /// [`watch`](Self::watch) runs.
    pub fn new(
        service: Arc<CompletionService>,
        root: &Path,
        debounce_ms: u64,
    ) -> Result<Self, FileWatchError> {
        let (tx, rx) = mpsc::channel(256);

        // The notify callback is sync; bridge into the async loop.
        let watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            let _ = tx.blocking_send(result);
        })
        .map_err(|e| FileWatchError::InitFailed {
            reason: e.to_string(),
        })?;

        Ok(Self {
            service,
            root: root.to_path_buf(),
            debounce_ms,
            event_rx: rx,
            watcher,
        })
    }

    /// Runs the reconciliation loop until the event source closes.
    pub async fn watch(mut self) -> Result<(), FileWatchError> {
        self.watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(|e| FileWatchError::PathWatchFailed {
                path: self.root.clone(),
                reason: e.to_string(),
            })?;

        info!(
            root = %self.root.display(),
            debounce_ms = self.debounce_ms,
            "file watcher started"
        );

        let Self {
            service,
            debounce_ms,
            mut event_rx,
            watcher,
            ..
        } = self;
        // The notify watcher stops when dropped; keep it alive for the
        // whole loop.
        let _watcher = watcher;

        let debounce = Duration::from_millis(debounce_ms);
        let mut pending: HashMap<PathBuf, Instant> = HashMap::new();

        loop {
            tokio::select! {
                received = event_rx.recv() => {
                    let Some(result) = received else {
                        return Ok(());
                    };
                    match result {
                        Ok(event) => absorb(&service, &event, &mut pending).await,
                        Err(e) => warn!("file watcher event error: {e}"),
                    }
                }
                _ = sleep(Duration::from_millis(100)) => {
                    let due: Vec<PathBuf> = pending
                        .iter()
                        .filter(|(_, seen)| seen.elapsed() >= debounce)
                        .map(|(path, _)| path.clone())
                        .collect();
                    for path in due {
                        pending.remove(&path);
                        if let Err(e) = service.index_file(&path).await {
                            warn!(path = %path.display(), "re-index after change failed: {e}");
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};

    #[test]
    fn test_event_classification() {
        assert_eq!(
            classify(&EventKind::Create(CreateKind::File)),
            Reconcile::Reindex
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Any)),
            Reconcile::Reindex
        );
        assert_eq!(
            classify(&EventKind::Remove(RemoveKind::File)),
            Reconcile::Delete
        );
        assert_eq!(
            classify(&EventKind::Access(AccessKind::Any)),
            Reconcile::Ignore
        );
    }

    #[test]
    fn test_hidden_detection() {
        assert!(is_hidden(Path::new("/work/.env")));
        assert!(!is_hidden(Path::new("/work/main.rs")));
    }
}
