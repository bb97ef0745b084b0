//! Watches the model source so a running server can pick up model edits.

use crate::error::StartupError;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

const SETTLE: Duration = Duration::from_millis(200);

/// File system watcher over a model file or model directory.
/// Dropping it stops event delivery.
pub struct ModelWatcher {
    _watcher: RecommendedWatcher,
    events: UnboundedReceiver<notify::Result<notify::Event>>,
    source: PathBuf,
    is_dir: bool,
}

impl ModelWatcher {
    pub fn start(source: &Path) -> Result<Self, StartupError> {
        let watch_err = |e: notify::Error| StartupError::Watch {
            path: source.display().to_string(),
            source: e,
        };
        let (tx, events) = unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .map_err(watch_err)?;

        let is_dir = source.is_dir();
        let (root, mode) = if is_dir {
            (source.to_path_buf(), RecursiveMode::Recursive)
        } else {
            let parent = source
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            (parent.to_path_buf(), RecursiveMode::NonRecursive)
        };
        watcher.watch(&root, mode).map_err(watch_err)?;
        tracing::info!(path = %source.display(), "watching model source");

        Ok(ModelWatcher {
            _watcher: watcher,
            events,
            source: source.to_path_buf(),
            is_dir,
        })
    }

    /// Resolves once the model source has changed and the burst of events has settled.
    pub async fn changed(&mut self) {
        loop {
            match self.events.recv().await {
                Some(Ok(event)) if self.is_relevant(&event) => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => tracing::warn!(error = %e, "watch error"),
                None => return std::future::pending().await,
            }
        }
        tokio::time::sleep(SETTLE).await;
        while self.events.try_recv().is_ok() {}
    }

    fn is_relevant(&self, event: &notify::Event) -> bool {
        if matches!(event.kind, EventKind::Access(_)) {
            return false;
        }
        self.is_dir || event.paths.iter().any(|p| same_file(p, &self.source))
    }
}

fn same_file(event_path: &Path, source: &Path) -> bool {
    if event_path == source {
        return true;
    }
    event_path.file_name().is_some() && event_path.file_name() == source.file_name()
}
