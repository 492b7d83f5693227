//! Debounced single-file watcher.
//!
//! Contains the [`FileWatcher`] struct that monitors one file for changes
//! using the `notify` crate and emits a coalesced signal per burst.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use wtm_common::ConfigError;

use crate::settings::SettingsStore;

/// Quiet period after the last filesystem event before a change is reported.
pub const DEBOUNCE: Duration = Duration::from_millis(500);

/// Watches a single file and sends a signal when it changes.
pub struct FileWatcher {
    path: PathBuf,
}

impl FileWatcher {
    /// Create a new watcher for `path`. The file need not exist yet.
    pub fn new(path: PathBuf) -> Result<Self, ConfigError> {
        if path.file_name().is_none() {
            return Err(ConfigError::WatchError(format!(
                "{} does not name a file",
                path.display()
            )));
        }
        if !path.exists() {
            warn!(
                "{} does not exist yet, will watch for creation",
                path.display()
            );
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Watch the file, sending `()` on `tx` after each debounced burst of changes.
    ///
    /// Runs until every sender of the internal notify channel is gone, which in
    /// practice means until the task is cancelled.
    pub async fn watch(&self, tx: broadcast::Sender<()>) -> Result<(), ConfigError> {
        let watch_dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&watch_dir).map_err(|e| {
            ConfigError::WatchError(format!("failed to create {}: {e}", watch_dir.display()))
        })?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();

        info!("starting file watcher for {}", self.path.display());

        // Bridges the sync notify callback into async
        let (notify_tx, mut notify_rx) = mpsc::channel::<()>(16);

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| match result {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        return;
                    }
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().is_some_and(|n| n == file_name));
                    if ours {
                        debug!("watched file change detected");
                        let _ = notify_tx.try_send(());
                    }
                }
                Err(e) => error!("file watcher error: {e}"),
            },
            notify::Config::default(),
        )
        .map_err(|e| ConfigError::WatchError(format!("failed to create watcher: {e}")))?;

        watcher
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .map_err(|e| {
                ConfigError::WatchError(format!("failed to watch {}: {e}", watch_dir.display()))
            })?;

        debounce_loop(&mut notify_rx, &tx).await;
        drop(watcher);
        Ok(())
    }
}

/// Coalesce raw signals: after the first one, wait until [`DEBOUNCE`] passes
/// with no further signal, then emit once.
pub(crate) async fn debounce_loop(rx: &mut mpsc::Receiver<()>, tx: &broadcast::Sender<()>) {
    loop {
        if rx.recv().await.is_none() {
            return;
        }

        loop {
            tokio::select! {
                _ = tokio::time::sleep(DEBOUNCE) => break,
                msg = rx.recv() => {
                    if msg.is_none() {
                        return;
                    }
                }
            }
        }

        debug!("watched file settled, sending change signal");
        if tx.send(()).is_err() {
            debug!("no receivers for file change signal");
        }
    }
}

/// Keep `store` in sync with edits made to its file by other processes.
///
/// Spawns the watcher and a reload task; aborting the returned handle stops both.
pub fn spawn_settings_reload(
    store: std::sync::Arc<SettingsStore>,
) -> Result<tokio::task::JoinHandle<()>, ConfigError> {
    let path = store
        .path()
        .map(Path::to_path_buf)
        .ok_or_else(|| ConfigError::WatchError("settings store has no backing file".into()))?;
    let watcher = FileWatcher::new(path)?;
    let (tx, mut rx) = broadcast::channel(4);

    Ok(tokio::spawn(async move {
        let watch = watcher.watch(tx);
        tokio::pin!(watch);
        loop {
            tokio::select! {
                result = &mut watch => {
                    if let Err(e) = result {
                        error!("settings watcher stopped: {e}");
                    }
                    return;
                }
                signal = rx.recv() => match signal {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        if let Err(e) = store.reload() {
                            warn!("settings reload skipped: {e}");
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                },
            }
        }
    }))
}
