//! File-backed settings store with change notification.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use wtm_common::clock::add_duration;
use wtm_common::StorageError;

use super::types::EngineSettings;

/// Holds the current [`EngineSettings`], persists every change and
/// publishes snapshots to subscribers.
pub struct SettingsStore {
    path: Option<PathBuf>,
    tx: watch::Sender<EngineSettings>,
}

impl SettingsStore {
    /// Load settings from `path`. A missing file yields defaults.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let settings = match read_settings(&path) {
            Ok(settings) => settings.unwrap_or_default(),
            Err(StorageError::Corrupt(reason)) => {
                warn!(path = %path.display(), %reason, "unreadable settings file, using defaults");
                EngineSettings::default()
            }
            Err(e) => return Err(e),
        };
        let (tx, _) = watch::channel(settings);
        Ok(Self {
            path: Some(path),
            tx,
        })
    }

    /// Non-persistent store, for tests and ephemeral sessions.
    pub fn in_memory(settings: EngineSettings) -> Self {
        let (tx, _) = watch::channel(settings);
        Self { path: None, tx }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn snapshot(&self) -> EngineSettings {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineSettings> {
        self.tx.subscribe()
    }

    /// Apply `f`, persist the result and notify subscribers if anything changed.
    pub fn update(
        &self,
        f: impl FnOnce(&mut EngineSettings),
    ) -> Result<EngineSettings, StorageError> {
        let mut next = self.snapshot();
        f(&mut next);
        if let Some(path) = &self.path {
            write_settings(path, &next)?;
        }
        self.publish(next.clone());
        Ok(next)
    }

    pub fn suppress_suggestions(
        &self,
        now: DateTime<Utc>,
        duration: Duration,
    ) -> Result<EngineSettings, StorageError> {
        let until = add_duration(now, duration);
        self.update(|s| s.suggestions_suppressed_until = Some(until))
    }

    pub fn clear_suggestion_cooldown(&self) -> Result<EngineSettings, StorageError> {
        self.update(|s| s.suggestions_suppressed_until = None)
    }

    /// Re-read the backing file, publishing if it differs from memory.
    ///
    /// Returns `true` when subscribers were notified.
    pub fn reload(&self) -> Result<bool, StorageError> {
        let Some(path) = &self.path else {
            return Ok(false);
        };
        let Some(on_disk) = read_settings(path)? else {
            debug!(path = %path.display(), "settings file vanished, keeping current values");
            return Ok(false);
        };
        let changed = self.publish(on_disk);
        if changed {
            info!(path = %path.display(), "settings reloaded from disk");
        }
        Ok(changed)
    }

    fn publish(&self, next: EngineSettings) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        })
    }
}

fn read_settings(path: &Path) -> Result<Option<EngineSettings>, StorageError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::io(path, e)),
    };
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| StorageError::Corrupt(format!("{}: {e}", path.display())))
}

fn write_settings(path: &Path, settings: &EngineSettings) -> Result<(), StorageError> {
    let body = toml::to_string_pretty(settings)
        .map_err(|e| StorageError::Corrupt(format!("failed to serialize settings: {e}")))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }

    // Atomic write: write to .tmp, then rename
    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, &body).map_err(|e| StorageError::io(&tmp_path, e))?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        warn!("atomic rename failed ({e}), falling back to direct write");
        std::fs::write(path, &body).map_err(|e| StorageError::io(path, e))?;
    }

    debug!(path = %path.display(), "settings saved to disk");
    Ok(())
}
