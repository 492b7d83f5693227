//! One-shot subcommands.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use wtm_common::{Clock, StorageError, SystemClock, WtmError};
use wtm_config::{paths, EngineSettings, SettingKey, SettingsStore, WtmConfig};
use wtm_presence::{FileSeedPersistence, SeedStore, TokenProvider};

pub fn token(config: &WtmConfig) -> Result<String, WtmError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let seeds = SeedStore::open(
        Arc::new(FileSeedPersistence::new(paths::seed_file()?)),
        clock.clone(),
        config.presence.seed_rotation(),
    )?;
    let token = TokenProvider::new(Arc::new(seeds), &config.presence).current_token(clock.now());
    Ok(format!(
        "token      {}\nexpires_at {}",
        token.value,
        token.expires_at.to_rfc3339()
    ))
}

pub fn settings_show(path: &Path) -> Result<String, StorageError> {
    Ok(render_settings(&SettingsStore::load(path)?.snapshot()))
}

pub fn settings_set(path: &Path, key: &str, value: &str) -> Result<EngineSettings, WtmError> {
    let key: SettingKey = key.parse()?;
    let store = SettingsStore::load(path)?;
    let mut next = store.snapshot();
    next.set(key, value)?;
    Ok(store.update(|s| *s = next)?)
}

pub fn render_settings(settings: &EngineSettings) -> String {
    let mut out = String::new();
    for key in SettingKey::ALL {
        let value = match key {
            SettingKey::Discoverable => settings.is_discoverable.to_string(),
            SettingKey::BackgroundDetection => settings.allow_background_detection.to_string(),
            SettingKey::SuggestionsEnabled => settings.suggestions_enabled.to_string(),
            SettingKey::SuppressedUntil => settings
                .suggestions_suppressed_until
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "none".into()),
        };
        let _ = writeln!(out, "{:<30} {value}", key.as_str());
    }
    out
}
