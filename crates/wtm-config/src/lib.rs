//! WTM configuration system.
//!
//! Two layers live here. [`WtmConfig`] is the operator-tuned TOML file
//! (presence timing, backend credentials, logging), validated on load.
//! [`SettingsStore`] holds the user's presence toggles, which change at
//! runtime and are watched for edits from other processes.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use wtm_config::{load_config, config_to_json};
//!
//! let config = load_config().expect("failed to load config");
//! let json = config_to_json(&config);
//! println!("{json}");
//! ```

pub mod paths;
pub mod schema;
pub mod settings;
pub mod toml_loader;
pub mod validation;
pub mod watcher;

// Re-export core types for convenience
pub use schema::{
    LogLevel, LoggingConfig, PresenceTuning, SuggestionConfig, SupabaseConfig, WtmConfig,
    CONFIG_SCHEMA_VERSION, MIN_TIMER_PERIOD, PRESENCE_SERVICE_UUID, RSSI_UNAVAILABLE,
};
pub use settings::{EngineSettings, SettingKey, SettingsStore};
pub use watcher::{spawn_settings_reload, FileWatcher};

use wtm_common::ConfigError;

/// Convenience function to load config from the platform default path.
///
/// Loads `config.toml` from the OS config directory, creates a default
/// if none exists, and validates the result.
pub fn load_config() -> Result<WtmConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Load and validate config from an explicit path.
pub fn load_config_from(path: &std::path::Path) -> Result<WtmConfig, ConfigError> {
    let config = toml_loader::load_from_path(path)?;
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
///
/// Backend secrets are replaced with `"<redacted>"`.
pub fn config_to_json(config: &WtmConfig) -> String {
    let mut redacted = config.clone();
    if !redacted.supabase.anon_key.is_empty() {
        redacted.supabase.anon_key = "<redacted>".into();
    }
    if redacted.supabase.access_token.is_some() {
        redacted.supabase.access_token = Some("<redacted>".into());
    }
    serde_json::to_string_pretty(&redacted)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
