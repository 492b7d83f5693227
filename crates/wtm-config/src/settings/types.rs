//! User-facing presence toggles.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wtm_common::ConfigError;

/// Snapshot of the user's presence toggles.
///
/// The engine only ever reads snapshots; writes go through
/// [`SettingsStore`](super::SettingsStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub is_discoverable: bool,
    pub allow_background_detection: bool,
    pub suggestions_enabled: bool,
    /// No suggestion is fetched before this instant. `None` means never suppressed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions_suppressed_until: Option<DateTime<Utc>>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            is_discoverable: false,
            allow_background_detection: true,
            suggestions_enabled: true,
            suggestions_suppressed_until: None,
        }
    }
}

impl EngineSettings {
    pub fn is_in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.suggestions_suppressed_until
            .is_some_and(|until| now < until)
    }

    /// Set a toggle by its config key, as typed on the command line.
    pub fn set(&mut self, key: SettingKey, value: &str) -> Result<(), ConfigError> {
        match key {
            SettingKey::Discoverable => self.is_discoverable = parse_bool(key, value)?,
            SettingKey::BackgroundDetection => {
                self.allow_background_detection = parse_bool(key, value)?
            }
            SettingKey::SuggestionsEnabled => self.suggestions_enabled = parse_bool(key, value)?,
            SettingKey::SuppressedUntil => {
                self.suggestions_suppressed_until = match value {
                    "" | "none" => None,
                    other => Some(
                        DateTime::parse_from_rfc3339(other)
                            .map_err(|e| {
                                ConfigError::ValidationError(format!("{key}: {e}"))
                            })?
                            .with_timezone(&Utc),
                    ),
                }
            }
        }
        Ok(())
    }
}

/// Addressable fields of [`EngineSettings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    Discoverable,
    BackgroundDetection,
    SuggestionsEnabled,
    SuppressedUntil,
}

impl SettingKey {
    pub const ALL: [SettingKey; 4] = [
        SettingKey::Discoverable,
        SettingKey::BackgroundDetection,
        SettingKey::SuggestionsEnabled,
        SettingKey::SuppressedUntil,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SettingKey::Discoverable => "is_discoverable",
            SettingKey::BackgroundDetection => "allow_background_detection",
            SettingKey::SuggestionsEnabled => "suggestions_enabled",
            SettingKey::SuppressedUntil => "suggestions_suppressed_until",
        }
    }
}

impl std::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SettingKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ConfigError::ValidationError(format!("unknown setting {s:?}")))
    }
}

fn parse_bool(key: SettingKey, value: &str) -> Result<bool, ConfigError> {
    match value {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        other => Err(ConfigError::ValidationError(format!(
            "{key}: expected a boolean, got {other:?}"
        ))),
    }
}
