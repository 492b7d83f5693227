//! Persisted user toggles that gate the presence engine.
//!
//! Stored as TOML next to the presence seed. Every change is written
//! atomically and published on a [`tokio::sync::watch`] channel.

mod store;
mod types;

#[cfg(test)]
mod tests;

pub use store::SettingsStore;
pub use types::{EngineSettings, SettingKey};
