//! Tests for settings persistence and change notification.

use super::*;
use chrono::{DateTime, Utc};
use std::time::Duration;

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

#[test]
fn defaults_match_first_launch_behaviour() {
    let s = EngineSettings::default();
    assert!(!s.is_discoverable);
    assert!(s.allow_background_detection);
    assert!(s.suggestions_enabled);
    assert!(s.suggestions_suppressed_until.is_none());
    assert!(!s.is_in_cooldown(at(0)));
}

#[test]
fn cooldown_is_exclusive_of_its_end() {
    let s = EngineSettings {
        suggestions_suppressed_until: Some(at(1_000)),
        ..Default::default()
    };
    assert!(s.is_in_cooldown(at(999)));
    assert!(!s.is_in_cooldown(at(1_000)));
}

#[test]
fn missing_file_loads_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::load(dir.path().join("settings.toml")).unwrap();
    assert_eq!(store.snapshot(), EngineSettings::default());
}

#[test]
fn corrupt_file_loads_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.toml");
    std::fs::write(&path, "is_discoverable = maybe").unwrap();
    let store = SettingsStore::load(&path).unwrap();
    assert_eq!(store.snapshot(), EngineSettings::default());
}

#[test]
fn update_persists_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("settings.toml");

    let store = SettingsStore::load(&path).unwrap();
    store.update(|s| s.is_discoverable = true).unwrap();
    store
        .suppress_suggestions(at(10_000), Duration::from_secs(60))
        .unwrap();

    let reopened = SettingsStore::load(&path).unwrap();
    let snap = reopened.snapshot();
    assert!(snap.is_discoverable);
    assert_eq!(snap.suggestions_suppressed_until, Some(at(10_060)));
}

#[test]
fn clear_cooldown_round_trips_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.toml");
    let store = SettingsStore::load(&path).unwrap();
    store.suppress_suggestions(at(0), Duration::from_secs(5)).unwrap();
    store.clear_suggestion_cooldown().unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(!content.contains("suggestions_suppressed_until"));
    assert!(SettingsStore::load(&path)
        .unwrap()
        .snapshot()
        .suggestions_suppressed_until
        .is_none());
}

#[tokio::test]
async fn subscribers_see_changes_only() {
    let store = SettingsStore::in_memory(EngineSettings::default());
    let mut rx = store.subscribe();

    store.update(|_| {}).unwrap();
    assert!(!rx.has_changed().unwrap());

    store.update(|s| s.is_discoverable = true).unwrap();
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().is_discoverable);
}

#[test]
fn reload_publishes_external_edits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.toml");
    let store = SettingsStore::load(&path).unwrap();
    let rx = store.subscribe();

    std::fs::write(&path, "is_discoverable = true\nsuggestions_enabled = false\n").unwrap();
    assert!(store.reload().unwrap());
    assert!(rx.borrow().is_discoverable);
    assert!(!rx.borrow().suggestions_enabled);
    // Background detection falls back to its default when omitted
    assert!(rx.borrow().allow_background_detection);

    assert!(!store.reload().unwrap());
}

#[test]
fn reload_keeps_values_on_half_written_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.toml");
    let store = SettingsStore::load(&path).unwrap();
    store.update(|s| s.is_discoverable = true).unwrap();

    std::fs::write(&path, "is_discoverable = tr").unwrap();
    assert!(store.reload().is_err());
    assert!(store.snapshot().is_discoverable);
}

#[test]
fn set_by_key() {
    let mut s = EngineSettings::default();
    s.set("is_discoverable".parse().unwrap(), "on").unwrap();
    s.set(SettingKey::BackgroundDetection, "false").unwrap();
    s.set(SettingKey::SuppressedUntil, "2030-01-01T00:00:00Z")
        .unwrap();
    assert!(s.is_discoverable);
    assert!(!s.allow_background_detection);
    assert_eq!(
        s.suggestions_suppressed_until.unwrap().to_rfc3339(),
        "2030-01-01T00:00:00+00:00"
    );

    s.set(SettingKey::SuppressedUntil, "none").unwrap();
    assert!(s.suggestions_suppressed_until.is_none());
}

#[test]
fn set_rejects_bad_input() {
    let mut s = EngineSettings::default();
    assert!("volume".parse::<SettingKey>().is_err());
    assert!(s.set(SettingKey::Discoverable, "sometimes").is_err());
    assert!(s.set(SettingKey::SuppressedUntil, "tomorrow").is_err());
}
