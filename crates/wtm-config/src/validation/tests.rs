//! Tests for the full validation pipeline.

use super::*;

#[test]
fn default_config_validates() {
    let config = WtmConfig::default();
    assert!(validate(&config).is_ok());
}

#[test]
fn catches_rotation_period_too_short() {
    let mut config = WtmConfig::default();
    config.presence.rotation_period_secs = 5;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("presence.rotation_period_secs"));
}

#[test]
fn catches_token_length_too_long() {
    let mut config = WtmConfig::default();
    config.presence.token_byte_length = 33;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("presence.token_byte_length"));
}

#[test]
fn catches_positive_min_rssi() {
    let mut config = WtmConfig::default();
    config.presence.min_rssi = 10;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("presence.min_rssi"));
}

#[test]
fn catches_dedupe_longer_than_rotation() {
    let mut config = WtmConfig::default();
    config.presence.sighting_dedupe_secs = 121;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("presence.sighting_dedupe_secs"));
}

#[test]
fn catches_zero_upload_interval() {
    let mut config = WtmConfig::default();
    config.presence.upload_interval_secs = 0;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("presence.upload_interval_secs"));
}

#[test]
fn catches_poll_interval_too_short() {
    let mut config = WtmConfig::default();
    config.suggestions.poll_interval_secs = 1;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("suggestions.poll_interval_secs"));
}

#[test]
fn zero_cooldown_is_allowed() {
    let mut config = WtmConfig::default();
    config.suggestions.cooldown_secs = 0;
    assert!(validate(&config).is_ok());
}

#[test]
fn catches_non_http_supabase_url() {
    let mut config = WtmConfig::default();
    config.supabase.url = "ftp://example.com".into();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("supabase.url"));
}

#[test]
fn collects_multiple_errors() {
    let mut config = WtmConfig::default();
    config.presence.min_rssi = 5;
    config.suggestions.poll_interval_secs = 0;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("presence.min_rssi"));
    assert!(err.contains("suggestions.poll_interval_secs"));
    assert!(err.contains("; "));
}
