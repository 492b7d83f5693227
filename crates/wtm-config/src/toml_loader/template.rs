//! Default TOML config template with inline documentation.

/// Generate the default TOML config content with comments.
pub(super) fn default_config_toml() -> String {
    r##"# WTM presence configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[presence]
# rotation_period_secs = 120   # token window length (10-3600)
# seed_rotation_hours = 24     # seed lifetime (1-168)
# token_byte_length = 8        # advertised token bytes (4-32)
# min_rssi = -70               # weaker sightings are ignored (-127-0)
# sighting_dedupe_secs = 12    # per observer/seen pair
# upload_interval_secs = 20    # sighting batch flush (1-3600)
# service_uuid = "a8a37b7c-9a4d-4e2e-90b8-4d4f8f4c2b1d"

[suggestions]
# poll_interval_secs = 60      # (5-3600)
# cooldown_secs = 14400        # quiet period after answering (0-604800)

[supabase]
# url = "https://<project>.supabase.co"
# anon_key = ""
# timeout_secs = 15

[logging]
# level = "INFO"               # DEBUG, INFO, WARNING, ERROR
"##
    .to_string()
}
