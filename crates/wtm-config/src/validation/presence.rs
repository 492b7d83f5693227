//! Validation for token rotation, radio filtering and upload cadence.

use crate::schema::WtmConfig;

use super::helpers::{validate_range, validate_range_i32};

pub(crate) fn validate_presence(errors: &mut Vec<String>, config: &WtmConfig) {
    let p = &config.presence;
    validate_range(
        errors,
        "presence.rotation_period_secs",
        p.rotation_period_secs,
        10,
        3600,
    );
    validate_range(
        errors,
        "presence.seed_rotation_hours",
        p.seed_rotation_hours,
        1,
        168,
    );
    validate_range(
        errors,
        "presence.token_byte_length",
        p.token_byte_length,
        4,
        32,
    );
    validate_range_i32(errors, "presence.min_rssi", p.min_rssi, -127, 0);
    // A dedupe window longer than a token window can never fire twice per token.
    validate_range(
        errors,
        "presence.sighting_dedupe_secs",
        p.sighting_dedupe_secs,
        1,
        p.rotation_period_secs.max(1),
    );
    validate_range(
        errors,
        "presence.upload_interval_secs",
        p.upload_interval_secs,
        1,
        3600,
    );
}
