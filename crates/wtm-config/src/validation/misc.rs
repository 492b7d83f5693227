//! Validation for smaller config sections: suggestions and supabase.

use crate::schema::WtmConfig;

use super::helpers::validate_range;

/// Validate suggestion polling constraints.
pub(crate) fn validate_suggestions(errors: &mut Vec<String>, config: &WtmConfig) {
    validate_range(
        errors,
        "suggestions.poll_interval_secs",
        config.suggestions.poll_interval_secs,
        5,
        3600,
    );
    validate_range(
        errors,
        "suggestions.cooldown_secs",
        config.suggestions.cooldown_secs,
        0,
        7 * 24 * 3600,
    );
}

/// Validate backend connection settings.
pub(crate) fn validate_supabase(errors: &mut Vec<String>, config: &WtmConfig) {
    let url = &config.supabase.url;
    if !url.is_empty() && !(url.starts_with("https://") || url.starts_with("http://")) {
        errors.push(format!("supabase.url = {url:?} must start with http:// or https://"));
    }
    validate_range(
        errors,
        "supabase.timeout_secs",
        config.supabase.timeout_secs,
        1,
        300,
    );
}
