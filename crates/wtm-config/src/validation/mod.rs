//! Full configuration validation.
//!
//! Each domain has its own submodule; this orchestrator calls them all
//! and collects errors into a single `ConfigError`.

mod helpers;
mod misc;
mod presence;

#[cfg(test)]
mod tests;

use crate::schema::WtmConfig;
use wtm_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &WtmConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    presence::validate_presence(&mut errors, config);
    misc::validate_suggestions(&mut errors, config);
    misc::validate_supabase(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
