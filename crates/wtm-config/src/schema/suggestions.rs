//! Party suggestion polling configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::MIN_TIMER_PERIOD;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionConfig {
    pub poll_interval_secs: u32,
    /// Quiet period after the user answers a suggestion.
    pub cooldown_secs: u32,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            cooldown_secs: 4 * 60 * 60,
        }
    }
}

impl SuggestionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.poll_interval_secs)).max(MIN_TIMER_PERIOD)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(u64::from(self.cooldown_secs))
    }
}
