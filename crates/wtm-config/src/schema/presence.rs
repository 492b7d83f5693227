//! Presence engine tuning: token rotation, radio filtering, upload cadence.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Service identifier the presence token is advertised and scanned under.
pub const PRESENCE_SERVICE_UUID: Uuid = Uuid::from_u128(0xA8A37B7C_9A4D_4E2E_90B8_4D4F8F4C2B1D);

/// RSSI value radio stacks report when signal strength is unavailable.
pub const RSSI_UNAVAILABLE: i16 = 127;

/// Floor for every timer period; a zero period would spin or divide by zero.
pub const MIN_TIMER_PERIOD: Duration = Duration::from_secs(1);

/// Presence engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceTuning {
    /// Length of one token window in seconds.
    pub rotation_period_secs: u32,
    /// Seed lifetime in hours.
    pub seed_rotation_hours: u32,
    /// Truncated HMAC length advertised over the radio.
    pub token_byte_length: u32,
    /// Sightings weaker than this are dropped at ingestion.
    pub min_rssi: i32,
    /// Minimum gap before the same observer/seen pair is recorded again.
    pub sighting_dedupe_secs: u32,
    pub upload_interval_secs: u32,
    pub service_uuid: Uuid,
}

impl Default for PresenceTuning {
    fn default() -> Self {
        Self {
            rotation_period_secs: 120,
            seed_rotation_hours: 24,
            token_byte_length: 8,
            min_rssi: -70,
            sighting_dedupe_secs: 12,
            upload_interval_secs: 20,
            service_uuid: PRESENCE_SERVICE_UUID,
        }
    }
}

impl PresenceTuning {
    pub fn rotation_period(&self) -> Duration {
        Duration::from_secs(u64::from(self.rotation_period_secs)).max(MIN_TIMER_PERIOD)
    }

    pub fn seed_rotation(&self) -> Duration {
        Duration::from_secs(u64::from(self.seed_rotation_hours) * 3600)
    }

    pub fn sighting_dedupe_window(&self) -> Duration {
        Duration::from_secs(u64::from(self.sighting_dedupe_secs))
    }

    pub fn upload_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.upload_interval_secs)).max(MIN_TIMER_PERIOD)
    }

    pub fn token_len(&self) -> usize {
        self.token_byte_length as usize
    }
}
