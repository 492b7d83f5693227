//! Rotating presence tokens.
//!
//! A token is `HMAC-SHA256(seed, window)` truncated and hex-encoded, where
//! `window` is the big-endian signed index of the fixed-length period that
//! contains the requested instant. Equal inputs give equal tokens; adjacent
//! windows give unrelated ones.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use wtm_config::{PresenceTuning, MIN_TIMER_PERIOD};

use crate::protocol::PresenceToken;
use crate::seed::SeedStore;

type HmacSha256 = Hmac<Sha256>;

/// Index of the token window containing `at`.
pub fn window_index(at: DateTime<Utc>, period: Duration) -> i64 {
    at.timestamp().div_euclid(period_secs(period))
}

/// Raw advertised bytes for `window`.
pub fn derive_token_bytes(seed: &[u8], window: i64, len: usize) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(seed).expect("HMAC accepts keys of any length");
    mac.update(&window.to_be_bytes());
    let digest = mac.finalize().into_bytes();
    digest[..len.min(digest.len())].to_vec()
}

/// Token for `window`, expiring at the window's end.
pub fn derive_token(seed: &[u8], window: i64, period: Duration, len: usize) -> PresenceToken {
    let period = period_secs(period);
    let expires_at = window
        .checked_add(1)
        .and_then(|next| next.checked_mul(period))
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);

    PresenceToken {
        value: hex::encode(derive_token_bytes(seed, window, len)),
        expires_at,
    }
}

/// Time from `at` until the next window boundary, never zero.
pub fn until_next_window(at: DateTime<Utc>, period: Duration) -> Duration {
    let period = period_secs(period);
    let into = at.timestamp().rem_euclid(period);
    let secs = u64::try_from(period - into).unwrap_or(1);
    Duration::from_secs(secs).saturating_sub(Duration::from_nanos(u64::from(
        at.timestamp_subsec_nanos(),
    )))
    .max(Duration::from_millis(1))
}

fn period_secs(period: Duration) -> i64 {
    i64::try_from(period.as_secs()).unwrap_or(i64::MAX).max(1)
}

/// Derives the device's current token from the active seed.
#[derive(Clone)]
pub struct TokenProvider {
    seeds: Arc<SeedStore>,
    period: Duration,
    token_len: usize,
}

impl TokenProvider {
    pub fn new(seeds: Arc<SeedStore>, tuning: &PresenceTuning) -> Self {
        Self::with_params(seeds, tuning.rotation_period(), tuning.token_len())
    }

    pub fn with_params(seeds: Arc<SeedStore>, period: Duration, token_len: usize) -> Self {
        Self {
            seeds,
            period: period.max(MIN_TIMER_PERIOD),
            token_len,
        }
    }

    pub fn current_token(&self, at: DateTime<Utc>) -> PresenceToken {
        let seed = self.seeds.current_seed();
        derive_token(
            seed.bytes(),
            window_index(at, self.period),
            self.period,
            self.token_len,
        )
    }

    /// The payload advertised over the radio for `at`.
    pub fn current_token_bytes(&self, at: DateTime<Utc>) -> Vec<u8> {
        let seed = self.seeds.current_seed();
        derive_token_bytes(seed.bytes(), window_index(at, self.period), self.token_len)
    }

    pub fn rotation_period(&self) -> Duration {
        self.period
    }
}
