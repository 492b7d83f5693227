//! In-memory seed holder with lazy rotation.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{error, info};
use wtm_common::{Clock, StorageError};

use super::persistence::SeedPersistence;

/// Seed length in bytes.
pub const SEED_LEN: usize = 32;

/// The token-derivation key and the instant it was minted.
#[derive(Clone, PartialEq, Eq)]
pub struct Seed {
    bytes: [u8; SEED_LEN],
    created_at: DateTime<Utc>,
}

impl Seed {
    pub fn new(bytes: [u8; SEED_LEN], created_at: DateTime<Utc>) -> Self {
        Self { bytes, created_at }
    }

    /// Draw a fresh seed from the OS CSPRNG.
    pub fn generate(now: DateTime<Utc>) -> Result<Self, StorageError> {
        let mut bytes = [0u8; SEED_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| StorageError::Rng(e.to_string()))?;
        Ok(Self::new(bytes, now))
    }

    pub fn bytes(&self) -> &[u8; SEED_LEN] {
        &self.bytes
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Strictly older than `lifetime` at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, lifetime: Duration) -> bool {
        let Ok(lifetime) = TimeDelta::from_std(lifetime) else {
            return false;
        };
        now.signed_duration_since(self.created_at) > lifetime
    }
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Seed")
            .field("bytes", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Owns the active [`Seed`].
///
/// Reads take a shared lock; rotation takes the exclusive lock and
/// re-checks expiry, so concurrent callers converge on one new seed.
pub struct SeedStore {
    persistence: Arc<dyn SeedPersistence>,
    clock: Arc<dyn Clock>,
    lifetime: Duration,
    current: RwLock<Seed>,
}

impl SeedStore {
    /// Load the persisted seed, or mint and persist a new one.
    ///
    /// Fails when the RNG or the backing storage is unusable; the engine
    /// cannot run without a seed.
    pub fn open(
        persistence: Arc<dyn SeedPersistence>,
        clock: Arc<dyn Clock>,
        lifetime: Duration,
    ) -> Result<Self, StorageError> {
        let now = clock.now();
        let seed = match persistence.load()? {
            Some(seed) if !seed.is_expired(now, lifetime) => seed,
            stored => {
                if stored.is_some() {
                    info!("stored presence seed expired, rotating");
                } else {
                    info!("no presence seed on record, generating");
                }
                let seed = Seed::generate(now)?;
                persistence.save(&seed)?;
                seed
            }
        };

        Ok(Self {
            persistence,
            clock,
            lifetime,
            current: RwLock::new(seed),
        })
    }

    /// The active seed, rotating it first if it has expired.
    pub fn current_seed(&self) -> Seed {
        let now = self.clock.now();
        {
            let current = self.current.read().unwrap_or_else(|e| e.into_inner());
            if !current.is_expired(now, self.lifetime) {
                return current.clone();
            }
        }

        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        if !current.is_expired(now, self.lifetime) {
            return current.clone();
        }

        match Seed::generate(now) {
            Ok(seed) => {
                if let Err(e) = self.persistence.save(&seed) {
                    error!(error = %e, "failed to persist rotated presence seed");
                }
                info!("presence seed rotated");
                *current = seed;
            }
            Err(e) => {
                error!(error = %e, "presence seed rotation failed, keeping previous seed");
            }
        }
        current.clone()
    }
}
