//! Where the seed lives between runs.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use wtm_common::StorageError;

use super::store::{Seed, SEED_LEN};

/// Backing storage for the active seed.
pub trait SeedPersistence: Send + Sync {
    /// The stored seed, or `None` when nothing usable is on record.
    fn load(&self) -> Result<Option<Seed>, StorageError>;

    /// Replace the stored seed.
    fn save(&self, seed: &Seed) -> Result<(), StorageError>;
}

// ---------------------------------------------------------------------------
// File
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct SeedRecord {
    seed: String,
    #[serde(default)]
    created_at: Option<String>,
}

/// JSON file, written atomically and readable by the owner only.
pub struct FileSeedPersistence {
    path: PathBuf,
}

impl FileSeedPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SeedPersistence for FileSeedPersistence {
    fn load(&self) -> Result<Option<Seed>, StorageError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(&self.path, e)),
        };

        let record: SeedRecord = match serde_json::from_str(&content) {
            Ok(r) => r,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "discarding unreadable seed record");
                return Ok(None);
            }
        };

        Ok(decode_record(&record))
    }

    fn save(&self, seed: &Seed) -> Result<(), StorageError> {
        let record = SeedRecord {
            seed: BASE64.encode(seed.bytes()),
            created_at: Some(seed.created_at().to_rfc3339()),
        };
        let body = serde_json::to_vec_pretty(&record)
            .map_err(|e| StorageError::Corrupt(format!("failed to serialize seed: {e}")))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }

        // Atomic write: write to .tmp, then rename
        let tmp_path = self.path.with_extension("json.tmp");
        write_private(&tmp_path, &body)?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| StorageError::io(&self.path, e))?;

        debug!(path = %self.path.display(), "presence seed persisted");
        Ok(())
    }
}

fn decode_record(record: &SeedRecord) -> Option<Seed> {
    let bytes: [u8; SEED_LEN] = match BASE64.decode(&record.seed) {
        Ok(raw) => match raw.try_into() {
            Ok(bytes) => bytes,
            Err(raw) => {
                warn!(len = raw.len(), "stored seed has the wrong length, discarding");
                return None;
            }
        },
        Err(e) => {
            warn!(error = %e, "stored seed is not valid base64, discarding");
            return None;
        }
    };

    // Without a trustworthy creation time the seed counts as expired.
    let created_at = record
        .created_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    Some(Seed::new(bytes, created_at))
}

fn write_private(path: &Path, body: &[u8]) -> Result<(), StorageError> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path).map_err(|e| StorageError::io(path, e))?;
    file.write_all(body).map_err(|e| StorageError::io(path, e))?;
    file.sync_all().map_err(|e| StorageError::io(path, e))
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// Process-local storage for tests and ephemeral peers.
#[derive(Default)]
pub struct MemorySeedPersistence {
    slot: Mutex<Option<Seed>>,
    saves: Mutex<usize>,
    fail_saves: std::sync::atomic::AtomicBool,
}

impl MemorySeedPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(seed: Seed) -> Self {
        let store = Self::default();
        *store.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(seed);
        store
    }

    /// The last saved seed.
    pub fn stored(&self) -> Option<Seed> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make subsequent saves fail, simulating a full or read-only disk.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

impl SeedPersistence for MemorySeedPersistence {
    fn load(&self) -> Result<Option<Seed>, StorageError> {
        Ok(self.stored())
    }

    fn save(&self, seed: &Seed) -> Result<(), StorageError> {
        if self.fail_saves.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StorageError::io(
                "<memory>",
                std::io::Error::new(std::io::ErrorKind::Other, "simulated save failure"),
            ));
        }
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(seed.clone());
        *self.saves.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}
