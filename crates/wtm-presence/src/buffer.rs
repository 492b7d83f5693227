//! Deduplicating accumulator between the radio and the uploader.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::protocol::PresenceSighting;

#[derive(Default)]
struct BufferState {
    pending: Vec<PresenceSighting>,
    last_seen: HashMap<(String, String), DateTime<Utc>>,
    newest: Option<DateTime<Utc>>,
    dedupe_window: TimeDelta,
}

/// Pending sightings plus the last accepted time per observer/seen pair.
///
/// `add` and `drain` serialize on one lock, so a sighting is either in the
/// batch being drained or in the next one.
#[derive(Default)]
pub struct SightingBuffer {
    state: Mutex<BufferState>,
}

impl SightingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `sighting` unless the same pair was accepted less than
    /// `dedupe_window` before it.
    pub fn add(&self, sighting: PresenceSighting, dedupe_window: Duration) -> bool {
        let window = TimeDelta::from_std(dedupe_window).unwrap_or(TimeDelta::MAX);
        let mut state = self.lock();

        let key = (
            sighting.observer_token.clone(),
            sighting.seen_token.clone(),
        );
        if let Some(last) = state.last_seen.get(&key) {
            if sighting.seen_at.signed_duration_since(*last) < window {
                return false;
            }
        }

        state.last_seen.insert(key, sighting.seen_at);
        state.newest = Some(state.newest.map_or(sighting.seen_at, |n| n.max(sighting.seen_at)));
        state.dedupe_window = state.dedupe_window.max(window);
        state.pending.push(sighting);
        true
    }

    /// Take every pending sighting.
    ///
    /// Also forgets pairs whose last sighting is older than the dedupe
    /// window relative to the newest one; they can no longer suppress anything.
    pub fn drain(&self) -> Vec<PresenceSighting> {
        let mut state = self.lock();
        if let Some(newest) = state.newest {
            let window = state.dedupe_window;
            state
                .last_seen
                .retain(|_, last| newest.signed_duration_since(*last) < window);
        }
        std::mem::take(&mut state.pending)
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Number of observer/seen pairs currently remembered for dedupe.
    pub fn tracked_pairs(&self) -> usize {
        self.lock().last_seen.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
