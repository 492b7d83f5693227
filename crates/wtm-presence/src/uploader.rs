//! Periodic flush of buffered sightings to the presence backend.
//!
//! Delivery is at-most-once: a batch that fails to upload is logged and
//! dropped, and the next tick carries on with whatever arrived since.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};
use wtm_config::PresenceTuning;

use crate::api::PresenceApi;
use crate::buffer::SightingBuffer;
use crate::protocol::PresenceSighting;
use crate::radio::SightingSink;

pub struct Uploader {
    buffer: Arc<SightingBuffer>,
    api: Arc<dyn PresenceApi>,
    interval: Duration,
    min_rssi: i32,
    dedupe_window: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Uploader {
    pub fn new(
        buffer: Arc<SightingBuffer>,
        api: Arc<dyn PresenceApi>,
        tuning: &PresenceTuning,
    ) -> Self {
        Self {
            buffer,
            api,
            interval: tuning.upload_interval(),
            min_rssi: tuning.min_rssi,
            dedupe_window: tuning.sighting_dedupe_window(),
            timer: Mutex::new(None),
        }
    }

    /// Filter by signal strength, then dedupe into the buffer.
    pub fn enqueue(&self, sighting: PresenceSighting) -> bool {
        if sighting.rssi < self.min_rssi {
            return false;
        }
        self.buffer.add(sighting, self.dedupe_window)
    }

    /// (Re)start the flush timer. The first flush happens one interval from now.
    pub fn start(&self) {
        let mut timer = self.lock_timer();
        if let Some(previous) = timer.take() {
            previous.abort();
        }

        let buffer = Arc::clone(&self.buffer);
        let api = Arc::clone(&self.api);
        let interval = self.interval;
        *timer = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                flush(&buffer, &api);
            }
        }));
    }

    /// Cancel the flush timer. Uploads already in flight are left alone.
    pub fn stop(&self) {
        if let Some(timer) = self.lock_timer().take() {
            timer.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_timer().is_some()
    }

    fn lock_timer(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.timer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SightingSink for Uploader {
    fn record(&self, sighting: PresenceSighting) {
        self.enqueue(sighting);
    }
}

impl Drop for Uploader {
    fn drop(&mut self) {
        self.stop();
    }
}

fn flush(buffer: &SightingBuffer, api: &Arc<dyn PresenceApi>) {
    let batch = buffer.drain();
    if batch.is_empty() {
        return;
    }

    let api = Arc::clone(api);
    tokio::spawn(async move {
        let count = batch.len();
        match api.upload_sightings(&batch).await {
            Ok(()) => debug!(count, "uploaded sightings"),
            Err(e) => warn!(count, error = %e, "sighting upload failed, batch dropped"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MemoryApi;
    use chrono::DateTime;

    const T: i64 = 1_700_000_000;

    fn sighting(seen: &str, rssi: i32, at: i64) -> PresenceSighting {
        PresenceSighting {
            observer_token: "me".into(),
            seen_token: seen.into(),
            rssi,
            seen_at: DateTime::from_timestamp(at, 0).unwrap(),
        }
    }

    fn uploader(api: Arc<MemoryApi>) -> (Uploader, Arc<SightingBuffer>) {
        let buffer = Arc::new(SightingBuffer::new());
        let up = Uploader::new(Arc::clone(&buffer), api, &PresenceTuning::default());
        (up, buffer)
    }

    #[test]
    fn weak_signals_never_reach_the_buffer() {
        let (up, buffer) = uploader(Arc::new(MemoryApi::default()));
        assert!(!up.enqueue(sighting("far", -80, T)));
        assert!(up.enqueue(sighting("edge", -70, T)));
        assert_eq!(buffer.pending_len(), 1);
        assert_eq!(buffer.drain()[0].seen_token, "edge");
    }

    #[test]
    fn enqueue_dedupes_with_configured_window() {
        let (up, _) = uploader(Arc::new(MemoryApi::default()));
        assert!(up.enqueue(sighting("s", -50, T)));
        assert!(!up.enqueue(sighting("s", -50, T + 5)));
        assert!(up.enqueue(sighting("s", -50, T + 20)));
    }

    #[tokio::test(start_paused = true)]
    async fn flushes_one_interval_after_start() {
        let api = Arc::new(MemoryApi::default());
        let (up, _) = uploader(Arc::clone(&api));
        up.start();
        up.enqueue(sighting("s", -50, T));

        tokio::time::sleep(Duration::from_secs(19)).await;
        assert!(api.batches().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        let batches = api.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_ticks_send_nothing() {
        let api = Arc::new(MemoryApi::default());
        let (up, _) = uploader(Arc::clone(&api));
        up.start();
        tokio::time::sleep(Duration::from_secs(65)).await;
        assert!(api.batches().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_batch_is_dropped() {
        let api = Arc::new(MemoryApi::default());
        api.fail_uploads(true);
        let (up, buffer) = uploader(Arc::clone(&api));
        up.start();
        up.enqueue(sighting("s", -50, T));

        tokio::time::sleep(Duration::from_secs(21)).await;
        assert_eq!(api.upload_attempts(), 1);
        assert_eq!(buffer.pending_len(), 0);

        api.fail_uploads(false);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(api.batches().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_timer() {
        let api = Arc::new(MemoryApi::default());
        let (up, buffer) = uploader(Arc::clone(&api));
        up.start();
        up.enqueue(sighting("s", -50, T));
        up.stop();
        up.stop();
        assert!(!up.is_running());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(api.batches().is_empty());
        assert_eq!(buffer.pending_len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_resets_the_interval() {
        let api = Arc::new(MemoryApi::default());
        let (up, _) = uploader(Arc::clone(&api));
        up.start();
        tokio::time::sleep(Duration::from_secs(15)).await;
        up.enqueue(sighting("s", -50, T));
        up.start();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(api.batches().is_empty());
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(api.batches().len(), 1);
    }
}
