//! In-process backend that records every call.
//!
//! Serves as the offline backend of the daemon and as the fake in tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::protocol::{PartySuggestion, PartySuggestionStatus, PresenceSighting, PresenceToken};

use super::{ApiError, PresenceApi, SuggestionApi};

#[derive(Default)]
struct Recorded {
    registrations: Vec<PresenceToken>,
    batches: Vec<Vec<PresenceSighting>>,
    upload_attempts: usize,
    pending: Option<PartySuggestion>,
    fetches: usize,
    status_updates: Vec<(Uuid, PartySuggestionStatus, DateTime<Utc>)>,
    fetch_delay: Option<Duration>,
}

#[derive(Default)]
pub struct MemoryApi {
    recorded: Mutex<Recorded>,
    fail_uploads: AtomicBool,
    fail_fetches: AtomicBool,
}

impl MemoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `register_token` call, in order.
    pub fn registrations(&self) -> Vec<PresenceToken> {
        self.lock().registrations.clone()
    }

    /// Every successfully uploaded batch, in order.
    pub fn batches(&self) -> Vec<Vec<PresenceSighting>> {
        self.lock().batches.clone()
    }

    /// Non-empty `upload_sightings` calls, including failed ones.
    pub fn upload_attempts(&self) -> usize {
        self.lock().upload_attempts
    }

    pub fn fetch_count(&self) -> usize {
        self.lock().fetches
    }

    pub fn status_updates(&self) -> Vec<(Uuid, PartySuggestionStatus, DateTime<Utc>)> {
        self.lock().status_updates.clone()
    }

    /// Suggestion returned by the next fetches until it is responded to.
    pub fn set_pending(&self, suggestion: Option<PartySuggestion>) {
        self.lock().pending = suggestion;
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    /// Hold each fetch for `delay` before answering.
    pub fn set_fetch_delay(&self, delay: Option<Duration>) {
        self.lock().fetch_delay = delay;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl PresenceApi for MemoryApi {
    async fn register_token(&self, token: &PresenceToken) -> Result<(), ApiError> {
        self.lock().registrations.push(token.clone());
        Ok(())
    }

    async fn upload_sightings(&self, batch: &[PresenceSighting]) -> Result<(), ApiError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut recorded = self.lock();
        recorded.upload_attempts += 1;
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(ApiError::Network("simulated upload failure".into()));
        }
        recorded.batches.push(batch.to_vec());
        Ok(())
    }
}

#[async_trait]
impl SuggestionApi for MemoryApi {
    async fn fetch_pending_suggestion(&self) -> Result<Option<PartySuggestion>, ApiError> {
        let delay = {
            let mut recorded = self.lock();
            recorded.fetches += 1;
            recorded.fetch_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(ApiError::Http {
                status: 503,
                body: "simulated outage".into(),
            });
        }
        Ok(self
            .lock()
            .pending
            .clone()
            .filter(|s| s.status == PartySuggestionStatus::Pending))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: PartySuggestionStatus,
        responded_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        let mut recorded = self.lock();
        recorded.status_updates.push((id, status, responded_at));
        if let Some(pending) = recorded.pending.as_mut().filter(|p| p.id == id) {
            pending.status = status;
        }
        Ok(())
    }
}
