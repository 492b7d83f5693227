//! Backend collaborators: token registry, sighting sink, suggestion feed.

mod memory;
mod supabase;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::protocol::{PartySuggestion, PartySuggestionStatus, PresenceSighting, PresenceToken};

pub use memory::MemoryApi;
pub use supabase::SupabaseClient;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("backend not configured")]
    NotConfigured,
}

#[async_trait]
pub trait PresenceApi: Send + Sync {
    /// Idempotent upsert keyed by the token value.
    async fn register_token(&self, token: &PresenceToken) -> Result<(), ApiError>;

    /// No-op for an empty batch.
    async fn upload_sightings(&self, batch: &[PresenceSighting]) -> Result<(), ApiError>;
}

#[async_trait]
pub trait SuggestionApi: Send + Sync {
    /// The oldest suggestion still pending for this user, if any.
    async fn fetch_pending_suggestion(&self) -> Result<Option<PartySuggestion>, ApiError>;

    async fn update_status(
        &self,
        id: Uuid,
        status: PartySuggestionStatus,
        responded_at: DateTime<Utc>,
    ) -> Result<(), ApiError>;
}
