//! Coordinator inputs and outputs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use wtm_common::Clock;

use crate::api::{PresenceApi, SuggestionApi};
use crate::protocol::PartySuggestion;
use crate::radio::RadioDriver;
use crate::token::TokenProvider;

/// Everything the coordinator talks to.
pub struct Collaborators {
    pub tokens: TokenProvider,
    pub radio: Arc<dyn RadioDriver>,
    pub presence_api: Arc<dyn PresenceApi>,
    pub suggestion_api: Arc<dyn SuggestionApi>,
    pub clock: Arc<dyn Clock>,
}

/// Invoked with the suggestion the user accepted.
pub type CreateEventHandler = Arc<dyn Fn(&PartySuggestion) + Send + Sync>;

/// State changes for the host to render or persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    PresenceStarted,
    PresenceStopped,
    SuggestionAvailable(PartySuggestion),
    SuggestionCleared,
    /// Suggestions are suppressed until `until`; hosts persist this.
    CooldownStarted { until: DateTime<Utc> },
}
