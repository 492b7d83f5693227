//! Protocol types for the proximity presence system.
//!
//! Domain values produced by the engine and the JSON rows exchanged with
//! the backend. Timestamps go over the wire as RFC 3339 UTC.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Tokens and sightings
// ---------------------------------------------------------------------------

/// A short-lived broadcast identity, constant within one token window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PresenceToken {
    /// Lowercase hex of the truncated HMAC.
    pub value: String,
    /// End of the token window (exclusive).
    pub expires_at: DateTime<Utc>,
}

/// "I (`observer_token`) saw `seen_token` at this signal strength and time."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceSighting {
    pub observer_token: String,
    pub seen_token: String,
    pub rssi: i32,
    pub seen_at: DateTime<Utc>,
}

/// Row upserted into `presence_tokens`.
#[derive(Debug, Clone, Serialize)]
pub struct TokenRegistration<'a> {
    pub token: &'a str,
    pub expires_at: DateTime<Utc>,
}

impl<'a> From<&'a PresenceToken> for TokenRegistration<'a> {
    fn from(token: &'a PresenceToken) -> Self {
        Self {
            token: &token.value,
            expires_at: token.expires_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Suggestions
// ---------------------------------------------------------------------------

/// Lifecycle of a server-computed party suggestion.
///
/// Every status other than `Pending` is terminal once reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartySuggestionStatus {
    Pending,
    Accepted,
    Dismissed,
    PrivateParty,
}

impl PartySuggestionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Dismissed => "dismissed",
            Self::PrivateParty => "private_party",
        }
    }
}

impl std::fmt::Display for PartySuggestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// "You and N others are here."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartySuggestion {
    pub id: Uuid,
    pub group_id: Uuid,
    pub participant_count: u32,
    pub suggested_at: DateTime<Utc>,
    pub status: PartySuggestionStatus,
}

/// Body of a `party_suggestions` status patch.
#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdate {
    pub status: PartySuggestionStatus,
    pub responded_at: DateTime<Utc>,
}
