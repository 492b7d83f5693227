//! PostgREST client for the presence tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, Response};
use tracing::debug;
use uuid::Uuid;
use wtm_config::SupabaseConfig;

use crate::protocol::{
    PartySuggestion, PartySuggestionStatus, PresenceSighting, PresenceToken, StatusUpdate,
    TokenRegistration,
};

use super::{ApiError, PresenceApi, SuggestionApi};

const TOKENS_TABLE: &str = "presence_tokens";
const SIGHTINGS_TABLE: &str = "presence_sightings";
const SUGGESTIONS_TABLE: &str = "party_suggestions";

/// Talks to the Supabase REST interface with the anon key, or with the
/// user's access token when one is configured.
pub struct SupabaseClient {
    config: SupabaseConfig,
    http: reqwest::Client,
}

impl SupabaseClient {
    pub fn new(config: SupabaseConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(config.timeout_secs.into()))
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.config.url.trim_end_matches('/'))
    }

    fn request(&self, method: Method, url: &str) -> Result<RequestBuilder, ApiError> {
        if !self.config.is_configured() {
            return Err(ApiError::NotConfigured);
        }
        let bearer = self
            .config
            .access_token
            .as_deref()
            .unwrap_or(&self.config.anon_key);
        Ok(self
            .http
            .request(method, url)
            .header("apikey", &self.config.anon_key)
            .header("Authorization", format!("Bearer {bearer}")))
    }
}

async fn send(request: RequestBuilder) -> Result<Response, ApiError> {
    let response = request
        .send()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let body = text.chars().take(200).collect::<String>();
        return Err(ApiError::Http {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

#[async_trait]
impl PresenceApi for SupabaseClient {
    async fn register_token(&self, token: &PresenceToken) -> Result<(), ApiError> {
        let url = format!("{}?on_conflict=token", self.table_url(TOKENS_TABLE));
        let request = self
            .request(Method::POST, &url)?
            .header("Prefer", "resolution=merge-duplicates")
            .json(&TokenRegistration::from(token));
        send(request).await?;
        debug!(expires_at = %token.expires_at, "presence token registered");
        Ok(())
    }

    async fn upload_sightings(&self, batch: &[PresenceSighting]) -> Result<(), ApiError> {
        if batch.is_empty() {
            return Ok(());
        }
        let request = self
            .request(Method::POST, &self.table_url(SIGHTINGS_TABLE))?
            .json(batch);
        send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl SuggestionApi for SupabaseClient {
    async fn fetch_pending_suggestion(&self) -> Result<Option<PartySuggestion>, ApiError> {
        let url = format!(
            "{}?select=*&status=eq.pending&order=suggested_at.asc&limit=1",
            self.table_url(SUGGESTIONS_TABLE)
        );
        let response = send(self.request(Method::GET, &url)?).await?;
        let rows: Vec<PartySuggestion> = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;
        Ok(rows.into_iter().next())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: PartySuggestionStatus,
        responded_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        let url = format!("{}?id=eq.{id}", self.table_url(SUGGESTIONS_TABLE));
        let request = self
            .request(Method::PATCH, &url)?
            .json(&StatusUpdate {
                status,
                responded_at,
            });
        send(request).await?;
        Ok(())
    }
}
