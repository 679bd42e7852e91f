use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value as JsonValue;
use tracing::{debug, instrument};

use super::error::LimitsError;
use super::snapshot::LimitValues;

#[async_trait]
pub trait LimitsProvider: Send + Sync {
    /// Fetches the current limits. Parameters the source does not define
    /// take their value from `fallback`.
    async fn fetch_limits(&self, fallback: &LimitValues) -> Result<LimitValues, LimitsError>;

    /// `false` for sources that only hand back configured values; snapshots
    /// installed from them keep `fetched_at` unset.
    fn is_remote(&self) -> bool {
        true
    }
}

/// Serves a fixed set of limits. Used when no remote source is configured.
pub struct StaticLimitsProvider {
    limits: LimitValues,
}

impl StaticLimitsProvider {
    pub fn new(limits: LimitValues) -> Self {
        Self { limits }
    }
}

#[async_trait]
impl LimitsProvider for StaticLimitsProvider {
    async fn fetch_limits(&self, _fallback: &LimitValues) -> Result<LimitValues, LimitsError> {
        Ok(self.limits)
    }

    fn is_remote(&self) -> bool {
        false
    }
}

pub struct HttpLimitsProvider {
    http_client: Client,
    url: String,
    token: Option<String>,
}

impl HttpLimitsProvider {
    pub fn new(url: String, token: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            url,
            token,
        })
    }
}

#[async_trait]
impl LimitsProvider for HttpLimitsProvider {
    #[instrument(skip(self, fallback), fields(url = %self.url))]
    async fn fetch_limits(&self, fallback: &LimitValues) -> Result<LimitValues, LimitsError> {
        let mut request = self.http_client.get(&self.url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_string());
            return Err(LimitsError::ProviderError { status, message });
        }

        let document: JsonValue = response.json().await?;
        let limits = LimitValues::from_document(&document, fallback)?;
        debug!(?limits, "fetched limits document");
        Ok(limits)
    }
}
