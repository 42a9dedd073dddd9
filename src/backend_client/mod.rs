// HTTP client for the remote progress backend

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::ProgressEntry;

/// A delivery attempt that produced a definitive backend answer. Transport
/// failures, timeouts and undecodable bodies surface as `Err` instead and
/// are treated as transient by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Accepted(SyncAck),
    Unauthorized,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SyncAck {
    pub ok: bool,
    /// Number of items the backend upserted.
    pub stored: i64,
}

#[derive(Serialize)]
struct SyncRequest<'a> {
    items: &'a [ProgressEntry],
}

/// Delivery seam between the reconciliation core and the network. Tests
/// substitute a fake remote store here.
#[async_trait::async_trait]
pub trait SyncTransport: Send + Sync {
    async fn deliver(
        &self,
        items: &[ProgressEntry],
        token: Option<&str>,
    ) -> anyhow::Result<Delivery>;
}

#[derive(Clone, Debug)]
pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
}

impl BackendClient {
    /// Create a new client for the given backend base URL (e.g.
    /// "http://localhost:4000"). The timeout bounds each flush attempt.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url_str = base_url.into();
        tracing::debug!(base_url = %base_url_str, "creating BackendClient");
        Ok(BackendClient {
            base_url: base_url_str.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait::async_trait]
impl SyncTransport for BackendClient {
    /// POST /sync with the batched entries. The Authorization header is sent
    /// empty when no session exists, matching the backend contract.
    #[tracing::instrument(level = "debug", skip(self, items, token), fields(count = items.len()))]
    async fn deliver(
        &self,
        items: &[ProgressEntry],
        token: Option<&str>,
    ) -> anyhow::Result<Delivery> {
        let url = self.url("/sync");
        let request_id = Uuid::new_v4();
        tracing::debug!(%url, %request_id, "POST sync batch");
        let auth_value = token
            .map(|t| format!("Bearer {}", t))
            .unwrap_or_default();
        let resp = self
            .client
            .post(&url)
            .header("Authorization", auth_value)
            .header("X-Sync-Request-Id", request_id.to_string())
            .json(&SyncRequest { items })
            .send()
            .await
            .with_context(|| format!("sync request {} failed to reach backend", request_id))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Ok(Delivery::Unauthorized);
        }
        if !status.is_success() {
            anyhow::bail!("backend returned {} for sync request {}", status, request_id);
        }
        let body = resp.text().await?;
        match serde_json::from_str::<SyncAck>(&body) {
            Ok(ack) => Ok(Delivery::Accepted(ack)),
            Err(e) => {
                let snippet_len = body.len().min(2000);
                let snippet = &body[..snippet_len];
                tracing::error!(error = %e, body_snippet = %snippet, "failed to parse sync response");
                Err(e.into())
            }
        }
    }
}
