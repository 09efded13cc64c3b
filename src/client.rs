//! HTTP client for the site backend.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

use site_core::{EssConfig, StatusSnapshot, VppConfig};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("build http client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned {status}: {reason}")]
    Status {
        url: String,
        status: StatusCode,
        reason: String,
    },
    #[error("invalid response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ClientError {
    /// Text suitable for a user-facing notice.
    pub fn reason(&self) -> String {
        match self {
            ClientError::Status { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }
}

/// Receipt returned by the apply endpoints.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyReceipt {
    pub id: String,
    pub target: String,
    pub submitted_at: String,
    pub status: String,
}

#[derive(Clone, Debug)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::Build)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `GET /api/status`, normalized. Any payload shape is accepted.
    pub async fn fetch_status(&self) -> Result<StatusSnapshot, ClientError> {
        let raw: serde_json::Value = self
            .send(self.http.get(self.url("/api/status")), "/api/status")
            .await?;
        Ok(StatusSnapshot::normalize(&raw))
    }

    pub async fn ess_config(&self) -> Result<EssConfig, ClientError> {
        self.send(self.http.get(self.url("/api/ess/config")), "/api/ess/config")
            .await
    }

    pub async fn save_ess_config(&self, cfg: &EssConfig) -> Result<EssConfig, ClientError> {
        self.send(
            self.http.put(self.url("/api/ess/config")).json(cfg),
            "/api/ess/config",
        )
        .await
    }

    pub async fn apply_ess(&self) -> Result<ApplyReceipt, ClientError> {
        self.send(self.http.post(self.url("/api/ess/apply")), "/api/ess/apply")
            .await
    }

    pub async fn vpp_config(&self) -> Result<VppConfig, ClientError> {
        self.send(self.http.get(self.url("/api/vpp/config")), "/api/vpp/config")
            .await
    }

    pub async fn save_vpp_config(&self, cfg: &VppConfig) -> Result<VppConfig, ClientError> {
        self.send(
            self.http.put(self.url("/api/vpp/config")).json(cfg),
            "/api/vpp/config",
        )
        .await
    }

    pub async fn apply_vpp(&self) -> Result<ApplyReceipt, ClientError> {
        self.send(self.http.post(self.url("/api/vpp/apply")), "/api/vpp/apply")
            .await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
        path: &str,
    ) -> Result<T, ClientError> {
        let url = self.url(path);
        let res = req.send().await.map_err(|source| ClientError::Transport {
            url: url.clone(),
            source,
        })?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                url,
                status,
                reason: failure_reason(status, &body),
            });
        }
        res.json::<T>()
            .await
            .map_err(|source| ClientError::Decode { url, source })
    }
}

/// Prefer the backend's `error` field, then the raw body, then the status text.
fn failure_reason(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(msg) = value.get("error").and_then(|v| v.as_str()) {
            return msg.to_string();
        }
    }
    let body = body.trim();
    if !body.is_empty() {
        return body.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
}
