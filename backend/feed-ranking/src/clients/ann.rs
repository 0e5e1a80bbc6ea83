use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use super::{http_client, post_with_retry};
use crate::config::ClientsConfig;

/// Retrieval request against the ANN index. `history_post_ids` carry
/// model-vocabulary ids, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct AnnRequest {
    pub user_id: String,
    pub keywords: Vec<String>,
    pub history_post_ids: Vec<String>,
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnHit {
    pub post_id: String,
    pub score: f64,
}

#[derive(Debug, Deserialize)]
struct AnnResponse {
    #[serde(default)]
    candidates: Vec<AnnHit>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait AnnClient: Send + Sync {
    async fn retrieve(&self, request: &AnnRequest) -> anyhow::Result<Vec<AnnHit>>;
}

pub struct HttpAnnClient {
    client: reqwest::Client,
    endpoint: String,
    retry_attempts: u32,
    retry_base_delay: Duration,
}

impl HttpAnnClient {
    pub fn new(endpoint: impl Into<String>, config: &ClientsConfig) -> Self {
        Self {
            client: http_client(config),
            endpoint: endpoint.into(),
            retry_attempts: config.retry_attempts,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }

    /// Probes the retrieval sidecar's `/health` route. Never errors; an
    /// unreachable or non-2xx sidecar reports `false`.
    pub async fn health_check(&self) -> bool {
        match self
            .client
            .get(health_url(&self.endpoint))
            .timeout(Duration::from_secs(2))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// The sidecar mounts retrieval at `.../ann/retrieve` and health at
/// `.../health` on the same host.
fn health_url(endpoint: &str) -> String {
    let base = endpoint
        .trim_end_matches('/')
        .trim_end_matches("/ann/retrieve");
    format!("{}/health", base.trim_end_matches('/'))
}

#[async_trait]
impl AnnClient for HttpAnnClient {
    async fn retrieve(&self, request: &AnnRequest) -> anyhow::Result<Vec<AnnHit>> {
        let response = post_with_retry(
            &self.client,
            &self.endpoint,
            request,
            self.retry_attempts,
            self.retry_base_delay,
        )
        .await?;
        let body: AnnResponse = response.json().await?;
        Ok(body.candidates)
    }
}
