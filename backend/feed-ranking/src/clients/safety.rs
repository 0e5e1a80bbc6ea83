use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use super::{http_client, post_with_retry};
use crate::config::ClientsConfig;
use crate::models::VfVerdict;

/// Header the safety service sets when its ML path is down and it answered
/// from the rules-only fallback. Fallback verdicts are not trustworthy
/// enough to gate on, so the client surfaces them as unavailability.
const ML_FALLBACK_HEADER: &str = "x-ml-fallback";

#[derive(Debug, Clone, Serialize)]
pub struct SafetyCheckItem {
    pub post_id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyVerdict {
    pub post_id: String,
    #[serde(flatten)]
    pub verdict: VfVerdict,
}

#[derive(Debug, Deserialize)]
struct SafetyResponse {
    #[serde(default)]
    results: Vec<SafetyVerdict>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SafetyClient: Send + Sync {
    async fn check(&self, items: &[SafetyCheckItem]) -> anyhow::Result<Vec<SafetyVerdict>>;
}

pub struct HttpSafetyClient {
    client: reqwest::Client,
    endpoint: String,
    retry_attempts: u32,
    retry_base_delay: Duration,
}

impl HttpSafetyClient {
    pub fn new(endpoint: impl Into<String>, config: &ClientsConfig) -> Self {
        Self {
            client: http_client(config),
            endpoint: endpoint.into(),
            retry_attempts: config.retry_attempts,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }
}

#[derive(Serialize)]
struct SafetyRequest<'a> {
    items: &'a [SafetyCheckItem],
}

#[async_trait]
impl SafetyClient for HttpSafetyClient {
    async fn check(&self, items: &[SafetyCheckItem]) -> anyhow::Result<Vec<SafetyVerdict>> {
        let response = post_with_retry(
            &self.client,
            &self.endpoint,
            &SafetyRequest { items },
            self.retry_attempts,
            self.retry_base_delay,
        )
        .await?;

        let fallback = response
            .headers()
            .get(ML_FALLBACK_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if fallback {
            anyhow::bail!("safety service answered from ML fallback");
        }

        let body: SafetyResponse = response.json().await?;
        Ok(body.results)
    }
}
