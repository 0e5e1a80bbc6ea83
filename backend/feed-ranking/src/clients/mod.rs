// HTTP clients for the ML sidecar services. Each client is a trait so
// stages can run against fakes; the HTTP implementations share one retry
// helper.

mod ann;
mod graph;
mod prediction;
mod safety;

pub use ann::{AnnClient, AnnHit, AnnRequest, HttpAnnClient};
pub use graph::{
    GraphCandidate, GraphClient, GraphRecallRequest, GraphRecallType, HttpGraphClient,
};
pub use prediction::{
    HttpPredictionClient, PhoenixPrediction, PredictionCandidate, PredictionClient,
    PredictionRequest,
};
pub use safety::{HttpSafetyClient, SafetyCheckItem, SafetyClient, SafetyVerdict};

#[cfg(test)]
pub use ann::MockAnnClient;
#[cfg(test)]
pub use graph::MockGraphClient;
#[cfg(test)]
pub use prediction::MockPredictionClient;
#[cfg(test)]
pub use safety::MockSafetyClient;

use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::config::ClientsConfig;

pub(crate) fn http_client(config: &ClientsConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(config.request_timeout_ms))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// POST with linear-backoff retries. Any non-2xx status counts as a failed
/// attempt; the last error is surfaced when all attempts are spent.
pub(crate) async fn post_with_retry<Req: Serialize + Sync>(
    client: &reqwest::Client,
    url: &str,
    payload: &Req,
    attempts: u32,
    base_delay: Duration,
) -> anyhow::Result<reqwest::Response> {
    let mut last_error = None;
    for attempt in 0..=attempts {
        if attempt > 0 {
            tokio::time::sleep(base_delay * attempt).await;
        }
        match client.post(url).json(payload).send().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => {
                warn!(url, status = %response.status(), attempt, "upstream returned error status");
                last_error = Some(anyhow::anyhow!("{url} returned {}", response.status()));
            }
            Err(err) => {
                warn!(url, error = %err, attempt, "upstream request failed");
                last_error = Some(err.into());
            }
        }
    }
    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("request to {url} never attempted")))
}
