use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use super::{http_client, post_with_retry};
use crate::config::ClientsConfig;
use crate::models::{ModelAction, PhoenixScores};

/// Candidate descriptor sent to the prediction service. `post_id` is the
/// model-vocabulary id (external id for news).
#[derive(Debug, Clone, Serialize)]
pub struct PredictionCandidate {
    pub post_id: String,
    pub author_id: String,
    pub in_network: bool,
    pub has_video: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_duration_sec: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionRequest {
    pub user_id: String,
    pub user_action_sequence: Vec<ModelAction>,
    pub candidates: Vec<PredictionCandidate>,
}

/// One per-candidate prediction row. Engagement heads the model did not
/// return stay `None`; partial coverage is expected, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoenixPrediction {
    pub post_id: String,
    #[serde(flatten)]
    pub scores: PhoenixScores,
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    #[serde(default)]
    predictions: Vec<PhoenixPrediction>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PredictionClient: Send + Sync {
    async fn predict(&self, request: &PredictionRequest)
        -> anyhow::Result<Vec<PhoenixPrediction>>;
}

pub struct HttpPredictionClient {
    client: reqwest::Client,
    endpoint: String,
    retry_attempts: u32,
    retry_base_delay: Duration,
}

impl HttpPredictionClient {
    pub fn new(endpoint: impl Into<String>, config: &ClientsConfig) -> Self {
        Self {
            client: http_client(config),
            endpoint: endpoint.into(),
            retry_attempts: config.retry_attempts,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }
}

#[async_trait]
impl PredictionClient for HttpPredictionClient {
    async fn predict(
        &self,
        request: &PredictionRequest,
    ) -> anyhow::Result<Vec<PhoenixPrediction>> {
        let response = post_with_retry(
            &self.client,
            &self.endpoint,
            request,
            self.retry_attempts,
            self.retry_base_delay,
        )
        .await?;
        let body: PredictionResponse = response.json().await?;
        Ok(body.predictions)
    }
}
