use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use super::{http_client, post_with_retry};
use crate::config::ClientsConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphRecallType {
    FriendOfFriend,
    SimilarUser,
    TopicInterest,
    EngagementChain,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphRecallRequest {
    pub user_id: String,
    pub types: Vec<GraphRecallType>,
    pub limit_per_type: usize,
    pub max_total: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude_author_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphCandidate {
    pub post_id: String,
    pub score: f64,
    pub recall_type: GraphRecallType,
    /// Intermediate user for second-degree paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphResponse {
    #[serde(default)]
    candidates: Vec<GraphCandidate>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait GraphClient: Send + Sync {
    async fn recall(&self, request: &GraphRecallRequest) -> anyhow::Result<Vec<GraphCandidate>>;
}

pub struct HttpGraphClient {
    client: reqwest::Client,
    endpoint: String,
    retry_attempts: u32,
    retry_base_delay: Duration,
}

impl HttpGraphClient {
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
impl GraphClient for HttpGraphClient {
    async fn recall(&self, request: &GraphRecallRequest) -> anyhow::Result<Vec<GraphCandidate>> {
        let response = post_with_retry(
            &self.client,
            &self.endpoint,
            request,
            self.retry_attempts,
            self.retry_base_delay,
        )
        .await?;
        let body: GraphResponse = response.json().await?;
        Ok(body.candidates)
    }
}
