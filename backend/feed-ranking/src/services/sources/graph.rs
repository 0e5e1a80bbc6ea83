use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::clients::{GraphClient, GraphRecallRequest, GraphRecallType};
use crate::models::{FeedCandidate, FeedQuery, PostRecord};
use crate::pipeline::Source;
use crate::stores::ContentStore;

const EXPERIMENT_ID: &str = "graph_recall_experiment";
const DEFAULT_LIMIT_PER_TYPE: u64 = 30;
const MAX_TOTAL: usize = 100;

const ENABLED_TYPES: &[GraphRecallType] = &[
    GraphRecallType::FriendOfFriend,
    GraphRecallType::SimilarUser,
    GraphRecallType::TopicInterest,
];

/// Recall through graph walks: friend-of-friend, similar-user and
/// topic-interest paths served by an external graph service. Off unless the
/// rollout experiment turns it on for the viewer.
pub struct GraphSource {
    content: Arc<dyn ContentStore>,
    client: Option<Arc<dyn GraphClient>>,
}

impl GraphSource {
    pub fn new(content: Arc<dyn ContentStore>, client: Option<Arc<dyn GraphClient>>) -> Self {
        Self { content, client }
    }
}

#[async_trait]
impl Source for GraphSource {
    fn name(&self) -> &'static str {
        "GraphSource"
    }

    fn enable(&self, query: &FeedQuery) -> bool {
        self.client.is_some()
            && !query.in_network_only
            && query.experiment_flag(EXPERIMENT_ID, "enable_graph_source", false)
    }

    async fn get_candidates(&self, query: &FeedQuery) -> anyhow::Result<Vec<FeedCandidate>> {
        let Some(client) = &self.client else {
            return Ok(Vec::new());
        };

        let limit_per_type =
            query.experiment_config(EXPERIMENT_ID, "graph_limit_per_type", DEFAULT_LIMIT_PER_TYPE);
        let mut exclude: Vec<String> = vec![query.user_id.clone()];
        exclude.extend(query.user_features.blocked_user_ids.iter().cloned());

        let hits = client
            .recall(&GraphRecallRequest {
                user_id: query.user_id.clone(),
                types: ENABLED_TYPES.to_vec(),
                limit_per_type: limit_per_type as usize,
                max_total: MAX_TOTAL,
                exclude_author_ids: exclude,
            })
            .await?;
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = hits.iter().map(|h| h.post_id.clone()).collect();
        let posts = self.content.find_by_ids(&ids).await?;
        let mut by_id: HashMap<String, PostRecord> =
            posts.into_iter().map(|p| (p.id.clone(), p)).collect();

        Ok(ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .map(|post| FeedCandidate::from_post(&post))
            .collect())
    }
}
