use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{FeedQuery, ModelAction, QueryUpdate};
use crate::pipeline::QueryHydrator;
use crate::stores::{ContentStore, InteractionStore};
use crate::utils::action_labels::MODEL_SEQUENCE_ACTION_TYPES;

/// The prediction service looks at this many history entries at most.
const MAX_SEQUENCE_LENGTH: usize = 50;

/// How much raw history we pull when the action sequence was not already
/// hydrated by an earlier stage.
const MAX_RAW_ACTIONS: usize = 200;

/// Builds the news-model context: the viewer's recent engagement history
/// translated into the external corpus ids the prediction service is keyed
/// by.
///
/// Runs in the same hydration wave as `UserActionSeqQueryHydrator`, so it
/// loads its own copy of the history rather than racing on the shared query.
pub struct NewsModelContextQueryHydrator {
    interactions: Arc<dyn InteractionStore>,
    content: Arc<dyn ContentStore>,
}

impl NewsModelContextQueryHydrator {
    pub fn new(interactions: Arc<dyn InteractionStore>, content: Arc<dyn ContentStore>) -> Self {
        Self {
            interactions,
            content,
        }
    }
}

#[async_trait]
impl QueryHydrator for NewsModelContextQueryHydrator {
    fn name(&self) -> &'static str {
        "NewsModelContextQueryHydrator"
    }

    async fn hydrate(&self, query: &FeedQuery) -> anyhow::Result<QueryUpdate> {
        let loaded;
        let actions = if query.user_action_sequence.is_empty() {
            loaded = self
                .interactions
                .recent_actions(&query.user_id, MAX_RAW_ACTIONS)
                .await?;
            &loaded
        } else {
            &query.user_action_sequence
        };

        let model_actions: Vec<_> = actions
            .iter()
            .filter(|a| MODEL_SEQUENCE_ACTION_TYPES.contains(&a.action_type.as_str()))
            .filter(|a| a.target_post_id.is_some())
            .collect();
        if model_actions.is_empty() {
            return Ok(QueryUpdate::default());
        }

        let post_ids: Vec<String> = model_actions
            .iter()
            .filter_map(|a| a.target_post_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let posts = self.content.find_by_ids(&post_ids).await?;

        // Only engagements on news posts with an external corpus id count.
        let external_by_post: HashMap<&str, &str> = posts
            .iter()
            .filter(|p| p.is_news)
            .filter_map(|p| {
                p.news_metadata
                    .as_ref()
                    .and_then(|m| m.external_id.as_deref())
                    .map(|ext| (p.id.as_str(), ext))
            })
            .collect();

        let mut history: Vec<String> = Vec::new();
        let mut seen_external: HashSet<&str> = HashSet::new();
        let mut sequence: Vec<ModelAction> = Vec::new();
        for action in &model_actions {
            let Some(post_id) = action.target_post_id.as_deref() else {
                continue;
            };
            let Some(&external_id) = external_by_post.get(post_id) else {
                continue;
            };
            if sequence.len() < MAX_SEQUENCE_LENGTH {
                sequence.push(ModelAction {
                    external_id: external_id.to_string(),
                    action_label: action.action_type.clone(),
                    timestamp: action.created_at,
                });
            }
            if seen_external.insert(external_id) && history.len() < MAX_SEQUENCE_LENGTH {
                history.push(external_id.to_string());
            }
        }

        Ok(QueryUpdate {
            news_history_external_ids: Some(history),
            model_action_sequence: Some(sequence),
            ..QueryUpdate::default()
        })
    }
}
