use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{FeedQuery, QueryUpdate};
use crate::pipeline::QueryHydrator;
use crate::stores::InteractionStore;

/// How much interaction history the scorers get to look at.
const MAX_ACTION_HISTORY: usize = 200;

/// Loads the viewer's recent interaction history for the behavioral scorers
/// and the two-tower source.
pub struct UserActionSeqQueryHydrator {
    interactions: Arc<dyn InteractionStore>,
}

impl UserActionSeqQueryHydrator {
    pub fn new(interactions: Arc<dyn InteractionStore>) -> Self {
        Self { interactions }
    }
}

#[async_trait]
impl QueryHydrator for UserActionSeqQueryHydrator {
    fn name(&self) -> &'static str {
        "UserActionSeqQueryHydrator"
    }

    async fn hydrate(&self, query: &FeedQuery) -> anyhow::Result<QueryUpdate> {
        let actions = self
            .interactions
            .recent_actions(&query.user_id, MAX_ACTION_HISTORY)
            .await?;
        Ok(QueryUpdate {
            user_action_sequence: Some(actions),
            ..QueryUpdate::default()
        })
    }
}
