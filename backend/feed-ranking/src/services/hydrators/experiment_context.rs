use std::sync::Arc;

use async_trait::async_trait;

use crate::experiment::ExperimentRegistry;
use crate::models::{FeedQuery, QueryUpdate};
use crate::pipeline::QueryHydrator;

/// Resolves the user's experiment assignments and attaches them to the
/// query, so downstream stages read flags synchronously. Resolution is
/// in-process consistent hashing; this hydrator cannot fail.
pub struct ExperimentContextQueryHydrator {
    registry: Arc<ExperimentRegistry>,
}

impl ExperimentContextQueryHydrator {
    pub fn new(registry: Arc<ExperimentRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl QueryHydrator for ExperimentContextQueryHydrator {
    fn name(&self) -> &'static str {
        "ExperimentContextQueryHydrator"
    }

    async fn hydrate(&self, query: &FeedQuery) -> anyhow::Result<QueryUpdate> {
        Ok(QueryUpdate {
            experiment_context: Some(self.registry.context_for(&query.user_id)),
            ..QueryUpdate::default()
        })
    }
}
