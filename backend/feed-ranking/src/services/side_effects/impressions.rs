use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::models::{ExposureAction, FeedCandidate, FeedQuery};
use crate::pipeline::SideEffect;
use crate::stores::InteractionStore;

use super::exposure_records;

/// Interaction-store write batch size.
const FLUSH_CHUNK: usize = 50;

/// Writes one delivery record per served candidate. These are the exposure
/// half of the training joins: the client reports rendered impressions
/// separately, this logs what the ranker actually returned and at which rank.
pub struct ImpressionLogger {
    interactions: Arc<dyn InteractionStore>,
}

impl ImpressionLogger {
    pub fn new(interactions: Arc<dyn InteractionStore>) -> Self {
        Self { interactions }
    }
}

#[async_trait]
impl SideEffect for ImpressionLogger {
    fn name(&self) -> &'static str {
        "ImpressionLogger"
    }

    async fn run(&self, query: &FeedQuery, selected: &[FeedCandidate]) -> anyhow::Result<()> {
        if selected.is_empty() {
            return Ok(());
        }
        let records = exposure_records(query, selected, ExposureAction::Delivery);
        for chunk in records.chunks(FLUSH_CHUNK) {
            self.interactions.record_impressions(chunk).await?;
        }
        debug!(
            user_id = %query.user_id,
            count = records.len(),
            "logged delivery records"
        );
        Ok(())
    }
}
