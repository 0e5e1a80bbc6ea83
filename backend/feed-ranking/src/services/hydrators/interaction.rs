use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{FeedCandidate, FeedQuery};
use crate::pipeline::CandidateHydrator;
use crate::stores::InteractionStore;

/// Marks which candidates the viewer already liked or reposted, so the
/// client can render the buttons in the right state.
pub struct UserInteractionHydrator {
    interactions: Arc<dyn InteractionStore>,
}

impl UserInteractionHydrator {
    pub fn new(interactions: Arc<dyn InteractionStore>) -> Self {
        Self { interactions }
    }
}

#[async_trait]
impl CandidateHydrator for UserInteractionHydrator {
    fn name(&self) -> &'static str {
        "UserInteractionHydrator"
    }

    async fn hydrate(
        &self,
        query: &FeedQuery,
        candidates: &[FeedCandidate],
    ) -> anyhow::Result<Vec<FeedCandidate>> {
        let post_ids: Vec<String> = candidates.iter().map(|c| c.post_id.clone()).collect();
        let flags = self
            .interactions
            .engagement_flags(&query.user_id, &post_ids)
            .await?;

        Ok(candidates
            .iter()
            .map(|candidate| {
                let mut out = candidate.clone();
                out.is_liked_by_user = flags.liked.contains(&candidate.post_id);
                out.is_reposted_by_user = flags.reposted.contains(&candidate.post_id);
                out
            })
            .collect())
    }

    fn update(&self, current: &mut FeedCandidate, hydrated: &FeedCandidate) {
        current.is_liked_by_user = hydrated.is_liked_by_user;
        current.is_reposted_by_user = hydrated.is_reposted_by_user;
    }
}
