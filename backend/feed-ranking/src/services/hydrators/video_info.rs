use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{FeedCandidate, FeedQuery};
use crate::pipeline::CandidateHydrator;
use crate::stores::ContentStore;

/// Backfills media fields for candidates that arrived from sources that
/// only carry ids (ANN hits, graph walks). Candidates that already know
/// they have video are left alone.
pub struct VideoInfoHydrator {
    content: Arc<dyn ContentStore>,
}

impl VideoInfoHydrator {
    pub fn new(content: Arc<dyn ContentStore>) -> Self {
        Self { content }
    }
}

#[async_trait]
impl CandidateHydrator for VideoInfoHydrator {
    fn name(&self) -> &'static str {
        "VideoInfoHydrator"
    }

    async fn hydrate(
        &self,
        _query: &FeedQuery,
        candidates: &[FeedCandidate],
    ) -> anyhow::Result<Vec<FeedCandidate>> {
        let missing: Vec<String> = candidates
            .iter()
            .filter(|c| !c.has_video && c.video_duration_sec.is_none())
            .map(|c| c.post_id.clone())
            .collect();
        if missing.is_empty() {
            return Ok(candidates.to_vec());
        }

        let posts = self.content.find_by_ids(&missing).await?;
        let by_id: std::collections::HashMap<&str, _> =
            posts.iter().map(|p| (p.id.as_str(), p)).collect();

        Ok(candidates
            .iter()
            .map(|candidate| {
                let mut out = candidate.clone();
                if let Some(post) = by_id.get(candidate.post_id.as_str()) {
                    out.has_video = post.has_video;
                    out.has_image = post.has_image;
                    out.video_duration_sec = post.video_duration_sec;
                    out.is_nsfw = post.is_nsfw;
                }
                out
            })
            .collect())
    }

    fn update(&self, current: &mut FeedCandidate, hydrated: &FeedCandidate) {
        current.has_video = hydrated.has_video;
        current.has_image = hydrated.has_image;
        current.video_duration_sec = hydrated.video_duration_sec;
        current.is_nsfw = hydrated.is_nsfw;
    }
}
