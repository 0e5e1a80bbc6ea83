use std::sync::Arc;

use async_trait::async_trait;

use super::FollowingTimelineReader;
use crate::models::{FeedCandidate, FeedQuery};
use crate::pipeline::Source;

/// Posts from accounts the viewer follows, newest first. The backbone of
/// the feed; everything it returns is in-network by definition.
pub struct FollowingSource {
    reader: Arc<FollowingTimelineReader>,
}

impl FollowingSource {
    pub fn new(reader: Arc<FollowingTimelineReader>) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl Source for FollowingSource {
    fn name(&self) -> &'static str {
        "FollowingSource"
    }

    fn enable(&self, query: &FeedQuery) -> bool {
        !query.user_features.followed_user_ids.is_empty()
    }

    async fn get_candidates(&self, query: &FeedQuery) -> anyhow::Result<Vec<FeedCandidate>> {
        let authors: Vec<String> = query
            .user_features
            .followed_user_ids
            .iter()
            .cloned()
            .collect();
        let posts = self.reader.fetch(&authors, query.limit, query.cursor).await?;

        Ok(posts
            .iter()
            .map(|post| {
                let mut candidate = FeedCandidate::from_post(post);
                candidate.in_network = true;
                candidate
            })
            .collect())
    }
}
