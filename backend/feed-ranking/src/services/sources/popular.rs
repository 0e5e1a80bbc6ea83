use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::models::{FeedCandidate, FeedQuery, PostQuery};
use crate::pipeline::Source;
use crate::stores::ContentStore;

const WINDOW_DAYS: i64 = 7;
const MIN_ENGAGEMENT: u64 = 5;
const MAX_RESULTS: usize = 100;

/// Trending out-of-network posts: recent, above an engagement floor, not by
/// anyone the viewer already follows.
pub struct PopularSource {
    content: Arc<dyn ContentStore>,
}

impl PopularSource {
    pub fn new(content: Arc<dyn ContentStore>) -> Self {
        Self { content }
    }
}

#[async_trait]
impl Source for PopularSource {
    fn name(&self) -> &'static str {
        "PopularSource"
    }

    fn enable(&self, query: &FeedQuery) -> bool {
        !query.in_network_only
    }

    async fn get_candidates(&self, query: &FeedQuery) -> anyhow::Result<Vec<FeedCandidate>> {
        let mut exclude: Vec<String> = query
            .user_features
            .followed_user_ids
            .iter()
            .cloned()
            .collect();
        exclude.push(query.user_id.clone());

        let posts = self
            .content
            .find_posts(&PostQuery {
                exclude_author_ids: exclude,
                created_after: Some(Utc::now() - Duration::days(WINDOW_DAYS)),
                min_engagement: Some(MIN_ENGAGEMENT),
                limit: MAX_RESULTS,
                ..PostQuery::default()
            })
            .await?;

        let mut candidates: Vec<FeedCandidate> =
            posts.iter().map(FeedCandidate::from_post).collect();
        candidates.sort_by_key(|c| std::cmp::Reverse(c.engagement_score()));
        candidates.truncate(MAX_RESULTS);
        Ok(candidates)
    }
}
