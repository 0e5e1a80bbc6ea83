use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::models::{FeedCandidate, FeedQuery, PostQuery, PostRecord};
use crate::pipeline::Source;
use crate::stores::ContentStore;

const MAX_RESULTS: usize = 50;
// Lower floor and wider window than PopularSource: new accounts get a
// longer tail of proven content.
const MIN_ENGAGEMENT: u64 = 3;
const MAX_AGE_DAYS: i64 = 14;
/// Per-supplier cap (author for social posts, publisher for news), so a
/// handful of prolific accounts cannot own the first feed a new user sees.
const PER_SUPPLIER_LIMIT: usize = 3;

/// Bootstrap source for accounts that follow nobody yet.
pub struct ColdStartSource {
    content: Arc<dyn ContentStore>,
}

impl ColdStartSource {
    pub fn new(content: Arc<dyn ContentStore>) -> Self {
        Self { content }
    }

    fn apply_supplier_diversity(candidates: Vec<FeedCandidate>) -> Vec<FeedCandidate> {
        let mut per_supplier: HashMap<String, usize> = HashMap::new();
        let mut kept = Vec::new();
        for candidate in candidates {
            let count = per_supplier.entry(candidate.supplier_key()).or_insert(0);
            if *count < PER_SUPPLIER_LIMIT {
                *count += 1;
                kept.push(candidate);
            }
            if kept.len() >= MAX_RESULTS {
                break;
            }
        }
        kept
    }
}

#[async_trait]
impl Source for ColdStartSource {
    fn name(&self) -> &'static str {
        "ColdStartSource"
    }

    fn enable(&self, query: &FeedQuery) -> bool {
        query.user_features.followed_user_ids.is_empty()
    }

    async fn get_candidates(&self, query: &FeedQuery) -> anyhow::Result<Vec<FeedCandidate>> {
        let mut posts = self
            .content
            .find_posts(&PostQuery {
                exclude_author_ids: vec![query.user_id.clone()],
                created_after: Some(Utc::now() - Duration::days(MAX_AGE_DAYS)),
                created_before: query.cursor,
                min_engagement: Some(MIN_ENGAGEMENT),
                // Overfetch so the diversity cut still fills the page.
                limit: MAX_RESULTS * 2,
                ..PostQuery::default()
            })
            .await?;
        posts.retain(|p| !p.is_reply);
        posts.sort_by(|a, b| {
            b.engagement_score()
                .cmp(&a.engagement_score())
                .then(b.created_at.cmp(&a.created_at))
        });

        let candidates = posts.iter().map(FeedCandidate::from_post).collect();
        Ok(Self::apply_supplier_diversity(candidates))
    }
}
