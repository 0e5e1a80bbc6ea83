use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::clients::{AnnClient, AnnRequest};
use crate::models::{FeedCandidate, FeedQuery, PostQuery, PostRecord};
use crate::pipeline::Source;
use crate::stores::ContentStore;

const MAX_PROFILE_POSTS: usize = 200;
const MAX_HISTORY_IDS: usize = 50;
const MAX_PROFILE_KEYWORDS: usize = 20;
const POOL_SIZE: usize = 400;
const POOL_WINDOW_DAYS: i64 = 7;
const POOL_MIN_ENGAGEMENT: u64 = 3;
const MAX_RESULTS: usize = 80;

const SIMILARITY_WEIGHT: f64 = 0.7;
const ENGAGEMENT_WEIGHT: f64 = 0.3;

/// Interest-based retrieval. The user tower is a keyword-count profile
/// built from the posts the viewer recently engaged with; the item tower is
/// each post's keyword set. With an ANN endpoint the match runs remotely;
/// without one the source scores a local candidate pool by cosine
/// similarity blended with an engagement prior.
pub struct TwoTowerSource {
    content: Arc<dyn ContentStore>,
    ann: Option<Arc<dyn AnnClient>>,
}

impl TwoTowerSource {
    pub fn new(content: Arc<dyn ContentStore>, ann: Option<Arc<dyn AnnClient>>) -> Self {
        Self { content, ann }
    }

    async fn keyword_profile(&self, query: &FeedQuery) -> anyhow::Result<HashMap<String, f64>> {
        let target_ids: Vec<String> = query
            .user_action_sequence
            .iter()
            .filter_map(|a| a.target_post_id.clone())
            .take(MAX_PROFILE_POSTS)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if target_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let posts = self.content.find_by_ids(&target_ids).await?;
        let mut profile: HashMap<String, f64> = HashMap::new();
        for post in &posts {
            for keyword in &post.keywords {
                *profile.entry(keyword.to_lowercase()).or_default() += 1.0;
            }
        }
        Ok(profile)
    }

    fn similarity(profile: &HashMap<String, f64>, post: &PostRecord) -> f64 {
        if profile.is_empty() || post.keywords.is_empty() {
            return 0.0;
        }
        let dot: f64 = post
            .keywords
            .iter()
            .filter_map(|k| profile.get(&k.to_lowercase()))
            .sum();
        if dot == 0.0 {
            return 0.0;
        }
        let user_norm: f64 = profile.values().map(|c| c * c).sum::<f64>().sqrt();
        let post_norm = (post.keywords.len() as f64).sqrt();
        dot / (user_norm * post_norm)
    }

    async fn retrieve_remote(
        &self,
        ann: &Arc<dyn AnnClient>,
        query: &FeedQuery,
        profile: &HashMap<String, f64>,
    ) -> anyhow::Result<Vec<FeedCandidate>> {
        let mut ranked: Vec<(&String, &f64)> = profile.iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
        let keywords: Vec<String> = ranked
            .into_iter()
            .take(MAX_PROFILE_KEYWORDS)
            .map(|(k, _)| k.clone())
            .collect();
        let history_post_ids: Vec<String> = query
            .user_action_sequence
            .iter()
            .filter_map(|a| a.target_post_id.clone())
            .take(MAX_HISTORY_IDS)
            .collect();

        let hits = ann
            .retrieve(&AnnRequest {
                user_id: query.user_id.clone(),
                keywords,
                history_post_ids,
                top_k: MAX_RESULTS,
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

    async fn retrieve_local(
        &self,
        profile: &HashMap<String, f64>,
    ) -> anyhow::Result<Vec<FeedCandidate>> {
        let pool = self
            .content
            .find_posts(&PostQuery {
                created_after: Some(Utc::now() - Duration::days(POOL_WINDOW_DAYS)),
                is_news: Some(false),
                min_engagement: Some(POOL_MIN_ENGAGEMENT),
                limit: POOL_SIZE,
                ..PostQuery::default()
            })
            .await?;

        let mut scored: Vec<(f64, FeedCandidate)> = pool
            .iter()
            .map(|post| {
                let candidate = FeedCandidate::from_post(post);
                let engagement = (candidate.engagement_score() as f64 / 100.0).min(1.0);
                let combined = Self::similarity(profile, post) * SIMILARITY_WEIGHT
                    + engagement * ENGAGEMENT_WEIGHT;
                (combined, candidate)
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored
            .into_iter()
            .take(MAX_RESULTS)
            .map(|(_, c)| c)
            .collect())
    }
}

#[async_trait]
impl Source for TwoTowerSource {
    fn name(&self) -> &'static str {
        "TwoTowerSource"
    }

    fn enable(&self, query: &FeedQuery) -> bool {
        !query.in_network_only && !query.user_action_sequence.is_empty()
    }

    async fn get_candidates(&self, query: &FeedQuery) -> anyhow::Result<Vec<FeedCandidate>> {
        let profile = self.keyword_profile(query).await?;
        match &self.ann {
            Some(ann) => self.retrieve_remote(ann, query, &profile).await,
            None => self.retrieve_local(&profile).await,
        }
    }
}
