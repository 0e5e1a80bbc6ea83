use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::clients::{AnnClient, AnnRequest};
use crate::models::{FeedCandidate, FeedQuery, PostQuery, PostRecord};
use crate::pipeline::Source;
use crate::stores::ContentStore;

const ANN_MIN_TOP_K: usize = 200;
const ANN_MAX_TOP_K: usize = 1000;
const FALLBACK_MAX_RESULTS: usize = 80;

/// News retrieval over the external corpus. The ANN index speaks external
/// ids, so hits are mapped back to local posts through the news metadata;
/// the ANN ordering is the ranking signal and must survive hydration.
/// Without an index, or when it digs up nothing, the source degrades to the
/// most recent news.
pub struct NewsAnnSource {
    content: Arc<dyn ContentStore>,
    ann: Option<Arc<dyn AnnClient>>,
}

impl NewsAnnSource {
    pub fn new(content: Arc<dyn ContentStore>, ann: Option<Arc<dyn AnnClient>>) -> Self {
        Self { content, ann }
    }

    async fn retrieve_ann(
        &self,
        ann: &Arc<dyn AnnClient>,
        query: &FeedQuery,
    ) -> anyhow::Result<Vec<FeedCandidate>> {
        let top_k = (query.limit * 10).clamp(ANN_MIN_TOP_K, ANN_MAX_TOP_K);
        let hits = ann
            .retrieve(&AnnRequest {
                user_id: query.user_id.clone(),
                keywords: Vec::new(),
                history_post_ids: query.news_history_external_ids.clone(),
                top_k,
            })
            .await?;

        let external_ids: Vec<String> = hits
            .into_iter()
            .map(|h| h.post_id)
            .filter(|id| !id.is_empty())
            .collect();
        if external_ids.is_empty() {
            return Ok(Vec::new());
        }

        let posts = self.content.find_by_external_ids(&external_ids).await?;
        let mut by_external: HashMap<String, PostRecord> = posts
            .into_iter()
            .filter_map(|p| {
                p.news_metadata
                    .as_ref()
                    .and_then(|m| m.external_id.clone())
                    .map(|ext| (ext, p))
            })
            .collect();

        Ok(external_ids
            .iter()
            .filter_map(|ext| by_external.remove(ext))
            .map(|post| FeedCandidate::from_post(&post))
            .collect())
    }

    async fn recent_news(&self, query: &FeedQuery) -> anyhow::Result<Vec<FeedCandidate>> {
        let posts = self
            .content
            .find_posts(&PostQuery {
                is_news: Some(true),
                created_before: query.cursor,
                limit: FALLBACK_MAX_RESULTS,
                ..PostQuery::default()
            })
            .await?;
        Ok(posts.iter().map(FeedCandidate::from_post).collect())
    }
}

#[async_trait]
impl Source for NewsAnnSource {
    fn name(&self) -> &'static str {
        "NewsAnnSource"
    }

    fn enable(&self, query: &FeedQuery) -> bool {
        !query.in_network_only
    }

    async fn get_candidates(&self, query: &FeedQuery) -> anyhow::Result<Vec<FeedCandidate>> {
        if let Some(ann) = &self.ann {
            match self.retrieve_ann(ann, query).await {
                Ok(candidates) if !candidates.is_empty() => return Ok(candidates),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "news retrieval failed, serving recency fallback"),
            }
        }
        self.recent_news(query).await
    }
}
