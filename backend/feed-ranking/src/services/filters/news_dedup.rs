use std::collections::HashSet;

use async_trait::async_trait;

use crate::experiment::FEED_EXPERIMENT_ID;
use crate::models::{FeedCandidate, FeedQuery};
use crate::pipeline::{CandidateFilter, FilterOutcome};

/// News items can exist as several local posts pointing at the same external
/// corpus entry (ingest retries, multiple mirror accounts) or the same topic
/// cluster. Collapse them before scoring so the page never shows the same
/// story twice. Non-news candidates pass through untouched.
///
/// External-id dedup is always on; cluster dedup rides behind the
/// `enable_news_cluster_dedup` experiment flag.
pub struct NewsExternalIdDedupFilter;

#[async_trait]
impl CandidateFilter for NewsExternalIdDedupFilter {
    fn name(&self) -> &'static str {
        "NewsExternalIdDedupFilter"
    }

    async fn filter(
        &self,
        query: &FeedQuery,
        candidates: Vec<FeedCandidate>,
    ) -> anyhow::Result<FilterOutcome> {
        let cluster_dedup =
            query.experiment_flag(FEED_EXPERIMENT_ID, "enable_news_cluster_dedup", false);

        let mut seen_external: HashSet<String> = HashSet::new();
        let mut seen_cluster: HashSet<i64> = HashSet::new();
        let mut outcome = FilterOutcome::default();

        for candidate in candidates {
            if !candidate.is_news {
                outcome.kept.push(candidate);
                continue;
            }

            let external_id = candidate
                .news_metadata
                .as_ref()
                .and_then(|m| m.external_id.clone())
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| candidate.model_post_id.clone());
            let cluster_id = cluster_dedup
                .then(|| candidate.news_metadata.as_ref().and_then(|m| m.cluster_id))
                .flatten();

            if !external_id.is_empty() && seen_external.contains(&external_id) {
                outcome.removed.push(candidate);
                continue;
            }
            if let Some(cluster) = cluster_id {
                if seen_cluster.contains(&cluster) {
                    outcome.removed.push(candidate);
                    continue;
                }
                seen_cluster.insert(cluster);
            }
            if !external_id.is_empty() {
                seen_external.insert(external_id);
            }
            outcome.kept.push(candidate);
        }
        Ok(outcome)
    }
}
