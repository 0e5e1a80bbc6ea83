use std::collections::HashSet;

use async_trait::async_trait;

use crate::models::{FeedCandidate, FeedQuery};
use crate::pipeline::{CandidateFilter, FilterOutcome};

/// Cross-source duplicate removal by post id; first occurrence wins, which
/// preserves the source registration order as the tie-break.
pub struct DedupFilter;

#[async_trait]
impl CandidateFilter for DedupFilter {
    fn name(&self) -> &'static str {
        "DedupFilter"
    }

    async fn filter(
        &self,
        _query: &FeedQuery,
        candidates: Vec<FeedCandidate>,
    ) -> anyhow::Result<FilterOutcome> {
        let mut seen = HashSet::new();
        let mut outcome = FilterOutcome::default();
        for candidate in candidates {
            if seen.insert(candidate.post_id.clone()) {
                outcome.kept.push(candidate);
            } else {
                outcome.removed.push(candidate);
            }
        }
        Ok(outcome)
    }
}

/// Collapses repost chains: a repost and its original compete for one
/// slot under the canonical id `original_post_id ?? post_id`.
pub struct RepostDedupFilter;

#[async_trait]
impl CandidateFilter for RepostDedupFilter {
    fn name(&self) -> &'static str {
        "RepostDedupFilter"
    }

    async fn filter(
        &self,
        _query: &FeedQuery,
        candidates: Vec<FeedCandidate>,
    ) -> anyhow::Result<FilterOutcome> {
        let mut seen = HashSet::new();
        let mut outcome = FilterOutcome::default();
        for candidate in candidates {
            let key = candidate
                .original_post_id
                .clone()
                .unwrap_or_else(|| candidate.post_id.clone());
            if seen.insert(key) {
                outcome.kept.push(candidate);
            } else {
                outcome.removed.push(candidate);
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PostRecord;

    fn candidate(id: &str) -> FeedCandidate {
        FeedCandidate::from_post(&PostRecord {
            id: id.to_string(),
            author_id: "a1".to_string(),
            ..PostRecord::default()
        })
    }

    fn repost(id: &str, original: &str) -> FeedCandidate {
        FeedCandidate::from_post(&PostRecord {
            id: id.to_string(),
            author_id: "a1".to_string(),
            is_repost: true,
            original_post_id: Some(original.to_string()),
            ..PostRecord::default()
        })
    }

    #[tokio::test]
    async fn keeps_first_occurrence_per_post_id() {
        let outcome = DedupFilter
            .filter(
                &FeedQuery::new("u1", 20),
                vec![candidate("p1"), candidate("p2"), candidate("p1")],
            )
            .await
            .unwrap();
        assert_eq!(outcome.kept.len(), 2);
        assert_eq!(outcome.removed.len(), 1);
        assert_eq!(outcome.removed[0].post_id, "p1");
    }

    #[tokio::test]
    async fn repost_and_original_share_one_slot() {
        let outcome = RepostDedupFilter
            .filter(
                &FeedQuery::new("u1", 20),
                vec![repost("p2", "p1"), candidate("p1"), repost("p3", "p1")],
            )
            .await
            .unwrap();
        assert_eq!(
            outcome.kept.iter().map(|c| c.post_id.as_str()).collect::<Vec<_>>(),
            ["p2"]
        );
        assert_eq!(outcome.removed.len(), 2);
    }
}
