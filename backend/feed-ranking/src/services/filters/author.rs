use async_trait::async_trait;

use crate::models::{FeedCandidate, FeedQuery};
use crate::pipeline::{CandidateFilter, FilterOutcome};

/// Never recommend the viewer's own posts back to them.
pub struct SelfPostFilter;

#[async_trait]
impl CandidateFilter for SelfPostFilter {
    fn name(&self) -> &'static str {
        "SelfPostFilter"
    }

    async fn filter(
        &self,
        query: &FeedQuery,
        candidates: Vec<FeedCandidate>,
    ) -> anyhow::Result<FilterOutcome> {
        let mut outcome = FilterOutcome::default();
        for candidate in candidates {
            if candidate.author_id == query.user_id {
                outcome.removed.push(candidate);
            } else {
                outcome.kept.push(candidate);
            }
        }
        Ok(outcome)
    }
}

/// Drops posts by authors the viewer blocked.
pub struct BlockedAuthorFilter;

#[async_trait]
impl CandidateFilter for BlockedAuthorFilter {
    fn name(&self) -> &'static str {
        "BlockedAuthorFilter"
    }

    fn enable(&self, query: &FeedQuery) -> bool {
        !query.user_features.blocked_user_ids.is_empty()
    }

    async fn filter(
        &self,
        query: &FeedQuery,
        candidates: Vec<FeedCandidate>,
    ) -> anyhow::Result<FilterOutcome> {
        let blocked = &query.user_features.blocked_user_ids;
        let mut outcome = FilterOutcome::default();
        for candidate in candidates {
            if blocked.contains(&candidate.author_id) {
                outcome.removed.push(candidate);
            } else {
                outcome.kept.push(candidate);
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PostRecord;

    fn by(author: &str, id: &str) -> FeedCandidate {
        FeedCandidate::from_post(&PostRecord {
            id: id.to_string(),
            author_id: author.to_string(),
            ..PostRecord::default()
        })
    }

    #[tokio::test]
    async fn removes_own_posts() {
        let outcome = SelfPostFilter
            .filter(
                &FeedQuery::new("u1", 20),
                vec![by("u1", "p1"), by("a2", "p2")],
            )
            .await
            .unwrap();
        assert_eq!(outcome.kept.len(), 1);
        assert_eq!(outcome.removed[0].post_id, "p1");
    }

    #[tokio::test]
    async fn blocked_filter_gated_on_non_empty_block_list() {
        let mut query = FeedQuery::new("u1", 20);
        assert!(!BlockedAuthorFilter.enable(&query));

        query
            .user_features
            .blocked_user_ids
            .insert("a2".to_string());
        assert!(BlockedAuthorFilter.enable(&query));

        let outcome = BlockedAuthorFilter
            .filter(&query, vec![by("a2", "p1"), by("a3", "p2")])
            .await
            .unwrap();
        assert_eq!(outcome.kept[0].post_id, "p2");
        assert_eq!(outcome.removed[0].post_id, "p1");
    }
}
