use std::collections::HashSet;

use async_trait::async_trait;

use crate::models::{FeedCandidate, FeedQuery};
use crate::pipeline::{CandidateFilter, FilterOutcome};

fn intersects(candidate: &FeedCandidate, ids: &HashSet<&str>) -> bool {
    candidate
        .related_ids()
        .iter()
        .any(|id| ids.contains(id))
}

/// Drops posts the viewer already looked at. Matching runs over the whole
/// related-id set, so a repost of a seen original counts as seen too.
/// Client-echoed `seen_ids` win over the server-tracked set.
pub struct SeenPostsFilter;

#[async_trait]
impl CandidateFilter for SeenPostsFilter {
    fn name(&self) -> &'static str {
        "SeenPostsFilter"
    }

    fn enable(&self, query: &FeedQuery) -> bool {
        !query.seen_ids.is_empty() || !query.user_features.seen_post_ids.is_empty()
    }

    async fn filter(
        &self,
        query: &FeedQuery,
        candidates: Vec<FeedCandidate>,
    ) -> anyhow::Result<FilterOutcome> {
        let seen: HashSet<&str> = if !query.seen_ids.is_empty() {
            query.seen_ids.iter().map(String::as_str).collect()
        } else {
            query
                .user_features
                .seen_post_ids
                .iter()
                .map(String::as_str)
                .collect()
        };

        let mut outcome = FilterOutcome::default();
        for candidate in candidates {
            if intersects(&candidate, &seen) {
                outcome.removed.push(candidate);
            } else {
                outcome.kept.push(candidate);
            }
        }
        Ok(outcome)
    }
}

/// Keeps paging requests from re-serving earlier pages. Runs only on bottom
/// requests with a client-echoed served set; top-of-feed refreshes are
/// allowed to repeat.
pub struct PreviouslyServedFilter;

#[async_trait]
impl CandidateFilter for PreviouslyServedFilter {
    fn name(&self) -> &'static str {
        "PreviouslyServedFilter"
    }

    fn enable(&self, query: &FeedQuery) -> bool {
        query.is_bottom_request && !query.served_ids.is_empty()
    }

    async fn filter(
        &self,
        query: &FeedQuery,
        candidates: Vec<FeedCandidate>,
    ) -> anyhow::Result<FilterOutcome> {
        let served: HashSet<&str> = query.served_ids.iter().map(String::as_str).collect();
        let mut outcome = FilterOutcome::default();
        for candidate in candidates {
            if intersects(&candidate, &served) {
                outcome.removed.push(candidate);
            } else {
                outcome.kept.push(candidate);
            }
        }
        Ok(outcome)
    }
}
