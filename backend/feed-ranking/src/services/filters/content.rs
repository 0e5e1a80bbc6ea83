use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::models::{FeedCandidate, FeedQuery};
use crate::pipeline::{CandidateFilter, FilterOutcome};

/// Drops content older than the ranking window. Off for in-network-only
/// requests: a purely social feed should page back as far as the timeline
/// goes rather than come back empty.
pub struct AgeFilter {
    max_age_days: i64,
}

impl AgeFilter {
    pub fn new(max_age_days: i64) -> Self {
        Self { max_age_days }
    }
}

#[async_trait]
impl CandidateFilter for AgeFilter {
    fn name(&self) -> &'static str {
        "AgeFilter"
    }

    fn enable(&self, query: &FeedQuery) -> bool {
        !query.in_network_only
    }

    async fn filter(
        &self,
        _query: &FeedQuery,
        candidates: Vec<FeedCandidate>,
    ) -> anyhow::Result<FilterOutcome> {
        let cutoff = Utc::now() - Duration::days(self.max_age_days);
        let mut outcome = FilterOutcome::default();
        for candidate in candidates {
            if candidate.created_at < cutoff {
                outcome.removed.push(candidate);
            } else {
                outcome.kept.push(candidate);
            }
        }
        Ok(outcome)
    }
}

/// Case-insensitive substring match against the candidate text.
pub struct MutedKeywordFilter;

#[async_trait]
impl CandidateFilter for MutedKeywordFilter {
    fn name(&self) -> &'static str {
        "MutedKeywordFilter"
    }

    fn enable(&self, query: &FeedQuery) -> bool {
        !query.user_features.muted_keywords.is_empty()
    }

    async fn filter(
        &self,
        query: &FeedQuery,
        candidates: Vec<FeedCandidate>,
    ) -> anyhow::Result<FilterOutcome> {
        let muted: Vec<String> = query
            .user_features
            .muted_keywords
            .iter()
            .map(|k| k.to_lowercase())
            .collect();
        let mut outcome = FilterOutcome::default();
        for candidate in candidates {
            let text = candidate.text.to_lowercase();
            if muted.iter().any(|keyword| text.contains(keyword)) {
                outcome.removed.push(candidate);
            } else {
                outcome.kept.push(candidate);
            }
        }
        Ok(outcome)
    }
}
