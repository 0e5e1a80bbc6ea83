use std::collections::HashMap;

use async_trait::async_trait;

use crate::models::{FeedCandidate, FeedQuery};
use crate::pipeline::{CandidateFilter, FilterOutcome};

fn thread_key(candidate: &FeedCandidate) -> &str {
    candidate
        .conversation_id
        .as_deref()
        .unwrap_or(&candidate.post_id)
}

fn effective_score(candidate: &FeedCandidate) -> f64 {
    candidate
        .score
        .or(candidate.weighted_score)
        .unwrap_or(0.0)
}

/// Post-selection pass that keeps one post per conversation: the
/// highest-scored member wins, ties go to the earlier-ranked one.
pub struct ConversationDedupFilter;

#[async_trait]
impl CandidateFilter for ConversationDedupFilter {
    fn name(&self) -> &'static str {
        "ConversationDedupFilter"
    }

    async fn filter(
        &self,
        _query: &FeedQuery,
        candidates: Vec<FeedCandidate>,
    ) -> anyhow::Result<FilterOutcome> {
        let mut best: HashMap<String, usize> = HashMap::new();
        for (index, candidate) in candidates.iter().enumerate() {
            let key = thread_key(candidate).to_string();
            match best.get(&key) {
                Some(&winner) if effective_score(&candidates[winner])
                    >= effective_score(candidate) => {}
                _ => {
                    best.insert(key, index);
                }
            }
        }

        let winners: std::collections::HashSet<usize> = best.into_values().collect();
        let mut outcome = FilterOutcome::default();
        for (index, candidate) in candidates.into_iter().enumerate() {
            if winners.contains(&index) {
                outcome.kept.push(candidate);
            } else {
                outcome.removed.push(candidate);
            }
        }
        Ok(outcome)
    }
}
