use std::cmp::Ordering;

use crate::models::{FeedCandidate, FeedQuery, ScoredCandidate};
use crate::pipeline::Selector;

/// Orders by final score and keeps an oversampled working set.
///
/// Post-selection hydration and visibility filtering still run after this
/// cut, so the selector keeps `limit * oversample_factor` candidates; the
/// orchestrator trims to the requested page size at the very end.
pub struct TopScoreSelector {
    oversample_factor: usize,
}

impl TopScoreSelector {
    pub fn new(oversample_factor: usize) -> Self {
        Self {
            oversample_factor: oversample_factor.max(1),
        }
    }
}

impl Selector for TopScoreSelector {
    fn name(&self) -> &'static str {
        "TopScoreSelector"
    }

    fn select(&self, query: &FeedQuery, candidates: Vec<ScoredCandidate>) -> Vec<FeedCandidate> {
        let mut ranked = candidates;
        // Stable sort: ties keep their upstream order.
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        ranked.truncate(query.limit.saturating_mul(self.oversample_factor));
        ranked.into_iter().map(|s| s.candidate).collect()
    }
}
