use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::FeedCandidate;

/// Candidate paired with the score the most recent scorer assigned.
///
/// Scorers hand these back; the orchestrator folds the wrapper score onto the
/// candidate and accumulates the per-scorer breakdown for debug output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: FeedCandidate,
    pub score: f64,
    /// Scorer name to contribution, merged across stages.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub breakdown: HashMap<String, f64>,
}

impl ScoredCandidate {
    pub fn new(candidate: FeedCandidate, score: f64) -> Self {
        Self {
            candidate,
            score,
            breakdown: HashMap::new(),
        }
    }

    pub fn with_breakdown(mut self, scorer: &str, value: f64) -> Self {
        self.breakdown.insert(scorer.to_string(), value);
        self
    }
}
