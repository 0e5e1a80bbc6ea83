use async_trait::async_trait;

use crate::config::RankingConfig;
use crate::models::{FeedCandidate, FeedQuery, ScoredCandidate};
use crate::pipeline::Scorer;

/// Final scoring pass: discounts out-of-network candidates by a flat factor
/// so discovery content has to clearly beat followed authors to place. Runs
/// exactly once, last, on the already-diversified `score`.
pub struct OonScorer {
    oon_factor: f64,
}

impl OonScorer {
    pub fn new(config: &RankingConfig) -> Self {
        Self {
            oon_factor: config.oon_factor,
        }
    }
}

#[async_trait]
impl Scorer for OonScorer {
    fn name(&self) -> &'static str {
        "OonScorer"
    }

    fn enable(&self, _query: &FeedQuery) -> bool {
        true
    }

    async fn score(
        &self,
        _query: &FeedQuery,
        candidates: &[FeedCandidate],
    ) -> anyhow::Result<Vec<ScoredCandidate>> {
        Ok(candidates
            .iter()
            .map(|candidate| {
                let factor = if candidate.in_network {
                    1.0
                } else {
                    self.oon_factor
                };
                let base = candidate
                    .score
                    .or(candidate.weighted_score)
                    .unwrap_or(0.0);
                let mut out = candidate.clone();
                let adjusted = base * factor;
                out.score = Some(adjusted);
                ScoredCandidate::new(out, adjusted).with_breakdown(self.name(), factor)
            })
            .collect())
    }

    fn update(&self, current: &mut FeedCandidate, scored: &ScoredCandidate) {
        current.score = scored.candidate.score;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PostRecord;

    fn candidate(id: &str, in_network: bool, score: f64) -> FeedCandidate {
        let mut c = FeedCandidate::from_post(&PostRecord {
            id: id.to_string(),
            author_id: "a1".to_string(),
            ..PostRecord::default()
        });
        c.in_network = in_network;
        c.score = Some(score);
        c
    }

    #[tokio::test]
    async fn discounts_only_out_of_network() {
        let scorer = OonScorer::new(&RankingConfig::default());
        let out = scorer
            .score(
                &FeedQuery::new("u1", 20),
                &[candidate("p1", true, 1.0), candidate("p2", false, 1.0)],
            )
            .await
            .unwrap();

        assert!((out[0].candidate.score.unwrap() - 1.0).abs() < 1e-9);
        assert!((out[1].candidate.score.unwrap() - 0.7).abs() < 1e-9);
        assert_eq!(out[0].breakdown["OonScorer"], 1.0);
        assert_eq!(out[1].breakdown["OonScorer"], 0.7);
    }

    #[tokio::test]
    async fn wrapper_score_is_the_final_ranking_score() {
        let scorer = OonScorer::new(&RankingConfig::default());
        let out = scorer
            .score(&FeedQuery::new("u1", 20), &[candidate("p1", false, 2.0)])
            .await
            .unwrap();
        assert!((out[0].score - 1.4).abs() < 1e-9);
    }
}
