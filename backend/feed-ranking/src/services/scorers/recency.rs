use async_trait::async_trait;
use chrono::Utc;

use crate::config::RankingConfig;
use crate::models::{FeedCandidate, FeedQuery, ScoredCandidate};
use crate::pipeline::Scorer;

/// Exponential freshness boost on `weighted_score`.
///
/// A just-posted candidate gets the max multiplier; every half-life the
/// boost halves its distance to the min, so old posts bottom out at a flat
/// discount instead of vanishing.
pub struct RecencyScorer {
    half_life_hours: f64,
    min_multiplier: f64,
    max_multiplier: f64,
}

impl RecencyScorer {
    pub fn new(config: &RankingConfig) -> Self {
        Self {
            half_life_hours: config.recency_half_life_hours,
            min_multiplier: config.recency_min_multiplier,
            max_multiplier: config.recency_max_multiplier,
        }
    }

    fn multiplier(&self, age_hours: f64) -> f64 {
        let decay = 0.5_f64.powf(age_hours / self.half_life_hours);
        self.min_multiplier + (self.max_multiplier - self.min_multiplier) * decay
    }
}

#[async_trait]
impl Scorer for RecencyScorer {
    fn name(&self) -> &'static str {
        "RecencyScorer"
    }

    fn enable(&self, _query: &FeedQuery) -> bool {
        true
    }

    async fn score(
        &self,
        _query: &FeedQuery,
        candidates: &[FeedCandidate],
    ) -> anyhow::Result<Vec<ScoredCandidate>> {
        let now = Utc::now();
        Ok(candidates
            .iter()
            .map(|candidate| {
                let age_hours =
                    (now - candidate.created_at).num_seconds().max(0) as f64 / 3600.0;
                let multiplier = self.multiplier(age_hours);
                let mut out = candidate.clone();
                let adjusted = out.weighted_score.unwrap_or(0.0) * multiplier;
                out.weighted_score = Some(adjusted);
                ScoredCandidate::new(out, adjusted).with_breakdown(self.name(), multiplier)
            })
            .collect())
    }

    fn update(&self, current: &mut FeedCandidate, scored: &ScoredCandidate) {
        current.weighted_score = scored.candidate.weighted_score;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PostRecord;
    use chrono::Duration;

    fn candidate(age_hours: i64) -> FeedCandidate {
        let mut c = FeedCandidate::from_post(&PostRecord {
            id: format!("p{age_hours}"),
            author_id: "a1".to_string(),
            created_at: Utc::now() - Duration::hours(age_hours),
            ..PostRecord::default()
        });
        c.weighted_score = Some(1.0);
        c
    }

    #[tokio::test]
    async fn fresh_posts_get_the_full_boost() {
        let scorer = RecencyScorer::new(&RankingConfig::default());
        let out = scorer
            .score(&FeedQuery::new("u1", 20), &[candidate(0)])
            .await
            .unwrap();
        // max multiplier is 1.5; a zero-age post sits within rounding of it
        assert!((out[0].candidate.weighted_score.unwrap() - 1.5).abs() < 1e-3);
    }

    #[tokio::test]
    async fn one_half_life_lands_midway() {
        let scorer = RecencyScorer::new(&RankingConfig::default());
        let out = scorer
            .score(&FeedQuery::new("u1", 20), &[candidate(6)])
            .await
            .unwrap();
        // 0.8 + 0.7 * 0.5
        assert!((out[0].breakdown["RecencyScorer"] - 1.15).abs() < 1e-3);
    }

    #[tokio::test]
    async fn stale_posts_bottom_out_at_the_floor() {
        let scorer = RecencyScorer::new(&RankingConfig::default());
        let out = scorer
            .score(&FeedQuery::new("u1", 20), &[candidate(24 * 14)])
            .await
            .unwrap();
        let multiplier = out[0].breakdown["RecencyScorer"];
        assert!(multiplier >= 0.8 && multiplier < 0.801);
    }

    #[tokio::test]
    async fn newer_beats_older_at_equal_base() {
        let scorer = RecencyScorer::new(&RankingConfig::default());
        let out = scorer
            .score(&FeedQuery::new("u1", 20), &[candidate(48), candidate(1)])
            .await
            .unwrap();
        assert!(out[1].score > out[0].score);
    }
}
