use async_trait::async_trait;

use crate::experiment::FEED_EXPERIMENT_ID;
use crate::models::{FeedCandidate, FeedQuery, ScoredCandidate};
use crate::pipeline::Scorer;

const LENGTH_WEIGHT: f64 = 0.3;
const MEDIA_WEIGHT: f64 = 0.2;
const ENGAGEMENT_RATE_WEIGHT: f64 = 0.5;

const IMAGE_MEDIA_VALUE: f64 = 0.1;
const VIDEO_MEDIA_VALUE: f64 = 0.15;
const MEDIA_VALUE_CAP: f64 = 0.2;

/// Engagements-per-view above this rate count as a full signal.
const ENGAGEMENT_RATE_CEILING: f64 = 0.1;

const MIN_FACTOR: f64 = 0.8;
const FACTOR_RANGE: f64 = 0.4;

/// Nudges `weighted_score` by an estimate of intrinsic content quality:
/// text substance, media presence, and engagements per view. The output
/// multiplier stays inside [0.8, 1.2] so quality reorders near-ties without
/// overruling the engagement prediction.
///
/// Rollout-gated; off outside the experiment.
pub struct ContentQualityScorer;

impl ContentQualityScorer {
    pub fn new() -> Self {
        Self
    }

    fn length_score(text: &str) -> f64 {
        let len = text.chars().count();
        if len < 10 {
            0.3
        } else if len <= 280 {
            0.8 + (len as f64 / 280.0) * 0.2
        } else if len <= 1000 {
            0.9
        } else {
            0.7
        }
    }

    fn media_score(candidate: &FeedCandidate) -> f64 {
        let mut value = 0.0;
        if candidate.has_image {
            value += IMAGE_MEDIA_VALUE;
        }
        if candidate.has_video {
            value += VIDEO_MEDIA_VALUE;
        }
        value.min(MEDIA_VALUE_CAP) / MEDIA_VALUE_CAP
    }

    fn engagement_rate_score(candidate: &FeedCandidate) -> f64 {
        let views = candidate.view_count.max(1) as f64;
        let rate = candidate.engagement_score() as f64 / views;
        (rate / ENGAGEMENT_RATE_CEILING).min(1.0)
    }

    fn quality(candidate: &FeedCandidate) -> f64 {
        let quality = Self::length_score(&candidate.text) * LENGTH_WEIGHT
            + Self::media_score(candidate) * MEDIA_WEIGHT
            + Self::engagement_rate_score(candidate) * ENGAGEMENT_RATE_WEIGHT;
        quality.min(1.0)
    }

    fn factor(candidate: &FeedCandidate) -> f64 {
        MIN_FACTOR + Self::quality(candidate) * FACTOR_RANGE
    }
}

impl Default for ContentQualityScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scorer for ContentQualityScorer {
    fn name(&self) -> &'static str {
        "ContentQualityScorer"
    }

    fn enable(&self, query: &FeedQuery) -> bool {
        query.experiment_flag(FEED_EXPERIMENT_ID, "enable_content_quality_scorer", false)
    }

    async fn score(
        &self,
        _query: &FeedQuery,
        candidates: &[FeedCandidate],
    ) -> anyhow::Result<Vec<ScoredCandidate>> {
        Ok(candidates
            .iter()
            .map(|candidate| {
                let factor = Self::factor(candidate);
                let mut out = candidate.clone();
                let adjusted = out.weighted_score.unwrap_or(0.0) * factor;
                out.weighted_score = Some(adjusted);
                ScoredCandidate::new(out, adjusted).with_breakdown(self.name(), factor)
            })
            .collect())
    }

    fn update(&self, current: &mut FeedCandidate, scored: &ScoredCandidate) {
        current.weighted_score = scored.candidate.weighted_score;
    }
}
