use async_trait::async_trait;

use crate::models::{FeedCandidate, FeedQuery, PhoenixScores, ScoredCandidate};
use crate::pipeline::Scorer;

const LIKE_WEIGHT: f64 = 2.0;
const REPLY_WEIGHT: f64 = 5.0;
const REPOST_WEIGHT: f64 = 4.0;
const QUOTE_WEIGHT: f64 = 4.5;
const PHOTO_EXPAND_WEIGHT: f64 = 1.0;
const CLICK_WEIGHT: f64 = 0.5;
const QUOTED_CLICK_WEIGHT: f64 = 0.8;
const PROFILE_CLICK_WEIGHT: f64 = 1.0;
const VIDEO_QUALITY_VIEW_WEIGHT: f64 = 3.0;
const SHARE_WEIGHT: f64 = 2.5;
const SHARE_VIA_DM_WEIGHT: f64 = 2.0;
const SHARE_VIA_COPY_LINK_WEIGHT: f64 = 1.5;
const DWELL_WEIGHT: f64 = 0.3;
const DWELL_TIME_WEIGHT: f64 = 0.05;
const FOLLOW_AUTHOR_WEIGHT: f64 = 2.0;

const NOT_INTERESTED_WEIGHT: f64 = -5.0;
const BLOCK_WEIGHT: f64 = -10.0;
const MUTE_AUTHOR_WEIGHT: f64 = -4.0;
const REPORT_WEIGHT: f64 = -8.0;

/// Quality views on clips this short are autoplay noise, not a signal.
const MIN_VIDEO_DURATION_SEC: f64 = 5.0;

const SCORE_OFFSET: f64 = 0.1;
const SCORE_SCALE: f64 = 1.0;

fn term(probability: Option<f64>, weight: f64) -> f64 {
    probability.map_or(0.0, |p| p * weight)
}

/// Collapses the per-action probabilities into one engagement value on
/// `weighted_score`. Absent probabilities contribute nothing, so a candidate
/// with no predictions at all lands at the floor offset rather than zero.
///
/// `score` stays untouched here; the diversity scorer is its first writer.
pub struct WeightedScorer;

impl WeightedScorer {
    pub fn new() -> Self {
        Self
    }

    fn weighted_sum(candidate: &FeedCandidate, scores: &PhoenixScores) -> f64 {
        let mut total = term(scores.like, LIKE_WEIGHT)
            + term(scores.reply, REPLY_WEIGHT)
            + term(scores.repost, REPOST_WEIGHT)
            + term(scores.quote, QUOTE_WEIGHT)
            + term(scores.photo_expand, PHOTO_EXPAND_WEIGHT)
            + term(scores.click, CLICK_WEIGHT)
            + term(scores.quoted_click, QUOTED_CLICK_WEIGHT)
            + term(scores.profile_click, PROFILE_CLICK_WEIGHT)
            + term(scores.share, SHARE_WEIGHT)
            + term(scores.share_via_dm, SHARE_VIA_DM_WEIGHT)
            + term(scores.share_via_copy_link, SHARE_VIA_COPY_LINK_WEIGHT)
            + term(scores.dwell, DWELL_WEIGHT)
            + term(scores.dwell_time, DWELL_TIME_WEIGHT)
            + term(scores.follow_author, FOLLOW_AUTHOR_WEIGHT);

        if candidate
            .video_duration_sec
            .is_some_and(|d| d > MIN_VIDEO_DURATION_SEC)
        {
            total += term(scores.video_quality_view, VIDEO_QUALITY_VIEW_WEIGHT);
        }

        total += term(scores.not_interested_signal(), NOT_INTERESTED_WEIGHT);
        total += term(scores.block_signal(), BLOCK_WEIGHT);
        total += term(scores.mute_author, MUTE_AUTHOR_WEIGHT);
        total += term(scores.report, REPORT_WEIGHT);
        total
    }

    fn normalize(raw: f64) -> f64 {
        ((raw + SCORE_OFFSET) * SCORE_SCALE).max(0.0)
    }
}

impl Default for WeightedScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scorer for WeightedScorer {
    fn name(&self) -> &'static str {
        "WeightedScorer"
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
                let scores = candidate.phoenix_scores.clone().unwrap_or_default();
                let weighted = Self::normalize(Self::weighted_sum(candidate, &scores));
                let mut out = candidate.clone();
                out.weighted_score = Some(weighted);
                ScoredCandidate::new(out, weighted).with_breakdown(self.name(), weighted)
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

    fn candidate_with(scores: PhoenixScores) -> FeedCandidate {
        let mut c = FeedCandidate::from_post(&PostRecord {
            id: "p1".to_string(),
            author_id: "a1".to_string(),
            ..PostRecord::default()
        });
        c.phoenix_scores = Some(scores);
        c
    }

    #[tokio::test]
    async fn combines_positive_and_negative_probabilities() {
        let c = candidate_with(PhoenixScores {
            like: Some(0.5),
            reply: Some(0.1),
            not_interested: Some(0.2),
            ..PhoenixScores::default()
        });

        let out = WeightedScorer::new()
            .score(&FeedQuery::new("u1", 20), &[c])
            .await
            .unwrap();
        // (0.5*2 + 0.1*5 - 0.2*5 + 0.1) * 1
        let expected = 0.6;
        assert!((out[0].score - expected).abs() < 1e-9);
        assert!((out[0].candidate.weighted_score.unwrap() - expected).abs() < 1e-9);
        assert!(out[0].candidate.score.is_none());
    }

    #[tokio::test]
    async fn missing_predictions_land_at_the_offset() {
        let c = FeedCandidate::from_post(&PostRecord {
            id: "p1".to_string(),
            author_id: "a1".to_string(),
            ..PostRecord::default()
        });
        let out = WeightedScorer::new()
            .score(&FeedQuery::new("u1", 20), &[c])
            .await
            .unwrap();
        assert!((out[0].candidate.weighted_score.unwrap() - 0.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn heavy_negatives_clamp_at_zero() {
        let c = candidate_with(PhoenixScores {
            block: Some(0.9),
            ..PhoenixScores::default()
        });
        let out = WeightedScorer::new()
            .score(&FeedQuery::new("u1", 20), &[c])
            .await
            .unwrap();
        assert_eq!(out[0].candidate.weighted_score, Some(0.0));
    }

    #[tokio::test]
    async fn video_quality_view_requires_a_real_video() {
        let scores = PhoenixScores {
            video_quality_view: Some(0.4),
            ..PhoenixScores::default()
        };

        let mut short_clip = candidate_with(scores.clone());
        short_clip.has_video = true;
        short_clip.video_duration_sec = Some(3.0);

        let mut long_video = candidate_with(scores);
        long_video.has_video = true;
        long_video.video_duration_sec = Some(30.0);

        let out = WeightedScorer::new()
            .score(&FeedQuery::new("u1", 20), &[short_clip, long_video])
            .await
            .unwrap();
        assert!((out[0].candidate.weighted_score.unwrap() - 0.1).abs() < 1e-9);
        // 0.4 * 3 + 0.1
        assert!((out[1].candidate.weighted_score.unwrap() - 1.3).abs() < 1e-9);
    }

    #[tokio::test]
    async fn legacy_signal_names_count_once() {
        // dismiss stands in for not_interested; both set means the model
        // vocabulary wins and the heuristic duplicate is ignored.
        let c = candidate_with(PhoenixScores {
            not_interested: Some(0.1),
            dismiss: Some(0.9),
            ..PhoenixScores::default()
        });
        let out = WeightedScorer::new()
            .score(&FeedQuery::new("u1", 20), &[c])
            .await
            .unwrap();
        // (0.1 + (-5.0 * 0.1)).max(0)
        assert_eq!(out[0].candidate.weighted_score, Some(0.0));
    }
}
