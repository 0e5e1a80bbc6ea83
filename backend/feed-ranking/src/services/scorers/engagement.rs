use std::collections::HashMap;

use async_trait::async_trait;

use super::affinity::author_affinities;
use crate::models::{FeedCandidate, FeedQuery, PhoenixScores, ScoredCandidate};
use crate::pipeline::Scorer;

// Base action rates for a viewer with no signal on the candidate.
const BASE_LIKE: f64 = 0.05;
const BASE_REPLY: f64 = 0.01;
const BASE_REPOST: f64 = 0.005;
const BASE_CLICK: f64 = 0.15;
const BASE_DISMISS: f64 = 0.02;
const BASE_BLOCK: f64 = 0.001;

const AFFINITY_LIKE: f64 = 0.3;
const AFFINITY_REPLY: f64 = 0.2;
const AFFINITY_REPOST: f64 = 0.15;
const AFFINITY_CLICK: f64 = 0.1;

const TRENDING_LIKE: f64 = 0.15;
const TRENDING_REPLY: f64 = 0.1;
const TRENDING_REPOST: f64 = 0.1;
const TRENDING_CLICK: f64 = 0.05;

const OON_NEGATIVE_RISK: f64 = 0.005;
const SHORT_CONTENT_DISMISS: f64 = 0.05;
const SHORT_CONTENT_CHARS: usize = 10;

/// Rule-based fallback for the ML action predictor. Estimates the same
/// action probabilities from affinity, popularity, content type, and
/// network position, but only fills the fields the ML scorer left unset:
/// partial model coverage degrades per-field, never per-candidate.
pub struct EngagementScorer;

impl EngagementScorer {
    fn heuristic_scores(candidate: &FeedCandidate, affinity: f64) -> PhoenixScores {
        let mut like = BASE_LIKE;
        let mut reply = BASE_REPLY;
        let mut repost = BASE_REPOST;
        let mut click = BASE_CLICK;
        let mut dismiss = BASE_DISMISS;
        let mut block = BASE_BLOCK;

        if affinity > 0.0 {
            like += AFFINITY_LIKE * affinity;
            reply += AFFINITY_REPLY * affinity;
            repost += AFFINITY_REPOST * affinity;
            click += AFFINITY_CLICK * affinity;
            dismiss *= 1.0 - affinity * 0.8;
            block *= 1.0 - affinity * 0.9;
        }

        let trending = (candidate.engagement_score() as f64 / 100.0).min(1.0);
        if trending > 0.1 {
            like += TRENDING_LIKE * trending;
            reply += TRENDING_REPLY * trending;
            repost += TRENDING_REPOST * trending;
            click += TRENDING_CLICK * trending;
        }

        if candidate.has_video {
            click *= 1.2;
        }
        if candidate.has_image {
            like *= 1.1;
        }

        if candidate.in_network {
            like *= 1.5;
            reply *= 1.3;
            dismiss *= 0.5;
            block *= 0.2;
        } else {
            dismiss += OON_NEGATIVE_RISK;
            block += OON_NEGATIVE_RISK;
        }

        if candidate.text.chars().count() < SHORT_CONTENT_CHARS {
            dismiss += SHORT_CONTENT_DISMISS;
        }

        PhoenixScores {
            like: Some(like.min(1.0)),
            reply: Some(reply.min(1.0)),
            repost: Some(repost.min(1.0)),
            click: Some(click.min(1.0)),
            dismiss: Some(dismiss.min(1.0)),
            block: Some(block.min(1.0)),
            ..PhoenixScores::default()
        }
    }

    /// Coarse fallback rank signal so downstream stages have something to
    /// work with even if the weighted combinator is skipped.
    fn initial_score(scores: &PhoenixScores) -> f64 {
        let positive = scores.like.unwrap_or(0.0) * 2.0
            + scores.reply.unwrap_or(0.0) * 5.0
            + scores.repost.unwrap_or(0.0) * 4.0
            + scores.click.unwrap_or(0.0) * 0.5;
        let negative = scores.not_interested_signal().unwrap_or(0.0) * 5.0
            + scores.block_signal().unwrap_or(0.0) * 10.0;
        (positive - negative).max(0.0)
    }
}

#[async_trait]
impl Scorer for EngagementScorer {
    fn name(&self) -> &'static str {
        "EngagementScorer"
    }

    async fn score(
        &self,
        query: &FeedQuery,
        candidates: &[FeedCandidate],
    ) -> anyhow::Result<Vec<ScoredCandidate>> {
        let affinities: HashMap<String, f64> = author_affinities(&query.user_action_sequence);

        Ok(candidates
            .iter()
            .map(|candidate| {
                let affinity = affinities
                    .get(&candidate.author_id)
                    .copied()
                    .unwrap_or(0.0);
                let heuristic = Self::heuristic_scores(candidate, affinity);

                let mut merged = candidate.phoenix_scores.clone().unwrap_or_default();
                merged.fill_missing_from(&heuristic);
                let initial = Self::initial_score(&merged);

                let mut out = candidate.clone();
                out.phoenix_scores = Some(merged);
                ScoredCandidate::new(out, initial).with_breakdown(self.name(), initial)
            })
            .collect())
    }

    fn update(&self, current: &mut FeedCandidate, scored: &ScoredCandidate) {
        current.phoenix_scores = scored.candidate.phoenix_scores.clone();
    }
}
