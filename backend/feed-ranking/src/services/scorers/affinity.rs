use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;

use crate::experiment::FEED_EXPERIMENT_ID;
use crate::models::{FeedCandidate, FeedQuery, ScoredCandidate, UserAction};
use crate::pipeline::Scorer;
use crate::utils::action_labels;

const DECAY_PER_DAY: f64 = 0.95;
const RAW_CAP: f64 = 10.0;

const BASE_BOOST: f64 = 0.1;
/// On the normalized [0,1] scale.
const HIGH_AFFINITY_THRESHOLD: f64 = 0.5;
const HIGH_AFFINITY_BOOST: f64 = 0.3;

fn action_weight(action_type: &str) -> f64 {
    match action_type {
        action_labels::LIKE => 1.0,
        action_labels::REPLY => 3.0,
        action_labels::REPOST => 2.0,
        action_labels::QUOTE => 2.5,
        action_labels::CLICK => 0.3,
        action_labels::PROFILE_CLICK => 1.5,
        action_labels::SHARE => 2.0,
        _ => 0.5,
    }
}

/// Per-author affinity from the viewer's recent action history, decayed per
/// day, accumulation capped at 10 and normalized to [0,1]. Shared by the
/// heuristic engagement scorer and the affinity adjustor so both agree on
/// what "close" means.
pub fn author_affinities(actions: &[UserAction]) -> HashMap<String, f64> {
    let now = Utc::now();
    let mut raw: HashMap<String, f64> = HashMap::new();
    for action in actions {
        let Some(author_id) = action.target_author_id.as_deref() else {
            continue;
        };
        let age_days = ((now - action.created_at).num_seconds().max(0) as f64) / 86_400.0;
        let contribution = action_weight(&action.action_type) * DECAY_PER_DAY.powf(age_days);
        let entry = raw.entry(author_id.to_string()).or_default();
        *entry = (*entry + contribution).min(RAW_CAP);
    }
    raw.into_iter()
        .map(|(author, score)| (author, (score / RAW_CAP).min(1.0)))
        .collect()
}

/// Experiment-gated adjustor that boosts already-scored candidates by the
/// viewer's affinity for their author, and stamps `author_affinity_score`
/// for downstream consumers either way. Candidates not yet carrying a
/// `score` are left unscored so the diversity stage stays the first writer.
pub struct AuthorAffinityScorer;

#[async_trait]
impl Scorer for AuthorAffinityScorer {
    fn name(&self) -> &'static str {
        "AuthorAffinityScorer"
    }

    fn enable(&self, query: &FeedQuery) -> bool {
        !query.user_action_sequence.is_empty()
            && query.experiment_flag(FEED_EXPERIMENT_ID, "enable_author_affinity_scorer", false)
    }

    async fn score(
        &self,
        query: &FeedQuery,
        candidates: &[FeedCandidate],
    ) -> anyhow::Result<Vec<ScoredCandidate>> {
        let affinities = author_affinities(&query.user_action_sequence);

        Ok(candidates
            .iter()
            .map(|candidate| {
                let affinity = affinities
                    .get(&candidate.author_id)
                    .copied()
                    .unwrap_or(0.0);
                let mut out = candidate.clone();
                out.author_affinity_score = Some(affinity);

                let mut boost = 0.0;
                if affinity > 0.0 {
                    boost = BASE_BOOST + affinity * 0.5;
                    if affinity >= HIGH_AFFINITY_THRESHOLD {
                        boost += HIGH_AFFINITY_BOOST;
                    }
                }
                if let Some(score) = out.score {
                    out.score = Some(score * (1.0 + boost));
                }

                let wrapper = out.score.or(out.weighted_score).unwrap_or(0.0);
                ScoredCandidate::new(out, wrapper).with_breakdown(self.name(), affinity)
            })
            .collect())
    }

    fn update(&self, current: &mut FeedCandidate, scored: &ScoredCandidate) {
        current.author_affinity_score = scored.candidate.author_affinity_score;
        if scored.candidate.score.is_some() {
            current.score = scored.candidate.score;
        }
    }
}
