use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::clients::{PredictionCandidate, PredictionClient, PredictionRequest};
use crate::models::{FeedCandidate, FeedQuery, PhoenixScores, ScoredCandidate};
use crate::pipeline::Scorer;

/// Multi-action ML scorer. Sends the eligible slice of the batch to the
/// prediction service and attaches the returned action probabilities.
///
/// Only news candidates carrying an external corpus id are eligible: that
/// is the id space the model was trained on. Predictions map back to
/// candidates by id, never by position; a candidate the response skipped
/// keeps `phoenix_scores` unset so the heuristic scorer can fill in.
pub struct PhoenixScorer {
    client: Option<Arc<dyn PredictionClient>>,
}

impl PhoenixScorer {
    pub fn new(client: Option<Arc<dyn PredictionClient>>) -> Self {
        Self { client }
    }

    fn eligible(candidate: &FeedCandidate) -> bool {
        candidate.is_news
            && candidate
                .news_metadata
                .as_ref()
                .and_then(|m| m.external_id.as_deref())
                .is_some_and(|id| !id.is_empty())
    }

    /// Canonical id for the prediction lookup: reposts of social posts rank
    /// under the original content id; news ids already live in the external
    /// corpus space.
    fn lookup_id(candidate: &FeedCandidate) -> String {
        if !candidate.is_news && candidate.is_repost {
            if let Some(original) = &candidate.original_post_id {
                return original.clone();
            }
        }
        candidate.model_post_id.clone()
    }

    fn passthrough(candidates: &[FeedCandidate]) -> Vec<ScoredCandidate> {
        candidates
            .iter()
            .map(|c| ScoredCandidate::new(c.clone(), c.score.unwrap_or(0.0)))
            .collect()
    }
}

#[async_trait]
impl Scorer for PhoenixScorer {
    fn name(&self) -> &'static str {
        "PhoenixScorer"
    }

    fn enable(&self, _query: &FeedQuery) -> bool {
        self.client.is_some()
    }

    async fn score(
        &self,
        query: &FeedQuery,
        candidates: &[FeedCandidate],
    ) -> anyhow::Result<Vec<ScoredCandidate>> {
        let Some(client) = &self.client else {
            return Ok(Self::passthrough(candidates));
        };

        let eligible: Vec<&FeedCandidate> =
            candidates.iter().filter(|c| Self::eligible(c)).collect();
        if eligible.is_empty() {
            return Ok(Self::passthrough(candidates));
        }

        let request = PredictionRequest {
            user_id: query.user_id.clone(),
            // Model-vocabulary history only; the raw action sequence does
            // not speak external ids.
            user_action_sequence: query.model_action_sequence.clone(),
            candidates: eligible
                .iter()
                .map(|c| PredictionCandidate {
                    post_id: Self::lookup_id(c),
                    author_id: c.author_id.clone(),
                    in_network: c.in_network,
                    has_video: c.has_video,
                    video_duration_sec: c.video_duration_sec,
                })
                .collect(),
        };
        let predictions = client.predict(&request).await?;

        let by_id: HashMap<String, PhoenixScores> = predictions
            .into_iter()
            .filter(|p| !p.post_id.is_empty())
            .map(|p| (p.post_id, p.scores))
            .collect();

        Ok(candidates
            .iter()
            .map(|candidate| {
                let mut out = candidate.clone();
                if let Some(scores) = by_id.get(&Self::lookup_id(candidate)) {
                    out.phoenix_scores = Some(scores.clone());
                }
                let wrapper = out.score.unwrap_or(0.0);
                ScoredCandidate::new(out, wrapper)
            })
            .collect())
    }

    fn update(&self, current: &mut FeedCandidate, scored: &ScoredCandidate) {
        // No prediction for this candidate means no overwrite.
        if scored.candidate.phoenix_scores.is_some() {
            current.phoenix_scores = scored.candidate.phoenix_scores.clone();
        }
    }
}
