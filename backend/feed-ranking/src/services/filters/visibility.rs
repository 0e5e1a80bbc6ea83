use async_trait::async_trait;

use crate::config::SafetyConfig;
use crate::experiment::FEED_EXPERIMENT_ID;
use crate::models::{FeedCandidate, FeedQuery};
use crate::pipeline::{CandidateFilter, FilterOutcome};

const LOW_RISK: &str = "low_risk";

/// Post-selection safety gate over the visibility verdicts attached by the
/// safety hydrator.
///
/// Degrade posture: a candidate with no verdict (service down, hydrator
/// disabled) is only allowed through when it came from the viewer's own
/// network. NSFW is dropped outright. Low-risk content is allowed or not
/// per surface: in-network lenient, out-of-network strict, both
/// overridable by experiment.
pub struct VisibilityFilter {
    config: SafetyConfig,
}

impl VisibilityFilter {
    pub fn new(config: SafetyConfig) -> Self {
        Self { config }
    }

    fn allows(&self, query: &FeedQuery, candidate: &FeedCandidate) -> bool {
        if candidate.is_nsfw {
            return false;
        }
        let Some(verdict) = &candidate.vf_result else {
            return candidate.in_network;
        };
        if !verdict.safe {
            return false;
        }
        if verdict.level.as_deref() == Some(LOW_RISK) {
            return if candidate.in_network {
                query.experiment_flag(
                    FEED_EXPERIMENT_ID,
                    "vf_in_network_allow_low_risk",
                    self.config.in_network_allow_low_risk,
                )
            } else {
                query.experiment_flag(
                    FEED_EXPERIMENT_ID,
                    "vf_oon_allow_low_risk",
                    self.config.oon_allow_low_risk,
                )
            };
        }
        true
    }
}

#[async_trait]
impl CandidateFilter for VisibilityFilter {
    fn name(&self) -> &'static str {
        "VisibilityFilter"
    }

    async fn filter(
        &self,
        query: &FeedQuery,
        candidates: Vec<FeedCandidate>,
    ) -> anyhow::Result<FilterOutcome> {
        let mut outcome = FilterOutcome::default();
        for candidate in candidates {
            if self.allows(query, &candidate) {
                outcome.kept.push(candidate);
            } else {
                outcome.removed.push(candidate);
            }
        }
        Ok(outcome)
    }
}
