use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::clients::{SafetyCheckItem, SafetyClient};
use crate::models::{FeedCandidate, FeedQuery, VfVerdict};
use crate::pipeline::CandidateHydrator;

/// Post-selection hydrator that asks the safety service for a visibility
/// verdict on the (small) selected set. When the service is down the
/// hydrator errors out, candidates keep `vf_result = None`, and the
/// visibility filter falls back to its in-network-only posture.
pub struct VfCandidateHydrator {
    safety: Option<Arc<dyn SafetyClient>>,
}

impl VfCandidateHydrator {
    pub fn new(safety: Option<Arc<dyn SafetyClient>>) -> Self {
        Self { safety }
    }
}

#[async_trait]
impl CandidateHydrator for VfCandidateHydrator {
    fn name(&self) -> &'static str {
        "VfCandidateHydrator"
    }

    fn enable(&self, _query: &FeedQuery) -> bool {
        self.safety.is_some()
    }

    async fn hydrate(
        &self,
        query: &FeedQuery,
        candidates: &[FeedCandidate],
    ) -> anyhow::Result<Vec<FeedCandidate>> {
        let Some(safety) = &self.safety else {
            return Ok(candidates.to_vec());
        };

        let items: Vec<SafetyCheckItem> = candidates
            .iter()
            .map(|c| SafetyCheckItem {
                post_id: c.post_id.clone(),
                user_id: query.user_id.clone(),
                content: (!c.text.is_empty()).then(|| c.text.clone()),
            })
            .collect();
        let verdicts = safety.check(&items).await?;
        let by_id: HashMap<String, VfVerdict> = verdicts
            .into_iter()
            .map(|v| (v.post_id, v.verdict))
            .collect();

        Ok(candidates
            .iter()
            .map(|candidate| {
                let mut out = candidate.clone();
                out.vf_result = by_id.get(&candidate.post_id).cloned();
                out
            })
            .collect())
    }

    fn update(&self, current: &mut FeedCandidate, hydrated: &FeedCandidate) {
        current.vf_result = hydrated.vf_result.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{MockSafetyClient, SafetyVerdict};
    use crate::models::PostRecord;

    fn candidate(id: &str) -> FeedCandidate {
        FeedCandidate::from_post(&PostRecord {
            id: id.to_string(),
            author_id: "a1".to_string(),
            text: "hello".to_string(),
            ..PostRecord::default()
        })
    }

    #[tokio::test]
    async fn attaches_verdicts_by_post_id() {
        let mut safety = MockSafetyClient::new();
        safety.expect_check().returning(|items| {
            assert_eq!(items.len(), 2);
            Ok(vec![SafetyVerdict {
                post_id: "p2".to_string(),
                verdict: VfVerdict {
                    safe: false,
                    reason: Some("spam".to_string()),
                    level: Some("high".to_string()),
                    score: Some(0.9),
                    violations: vec![],
                    requires_review: false,
                },
            }])
        });

        let hydrator = VfCandidateHydrator::new(Some(Arc::new(safety)));
        let hydrated = hydrator
            .hydrate(&FeedQuery::new("u1", 20), &[candidate("p1"), candidate("p2")])
            .await
            .unwrap();

        assert!(hydrated[0].vf_result.is_none());
        let verdict = hydrated[1].vf_result.as_ref().unwrap();
        assert!(!verdict.safe);
        assert_eq!(verdict.level.as_deref(), Some("high"));
    }

    #[test]
    fn disabled_without_a_client() {
        let hydrator = VfCandidateHydrator::new(None);
        assert!(!hydrator.enable(&FeedQuery::new("u1", 20)));
    }
}
