use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;

use crate::config::RankingConfig;
use crate::models::{FeedCandidate, FeedQuery, ScoredCandidate};
use crate::pipeline::Scorer;

/// Attenuates repeated suppliers so one prolific author (or one news
/// publisher) cannot own the page.
///
/// Candidates are ranked by their current effective score, then each
/// supplier's Nth appearance is multiplied by `(1 - floor) * decay^N + floor`:
/// the first hit keeps its full score, later ones decay geometrically down to
/// the floor. This is the first writer of `score`; everything upstream lives
/// on `weighted_score`. Output order matches input order.
pub struct AuthorDiversityScorer {
    decay: f64,
    floor: f64,
}

impl AuthorDiversityScorer {
    pub fn new(config: &RankingConfig) -> Self {
        Self {
            decay: config.diversity_decay,
            floor: config.diversity_floor,
        }
    }

    fn multiplier(&self, occurrence: u32) -> f64 {
        (1.0 - self.floor) * self.decay.powi(occurrence as i32) + self.floor
    }
}

fn effective_score(candidate: &FeedCandidate) -> f64 {
    candidate
        .score
        .or(candidate.weighted_score)
        .unwrap_or(0.0)
}

#[async_trait]
impl Scorer for AuthorDiversityScorer {
    fn name(&self) -> &'static str {
        "AuthorDiversityScorer"
    }

    fn enable(&self, _query: &FeedQuery) -> bool {
        true
    }

    async fn score(
        &self,
        _query: &FeedQuery,
        candidates: &[FeedCandidate],
    ) -> anyhow::Result<Vec<ScoredCandidate>> {
        // Best candidate of each supplier keeps full score, so walk in
        // descending score order. Stable sort keeps input order on ties.
        let mut ranked: Vec<usize> = (0..candidates.len()).collect();
        ranked.sort_by(|&a, &b| {
            effective_score(&candidates[b])
                .partial_cmp(&effective_score(&candidates[a]))
                .unwrap_or(Ordering::Equal)
        });

        let mut occurrences: HashMap<String, u32> = HashMap::new();
        let mut scored: Vec<Option<ScoredCandidate>> = vec![None; candidates.len()];
        for index in ranked {
            let candidate = &candidates[index];
            let seen = occurrences.entry(candidate.supplier_key()).or_insert(0);
            let multiplier = self.multiplier(*seen);
            *seen += 1;

            let adjusted = effective_score(candidate) * multiplier;
            let mut out = candidate.clone();
            out.score = Some(adjusted);
            scored[index] =
                Some(ScoredCandidate::new(out, adjusted).with_breakdown(self.name(), multiplier));
        }

        Ok(scored.into_iter().flatten().collect())
    }

    fn update(&self, current: &mut FeedCandidate, scored: &ScoredCandidate) {
        current.score = scored.candidate.score;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PostRecord;

    fn candidate(id: &str, author: &str, weighted: f64) -> FeedCandidate {
        let mut c = FeedCandidate::from_post(&PostRecord {
            id: id.to_string(),
            author_id: author.to_string(),
            ..PostRecord::default()
        });
        c.weighted_score = Some(weighted);
        c
    }

    #[tokio::test]
    async fn second_post_of_an_author_decays() {
        let scorer = AuthorDiversityScorer::new(&RankingConfig::default());
        let out = scorer
            .score(
                &FeedQuery::new("u1", 20),
                &[
                    candidate("p1", "a1", 1.0),
                    candidate("p2", "a1", 0.9),
                    candidate("p3", "a2", 0.5),
                ],
            )
            .await
            .unwrap();

        assert!((out[0].candidate.score.unwrap() - 1.0).abs() < 1e-9);
        // (1 - 0.3) * 0.8 + 0.3 = 0.86 on the author's second appearance
        assert!((out[1].candidate.score.unwrap() - 0.9 * 0.86).abs() < 1e-9);
        // different author, first appearance
        assert!((out[2].candidate.score.unwrap() - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn best_post_keeps_full_score_regardless_of_input_position() {
        let scorer = AuthorDiversityScorer::new(&RankingConfig::default());
        // a1's stronger post comes later in the batch; it must still be the
        // one that escapes the decay.
        let out = scorer
            .score(
                &FeedQuery::new("u1", 20),
                &[candidate("p1", "a1", 0.4), candidate("p2", "a1", 1.0)],
            )
            .await
            .unwrap();

        assert_eq!(out[0].candidate.post_id, "p1");
        assert!((out[0].candidate.score.unwrap() - 0.4 * 0.86).abs() < 1e-9);
        assert!((out[1].candidate.score.unwrap() - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn long_runs_bottom_out_at_the_floor() {
        let scorer = AuthorDiversityScorer::new(&RankingConfig::default());
        let batch: Vec<FeedCandidate> = (0..30)
            .map(|i| candidate(&format!("p{i}"), "a1", 1.0))
            .collect();
        let out = scorer.score(&FeedQuery::new("u1", 20), &batch).await.unwrap();

        let last = out.last().unwrap().breakdown["AuthorDiversityScorer"];
        assert!(last > 0.3 && last < 0.31);
    }

    #[tokio::test]
    async fn news_candidates_group_by_publisher_not_bot_author() {
        use crate::models::NewsMetadata;

        let make_news = |id: &str, url: &str, weighted: f64| {
            let mut c = FeedCandidate::from_post(&PostRecord {
                id: id.to_string(),
                author_id: "news-bot".to_string(),
                is_news: true,
                news_metadata: Some(NewsMetadata {
                    source_url: Some(url.to_string()),
                    external_id: Some(format!("N-{id}")),
                    ..NewsMetadata::default()
                }),
                ..PostRecord::default()
            });
            c.weighted_score = Some(weighted);
            c
        };

        let scorer = AuthorDiversityScorer::new(&RankingConfig::default());
        let out = scorer
            .score(
                &FeedQuery::new("u1", 20),
                &[
                    make_news("n1", "https://alpha.example/a", 1.0),
                    make_news("n2", "https://beta.example/b", 0.9),
                    make_news("n3", "https://alpha.example/c", 0.8),
                ],
            )
            .await
            .unwrap();

        // Same bot author throughout; only the repeated domain decays.
        assert!((out[0].candidate.score.unwrap() - 1.0).abs() < 1e-9);
        assert!((out[1].candidate.score.unwrap() - 0.9).abs() < 1e-9);
        assert!((out[2].candidate.score.unwrap() - 0.8 * 0.86).abs() < 1e-9);
    }
}
