use std::collections::HashSet;

use async_trait::async_trait;

use crate::metrics;
use crate::models::{FeedCandidate, FeedQuery};
use crate::pipeline::SideEffect;

/// Per-page feed quality snapshot: in-network share, author diversity, and
/// average final score. Empty pages are skipped so error responses do not
/// drag the distributions to zero.
pub struct MetricsCollector;

#[async_trait]
impl SideEffect for MetricsCollector {
    fn name(&self) -> &'static str {
        "MetricsCollector"
    }

    async fn run(&self, _query: &FeedQuery, selected: &[FeedCandidate]) -> anyhow::Result<()> {
        if selected.is_empty() {
            return Ok(());
        }
        let size = selected.len() as f64;
        let in_network = selected.iter().filter(|c| c.in_network).count() as f64;
        let authors: HashSet<&str> = selected.iter().map(|c| c.author_id.as_str()).collect();
        let avg_score = selected
            .iter()
            .map(|c| c.score.unwrap_or(0.0))
            .sum::<f64>()
            / size;

        metrics::record_feed_quality(in_network / size, authors.len() as f64 / size, avg_score);
        Ok(())
    }
}
