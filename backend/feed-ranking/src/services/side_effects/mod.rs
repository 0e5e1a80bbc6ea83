//! Post-serve side effects. The orchestrator spawns these after the page is
//! final; none of them can delay or fail the response.

mod impressions;
mod metrics;
mod serve_cache;

pub use impressions::ImpressionLogger;
pub use metrics::MetricsCollector;
pub use serve_cache::{served_id_set, ServeCacheSideEffect};

use chrono::Utc;

use crate::models::{ExposureAction, FeedCandidate, FeedQuery, ImpressionRecord};

pub const PRODUCT_SURFACE: &str = "feed";

/// One exposure record per served candidate, rank 1-based in page order,
/// stamped with the ranking context the training joins need.
pub fn exposure_records(
    query: &FeedQuery,
    selected: &[FeedCandidate],
    action: ExposureAction,
) -> Vec<ImpressionRecord> {
    let experiment_keys = query
        .experiment_context
        .as_ref()
        .map(|ctx| ctx.experiment_keys())
        .unwrap_or_default();
    let shown_at = Utc::now();

    selected
        .iter()
        .enumerate()
        .map(|(index, candidate)| ImpressionRecord {
            user_id: query.user_id.clone(),
            action,
            post_id: candidate.post_id.clone(),
            model_post_id: candidate.model_post_id.clone(),
            author_id: candidate.author_id.clone(),
            rank: index + 1,
            request_id: query.request_id.clone(),
            score: candidate.score,
            weighted_score: candidate.weighted_score,
            in_network: candidate.in_network,
            is_news: candidate.is_news,
            recall_source: candidate.recall_source.clone(),
            experiment_keys: experiment_keys.clone(),
            product_surface: PRODUCT_SURFACE.to_string(),
            shown_at,
        })
        .collect()
}
