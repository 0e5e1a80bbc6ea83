use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::models::{FeedCandidate, FeedQuery};
use crate::pipeline::SideEffect;
use crate::stores::ServedStore;

/// Marks everything on the page served, so bottom requests within the TTL
/// window do not show it again.
///
/// Marks the full related-id set, not just the post ids: serving a repost
/// also burns the original, serving a reply burns its thread.
pub struct ServeCacheSideEffect {
    served: Arc<dyn ServedStore>,
}

impl ServeCacheSideEffect {
    pub fn new(served: Arc<dyn ServedStore>) -> Self {
        Self { served }
    }
}

/// Related-id expansion of a page, deduplicated, page order preserved.
pub fn served_id_set(selected: &[FeedCandidate]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::with_capacity(selected.len());
    let mut seen: HashSet<&str> = HashSet::with_capacity(selected.len());
    for candidate in selected {
        for id in candidate.related_ids() {
            if seen.insert(id) {
                ids.push(id.to_string());
            }
        }
    }
    ids
}

#[async_trait]
impl SideEffect for ServeCacheSideEffect {
    fn name(&self) -> &'static str {
        "ServeCacheSideEffect"
    }

    async fn run(&self, query: &FeedQuery, selected: &[FeedCandidate]) -> anyhow::Result<()> {
        let ids = served_id_set(selected);
        if ids.is_empty() {
            return Ok(());
        }
        self.served.mark_served(&query.user_id, &ids).await?;
        debug!(user_id = %query.user_id, count = ids.len(), "marked served");
        Ok(())
    }
}
