// Stage contracts for the candidate pipeline. Every stage carries a name
// for logs and metrics and an enable gate evaluated against the hydrated
// query.

use async_trait::async_trait;

use crate::models::{FeedCandidate, FeedQuery, QueryUpdate, ScoredCandidate};

pub(crate) const QUERY_HYDRATOR: &str = "QueryHydrator";
pub(crate) const SOURCE: &str = "Source";
pub(crate) const HYDRATOR: &str = "Hydrator";
pub(crate) const FILTER: &str = "Filter";
pub(crate) const POST_FILTER: &str = "PostFilter";
pub(crate) const POST_SELECTION_HYDRATOR: &str = "PostSelectionHydrator";
pub(crate) const POST_SELECTION_FILTER: &str = "PostSelectionFilter";
pub(crate) const SCORER: &str = "Scorer";

/// Enriches the query before sourcing starts. Hydrators in this phase run
/// in parallel; their updates must touch disjoint fields.
#[async_trait]
pub trait QueryHydrator: Send + Sync {
    fn name(&self) -> &'static str;
    fn enable(&self, _query: &FeedQuery) -> bool {
        true
    }
    async fn hydrate(&self, query: &FeedQuery) -> anyhow::Result<QueryUpdate>;
}

/// Produces candidates for one retrieval channel.
#[async_trait]
pub trait Source: Send + Sync {
    fn name(&self) -> &'static str;
    fn enable(&self, _query: &FeedQuery) -> bool {
        true
    }
    async fn get_candidates(&self, query: &FeedQuery) -> anyhow::Result<Vec<FeedCandidate>>;
}

/// Batch-enriches candidates. `hydrate` must return one candidate per input
/// in the same order; the orchestrator zips the output back by index via
/// `update` and skips the whole batch on a length mismatch.
#[async_trait]
pub trait CandidateHydrator: Send + Sync {
    fn name(&self) -> &'static str;
    fn enable(&self, _query: &FeedQuery) -> bool {
        true
    }
    async fn hydrate(
        &self,
        query: &FeedQuery,
        candidates: &[FeedCandidate],
    ) -> anyhow::Result<Vec<FeedCandidate>>;
    /// Folds the fields this hydrator owns from `hydrated` onto the
    /// pipeline's working copy.
    fn update(&self, current: &mut FeedCandidate, hydrated: &FeedCandidate);
}

/// Split of a filter pass.
#[derive(Debug, Default)]
pub struct FilterOutcome {
    pub kept: Vec<FeedCandidate>,
    pub removed: Vec<FeedCandidate>,
}

/// Hard-rule filter. Filters run sequentially; a failing filter keeps its
/// input untouched.
#[async_trait]
pub trait CandidateFilter: Send + Sync {
    fn name(&self) -> &'static str;
    fn enable(&self, _query: &FeedQuery) -> bool {
        true
    }
    async fn filter(
        &self,
        query: &FeedQuery,
        candidates: Vec<FeedCandidate>,
    ) -> anyhow::Result<FilterOutcome>;
}

/// Assigns scores. Scorers run sequentially so later scorers can read the
/// marks earlier ones left on the candidates. `score` must return one entry
/// per input in the same order.
#[async_trait]
pub trait Scorer: Send + Sync {
    fn name(&self) -> &'static str;
    fn enable(&self, _query: &FeedQuery) -> bool {
        true
    }
    async fn score(
        &self,
        query: &FeedQuery,
        candidates: &[FeedCandidate],
    ) -> anyhow::Result<Vec<ScoredCandidate>>;
    /// Folds this scorer's per-candidate marks onto the working copy. The
    /// wrapper score and breakdown are merged by the orchestrator.
    fn update(&self, current: &mut FeedCandidate, scored: &ScoredCandidate);
}

/// Orders the scored pool and cuts it down to the working set handed to
/// post-selection stages.
pub trait Selector: Send + Sync {
    fn name(&self) -> &'static str;
    fn enable(&self, _query: &FeedQuery) -> bool {
        true
    }
    fn select(&self, query: &FeedQuery, candidates: Vec<ScoredCandidate>) -> Vec<FeedCandidate>;
}

/// Detached work after the page is final: impression logging, serve-cache
/// writes, quality metrics. Failures are logged and dropped.
#[async_trait]
pub trait SideEffect: Send + Sync {
    fn name(&self) -> &'static str;
    fn enable(&self, _query: &FeedQuery) -> bool {
        true
    }
    async fn run(&self, query: &FeedQuery, selected: &[FeedCandidate]) -> anyhow::Result<()>;
}
