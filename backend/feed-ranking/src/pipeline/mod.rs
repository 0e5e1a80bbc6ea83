// Candidate pipeline orchestrator.
//
// Phase order: query hydration, sourcing, candidate hydration, filtering,
// scoring, post-score filtering, selection, post-selection hydration and
// filtering, final truncation, detached side effects.
//
// Degrade policy: a failing component never fails the request. A failed
// source contributes nothing, a failed hydrator or scorer leaves candidates
// untouched, a failed filter keeps its input. Every failure is logged and
// recorded as a component metric.

mod stage;

pub use stage::{
    CandidateFilter, CandidateHydrator, FilterOutcome, QueryHydrator, Scorer, Selector,
    SideEffect, Source,
};

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::error::StageError;
use crate::metrics;
use crate::models::{FeedCandidate, FeedQuery, ScoredCandidate};

/// One component call: how long it took and how it failed, if it did.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentMetric {
    pub stage: &'static str,
    pub name: &'static str,
    pub duration_ms: u64,
    pub timed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineTiming {
    pub total_ms: u64,
    pub sourcing_ms: u64,
    pub hydrating_ms: u64,
    pub filtering_ms: u64,
    pub scoring_ms: u64,
    pub selecting_ms: u64,
    pub post_selection_hydrating_ms: u64,
    pub post_selection_filtering_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineCounts {
    pub retrieved: usize,
    pub filtered: usize,
    pub post_filtered: usize,
    pub post_selection_filtered: usize,
    pub selected: usize,
}

/// Final wrapper score and per-scorer breakdown, kept only in debug mode.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreDetail {
    pub score: f64,
    pub breakdown: HashMap<String, f64>,
}

#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub request_id: String,
    pub selected: Vec<FeedCandidate>,
    /// Everything removed by any filter phase, in removal order.
    pub removed: Vec<FeedCandidate>,
    pub counts: PipelineCounts,
    pub timing: PipelineTiming,
    pub component_metrics: Vec<ComponentMetric>,
    /// Keyed by post id; empty unless the pipeline runs in debug mode.
    pub score_details: HashMap<String, ScoreDetail>,
}

/// The feed pipeline. Assembled once at startup via the builder methods,
/// then shared across requests.
pub struct FeedPipeline {
    query_hydrators: Vec<Arc<dyn QueryHydrator>>,
    sources: Vec<Arc<dyn Source>>,
    hydrators: Vec<Arc<dyn CandidateHydrator>>,
    filters: Vec<Arc<dyn CandidateFilter>>,
    post_filters: Vec<Arc<dyn CandidateFilter>>,
    scorers: Vec<Arc<dyn Scorer>>,
    selector: Option<Arc<dyn Selector>>,
    post_selection_hydrators: Vec<Arc<dyn CandidateHydrator>>,
    post_selection_filters: Vec<Arc<dyn CandidateFilter>>,
    side_effects: Vec<Arc<dyn SideEffect>>,
    config: PipelineConfig,
}

impl FeedPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            query_hydrators: Vec::new(),
            sources: Vec::new(),
            hydrators: Vec::new(),
            filters: Vec::new(),
            post_filters: Vec::new(),
            scorers: Vec::new(),
            selector: None,
            post_selection_hydrators: Vec::new(),
            post_selection_filters: Vec::new(),
            side_effects: Vec::new(),
            config,
        }
    }

    pub fn with_query_hydrator(mut self, hydrator: Arc<dyn QueryHydrator>) -> Self {
        self.query_hydrators.push(hydrator);
        self
    }

    pub fn with_source(mut self, source: Arc<dyn Source>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_hydrator(mut self, hydrator: Arc<dyn CandidateHydrator>) -> Self {
        self.hydrators.push(hydrator);
        self
    }

    pub fn with_filter(mut self, filter: Arc<dyn CandidateFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_post_filter(mut self, filter: Arc<dyn CandidateFilter>) -> Self {
        self.post_filters.push(filter);
        self
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
        self.scorers.push(scorer);
        self
    }

    pub fn with_selector(mut self, selector: Arc<dyn Selector>) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn with_post_selection_hydrator(mut self, hydrator: Arc<dyn CandidateHydrator>) -> Self {
        self.post_selection_hydrators.push(hydrator);
        self
    }

    pub fn with_post_selection_filter(mut self, filter: Arc<dyn CandidateFilter>) -> Self {
        self.post_selection_filters.push(filter);
        self
    }

    pub fn with_side_effect(mut self, side_effect: Arc<dyn SideEffect>) -> Self {
        self.side_effects.push(side_effect);
        self
    }

    pub async fn execute(&self, query: FeedQuery) -> PipelineResult {
        let started = Instant::now();
        let mut component_metrics = Vec::new();

        let hydrate_start = Instant::now();
        let query = self.hydrate_query(query, &mut component_metrics).await;
        let mut hydrating = hydrate_start.elapsed();

        let sourcing_start = Instant::now();
        let mut candidates = self.fetch_candidates(&query, &mut component_metrics).await;
        let sourcing = sourcing_start.elapsed();

        if candidates.len() > self.config.max_candidates {
            candidates.truncate(self.config.max_candidates);
        }
        let retrieved = candidates.len();
        metrics::record_candidate_count("retrieved", retrieved as u64);

        let hydrate_start = Instant::now();
        let candidates = self
            .hydrate_candidates_with(
                &query,
                candidates,
                &self.hydrators,
                stage::HYDRATOR,
                &mut component_metrics,
            )
            .await;
        hydrating += hydrate_start.elapsed();

        let filter_start = Instant::now();
        let FilterOutcome { kept, removed } = self
            .filter_candidates_with(
                &query,
                candidates,
                &self.filters,
                stage::FILTER,
                &mut component_metrics,
            )
            .await;
        let mut filtering = filter_start.elapsed();
        let filtered = removed.len();
        let mut all_removed = removed;
        metrics::record_candidate_count("filtered", kept.len() as u64);

        let scoring_start = Instant::now();
        let scored = self
            .score_candidates(&query, kept, &mut component_metrics)
            .await;
        let scoring = scoring_start.elapsed();

        let post_filter_start = Instant::now();
        let (scored, post_removed) = self
            .post_filter_candidates(&query, scored, &mut component_metrics)
            .await;
        filtering += post_filter_start.elapsed();
        let post_filtered = post_removed.len();
        all_removed.extend(post_removed);

        let score_details = if self.config.debug {
            scored
                .iter()
                .map(|sc| {
                    (
                        sc.candidate.post_id.clone(),
                        ScoreDetail {
                            score: sc.score,
                            breakdown: sc.breakdown.clone(),
                        },
                    )
                })
                .collect()
        } else {
            HashMap::new()
        };

        let select_start = Instant::now();
        let mut selected = self.select_candidates(&query, scored);
        let selecting = select_start.elapsed();

        let mut post_selection_hydrating = Duration::ZERO;
        if !self.post_selection_hydrators.is_empty() && !selected.is_empty() {
            let start = Instant::now();
            selected = self
                .hydrate_candidates_with(
                    &query,
                    selected,
                    &self.post_selection_hydrators,
                    stage::POST_SELECTION_HYDRATOR,
                    &mut component_metrics,
                )
                .await;
            post_selection_hydrating = start.elapsed();
        }

        let mut post_selection_filtering = Duration::ZERO;
        let mut post_selection_filtered = 0;
        if !self.post_selection_filters.is_empty() && !selected.is_empty() {
            let start = Instant::now();
            let FilterOutcome { kept, removed } = self
                .filter_candidates_with(
                    &query,
                    selected,
                    &self.post_selection_filters,
                    stage::POST_SELECTION_FILTER,
                    &mut component_metrics,
                )
                .await;
            post_selection_filtering = start.elapsed();
            selected = kept;
            post_selection_filtered = removed.len();
            all_removed.extend(removed);
        }

        // Selection oversamples so post-selection drops can still fill the
        // page; the page size contract is enforced here.
        if selected.len() > query.limit {
            selected.truncate(query.limit);
        }
        metrics::record_candidate_count("selected", selected.len() as u64);

        self.spawn_side_effects(&query, &selected);

        let total = started.elapsed();
        metrics::record_pipeline_duration(total);

        debug!(
            request_id = %query.request_id,
            retrieved,
            filtered,
            post_filtered,
            post_selection_filtered,
            selected = selected.len(),
            total_ms = total.as_millis() as u64,
            "pipeline completed"
        );

        PipelineResult {
            request_id: query.request_id.clone(),
            counts: PipelineCounts {
                retrieved,
                filtered,
                post_filtered,
                post_selection_filtered,
                selected: selected.len(),
            },
            timing: PipelineTiming {
                total_ms: total.as_millis() as u64,
                sourcing_ms: sourcing.as_millis() as u64,
                hydrating_ms: hydrating.as_millis() as u64,
                filtering_ms: filtering.as_millis() as u64,
                scoring_ms: scoring.as_millis() as u64,
                selecting_ms: selecting.as_millis() as u64,
                post_selection_hydrating_ms: post_selection_hydrating.as_millis() as u64,
                post_selection_filtering_ms: post_selection_filtering.as_millis() as u64,
            },
            selected,
            removed: all_removed,
            component_metrics,
            score_details,
        }
    }

    async fn hydrate_query(
        &self,
        mut query: FeedQuery,
        component_metrics: &mut Vec<ComponentMetric>,
    ) -> FeedQuery {
        let enabled: Vec<_> = self
            .query_hydrators
            .iter()
            .filter(|h| h.enable(&query))
            .cloned()
            .collect();
        if enabled.is_empty() {
            return query;
        }

        let runs = {
            let query = &query;
            join_all(enabled.iter().map(|hydrator| async move {
                run_component(
                    self.config.component_timeout_ms,
                    stage::QUERY_HYDRATOR,
                    hydrator.name(),
                    hydrator.hydrate(query),
                )
                .await
            }))
            .await
        };

        for (hydrator, (duration, outcome)) in enabled.iter().zip(runs) {
            match outcome {
                Ok(update) => {
                    self.record_component(
                        component_metrics,
                        stage::QUERY_HYDRATOR,
                        hydrator.name(),
                        duration,
                        None,
                    );
                    update.apply_to(&mut query);
                }
                Err(err) => self.record_component(
                    component_metrics,
                    stage::QUERY_HYDRATOR,
                    hydrator.name(),
                    duration,
                    Some(&err),
                ),
            }
        }
        query
    }

    async fn fetch_candidates(
        &self,
        query: &FeedQuery,
        component_metrics: &mut Vec<ComponentMetric>,
    ) -> Vec<FeedCandidate> {
        let enabled: Vec<_> = self
            .sources
            .iter()
            .filter(|s| s.enable(query))
            .cloned()
            .collect();

        let runs = join_all(enabled.iter().map(|source| async move {
            run_component(
                self.config.component_timeout_ms,
                stage::SOURCE,
                source.name(),
                source.get_candidates(query),
            )
            .await
        }))
        .await;

        let mut candidates = Vec::new();
        for (source, (duration, outcome)) in enabled.iter().zip(runs) {
            match outcome {
                Ok(mut batch) => {
                    self.record_component(
                        component_metrics,
                        stage::SOURCE,
                        source.name(),
                        duration,
                        None,
                    );
                    debug!(source = source.name(), count = batch.len(), "source done");
                    for candidate in &mut batch {
                        if candidate.recall_source.is_none() {
                            candidate.recall_source = Some(source.name().to_string());
                        }
                    }
                    candidates.append(&mut batch);
                }
                Err(err) => self.record_component(
                    component_metrics,
                    stage::SOURCE,
                    source.name(),
                    duration,
                    Some(&err),
                ),
            }
        }
        candidates
    }

    async fn hydrate_candidates_with(
        &self,
        query: &FeedQuery,
        candidates: Vec<FeedCandidate>,
        hydrators: &[Arc<dyn CandidateHydrator>],
        stage_label: &'static str,
        component_metrics: &mut Vec<ComponentMetric>,
    ) -> Vec<FeedCandidate> {
        if candidates.is_empty() {
            return candidates;
        }
        let enabled: Vec<_> = hydrators
            .iter()
            .filter(|h| h.enable(query))
            .cloned()
            .collect();
        if enabled.is_empty() {
            return candidates;
        }

        // Hydrators run in parallel against the same input snapshot; their
        // field updates are folded in sequentially afterwards.
        let runs = {
            let candidates = &candidates;
            join_all(enabled.iter().map(|hydrator| async move {
                run_component(
                    self.config.component_timeout_ms,
                    stage_label,
                    hydrator.name(),
                    hydrator.hydrate(query, candidates),
                )
                .await
            }))
            .await
        };

        let mut merged = candidates;
        for (hydrator, (duration, outcome)) in enabled.iter().zip(runs) {
            match outcome {
                Ok(hydrated) => {
                    self.record_component(
                        component_metrics,
                        stage_label,
                        hydrator.name(),
                        duration,
                        None,
                    );
                    if hydrated.len() != merged.len() {
                        warn!(
                            stage = stage_label,
                            name = hydrator.name(),
                            expected = merged.len(),
                            got = hydrated.len(),
                            "hydrator output length mismatch, skipping update"
                        );
                        continue;
                    }
                    for (current, new) in merged.iter_mut().zip(hydrated.iter()) {
                        hydrator.update(current, new);
                    }
                }
                Err(err) => self.record_component(
                    component_metrics,
                    stage_label,
                    hydrator.name(),
                    duration,
                    Some(&err),
                ),
            }
        }
        merged
    }

    async fn filter_candidates_with(
        &self,
        query: &FeedQuery,
        candidates: Vec<FeedCandidate>,
        filters: &[Arc<dyn CandidateFilter>],
        stage_label: &'static str,
        component_metrics: &mut Vec<ComponentMetric>,
    ) -> FilterOutcome {
        let mut kept = candidates;
        let mut all_removed = Vec::new();

        for filter in filters {
            if !filter.enable(query) {
                continue;
            }
            let (duration, outcome) = run_component(
                self.config.component_timeout_ms,
                stage_label,
                filter.name(),
                filter.filter(query, kept.clone()),
            )
            .await;
            match outcome {
                Ok(outcome) => {
                    self.record_component(
                        component_metrics,
                        stage_label,
                        filter.name(),
                        duration,
                        None,
                    );
                    kept = outcome.kept;
                    all_removed.extend(outcome.removed);
                }
                Err(err) => self.record_component(
                    component_metrics,
                    stage_label,
                    filter.name(),
                    duration,
                    Some(&err),
                ),
            }
        }

        FilterOutcome {
            kept,
            removed: all_removed,
        }
    }

    async fn score_candidates(
        &self,
        query: &FeedQuery,
        candidates: Vec<FeedCandidate>,
        component_metrics: &mut Vec<ComponentMetric>,
    ) -> Vec<ScoredCandidate> {
        if candidates.is_empty() {
            return Vec::new();
        }
        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .map(|c| ScoredCandidate::new(c, 0.0))
            .collect();

        for scorer in &self.scorers {
            if !scorer.enable(query) {
                continue;
            }
            let inputs: Vec<FeedCandidate> =
                scored.iter().map(|sc| sc.candidate.clone()).collect();
            let (duration, outcome) = run_component(
                self.config.component_timeout_ms,
                stage::SCORER,
                scorer.name(),
                scorer.score(query, &inputs),
            )
            .await;
            match outcome {
                Ok(rescored) => {
                    self.record_component(
                        component_metrics,
                        stage::SCORER,
                        scorer.name(),
                        duration,
                        None,
                    );
                    if rescored.len() != scored.len() {
                        warn!(
                            name = scorer.name(),
                            expected = scored.len(),
                            got = rescored.len(),
                            "scorer output length mismatch, skipping update"
                        );
                        continue;
                    }
                    for (slot, new) in scored.iter_mut().zip(rescored.iter()) {
                        scorer.update(&mut slot.candidate, new);
                        slot.score = new.score;
                        for (scorer_name, value) in &new.breakdown {
                            slot.breakdown.insert(scorer_name.clone(), *value);
                        }
                    }
                }
                Err(err) => self.record_component(
                    component_metrics,
                    stage::SCORER,
                    scorer.name(),
                    duration,
                    Some(&err),
                ),
            }
        }
        scored
    }

    async fn post_filter_candidates(
        &self,
        query: &FeedQuery,
        scored: Vec<ScoredCandidate>,
        component_metrics: &mut Vec<ComponentMetric>,
    ) -> (Vec<ScoredCandidate>, Vec<FeedCandidate>) {
        if self.post_filters.is_empty() || scored.is_empty() {
            return (scored, Vec::new());
        }

        let mut candidates: Vec<FeedCandidate> =
            scored.iter().map(|sc| sc.candidate.clone()).collect();
        for filter in &self.post_filters {
            if !filter.enable(query) {
                continue;
            }
            let (duration, outcome) = run_component(
                self.config.component_timeout_ms,
                stage::POST_FILTER,
                filter.name(),
                filter.filter(query, candidates.clone()),
            )
            .await;
            match outcome {
                Ok(outcome) => {
                    self.record_component(
                        component_metrics,
                        stage::POST_FILTER,
                        filter.name(),
                        duration,
                        None,
                    );
                    candidates = outcome.kept;
                }
                Err(err) => self.record_component(
                    component_metrics,
                    stage::POST_FILTER,
                    filter.name(),
                    duration,
                    Some(&err),
                ),
            }
        }

        let kept_ids: std::collections::HashSet<&str> =
            candidates.iter().map(|c| c.post_id.as_str()).collect();
        let (kept, removed): (Vec<_>, Vec<_>) = scored
            .into_iter()
            .partition(|sc| kept_ids.contains(sc.candidate.post_id.as_str()));
        (kept, removed.into_iter().map(|sc| sc.candidate).collect())
    }

    fn select_candidates(
        &self,
        query: &FeedQuery,
        mut scored: Vec<ScoredCandidate>,
    ) -> Vec<FeedCandidate> {
        if let Some(selector) = &self.selector {
            if selector.enable(query) {
                return selector.select(query, scored);
            }
        }
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(self.config.default_result_size);
        scored.into_iter().map(|sc| sc.candidate).collect()
    }

    fn spawn_side_effects(&self, query: &FeedQuery, selected: &[FeedCandidate]) {
        for side_effect in &self.side_effects {
            if !side_effect.enable(query) {
                continue;
            }
            let side_effect = Arc::clone(side_effect);
            let query = query.clone();
            let selected = selected.to_vec();
            tokio::spawn(async move {
                if let Err(err) = side_effect.run(&query, &selected).await {
                    warn!(name = side_effect.name(), error = %err, "side effect failed");
                }
            });
        }
    }

    fn record_component(
        &self,
        component_metrics: &mut Vec<ComponentMetric>,
        stage: &'static str,
        name: &'static str,
        duration: Duration,
        error: Option<&StageError>,
    ) {
        metrics::record_component(stage, name, duration, error.map(|e| e.kind()));
        if self.config.capture_component_metrics {
            component_metrics.push(ComponentMetric {
                stage,
                name,
                duration_ms: duration.as_millis() as u64,
                timed_out: matches!(error, Some(StageError::Timeout { .. })),
                error: error.map(|e| e.to_string()),
            });
        }
        if let Some(err) = error {
            warn!(stage, name, error = %err, "pipeline component failed");
        }
    }
}

async fn run_component<T, F>(
    timeout_ms: Option<u64>,
    stage: &'static str,
    name: &'static str,
    fut: F,
) -> (Duration, Result<T, StageError>)
where
    F: Future<Output = anyhow::Result<T>>,
{
    let start = Instant::now();
    let outcome = match timeout_ms {
        Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(cause)) => Err(StageError::Unavailable {
                stage,
                name: name.to_string(),
                cause,
            }),
            Err(_) => Err(StageError::Timeout {
                stage,
                name: name.to_string(),
                timeout_ms: ms,
            }),
        },
        None => fut.await.map_err(|cause| StageError::Unavailable {
            stage,
            name: name.to_string(),
            cause,
        }),
    };
    (start.elapsed(), outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PostRecord;
    use async_trait::async_trait;
    use chrono::Utc;

    fn candidate(id: &str) -> FeedCandidate {
        FeedCandidate::from_post(&PostRecord {
            id: id.to_string(),
            author_id: format!("author-{id}"),
            created_at: Utc::now(),
            ..PostRecord::default()
        })
    }

    struct ListSource {
        name: &'static str,
        candidates: Vec<FeedCandidate>,
    }

    #[async_trait]
    impl Source for ListSource {
        fn name(&self) -> &'static str {
            self.name
        }
        async fn get_candidates(&self, _query: &FeedQuery) -> anyhow::Result<Vec<FeedCandidate>> {
            Ok(self.candidates.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl Source for FailingSource {
        fn name(&self) -> &'static str {
            "FailingSource"
        }
        async fn get_candidates(&self, _query: &FeedQuery) -> anyhow::Result<Vec<FeedCandidate>> {
            anyhow::bail!("backend down")
        }
    }

    struct SlowSource;

    #[async_trait]
    impl Source for SlowSource {
        fn name(&self) -> &'static str {
            "SlowSource"
        }
        async fn get_candidates(&self, _query: &FeedQuery) -> anyhow::Result<Vec<FeedCandidate>> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(vec![candidate("slow")])
        }
    }

    struct FixedScorer {
        name: &'static str,
        scores: Vec<f64>,
    }

    #[async_trait]
    impl Scorer for FixedScorer {
        fn name(&self) -> &'static str {
            self.name
        }
        async fn score(
            &self,
            _query: &FeedQuery,
            candidates: &[FeedCandidate],
        ) -> anyhow::Result<Vec<ScoredCandidate>> {
            Ok(candidates
                .iter()
                .zip(self.scores.iter())
                .map(|(c, score)| {
                    ScoredCandidate::new(c.clone(), *score).with_breakdown(self.name, *score)
                })
                .collect())
        }
        fn update(&self, current: &mut FeedCandidate, scored: &ScoredCandidate) {
            current.score = Some(scored.score);
        }
    }

    struct ShortScorer;

    #[async_trait]
    impl Scorer for ShortScorer {
        fn name(&self) -> &'static str {
            "ShortScorer"
        }
        async fn score(
            &self,
            _query: &FeedQuery,
            _candidates: &[FeedCandidate],
        ) -> anyhow::Result<Vec<ScoredCandidate>> {
            Ok(vec![])
        }
        fn update(&self, current: &mut FeedCandidate, _scored: &ScoredCandidate) {
            current.score = Some(-1.0);
        }
    }

    struct DropFirstFilter;

    #[async_trait]
    impl CandidateFilter for DropFirstFilter {
        fn name(&self) -> &'static str {
            "DropFirstFilter"
        }
        async fn filter(
            &self,
            _query: &FeedQuery,
            mut candidates: Vec<FeedCandidate>,
        ) -> anyhow::Result<FilterOutcome> {
            if candidates.is_empty() {
                return Ok(FilterOutcome::default());
            }
            let removed = candidates.remove(0);
            Ok(FilterOutcome {
                kept: candidates,
                removed: vec![removed],
            })
        }
    }

    struct FailingFilter;

    #[async_trait]
    impl CandidateFilter for FailingFilter {
        fn name(&self) -> &'static str {
            "FailingFilter"
        }
        async fn filter(
            &self,
            _query: &FeedQuery,
            _candidates: Vec<FeedCandidate>,
        ) -> anyhow::Result<FilterOutcome> {
            anyhow::bail!("filter backend down")
        }
    }

    fn pipeline_config() -> PipelineConfig {
        PipelineConfig {
            component_timeout_ms: None,
            ..PipelineConfig::default()
        }
    }

    #[tokio::test]
    async fn merges_sources_in_registration_order_and_annotates_recall_source() {
        let mut preset = candidate("p2");
        preset.recall_source = Some("PresetSource".to_string());

        let pipeline = FeedPipeline::new(pipeline_config())
            .with_source(Arc::new(ListSource {
                name: "SourceA",
                candidates: vec![candidate("p1")],
            }))
            .with_source(Arc::new(ListSource {
                name: "SourceB",
                candidates: vec![preset],
            }));

        let result = pipeline.execute(FeedQuery::new("u1", 20)).await;
        assert_eq!(result.counts.retrieved, 2);
        assert_eq!(result.selected[0].post_id, "p1");
        assert_eq!(result.selected[0].recall_source.as_deref(), Some("SourceA"));
        assert_eq!(
            result.selected[1].recall_source.as_deref(),
            Some("PresetSource")
        );
    }

    #[tokio::test]
    async fn failing_source_degrades_to_empty_and_is_recorded() {
        let pipeline = FeedPipeline::new(pipeline_config())
            .with_source(Arc::new(FailingSource))
            .with_source(Arc::new(ListSource {
                name: "SourceB",
                candidates: vec![candidate("p1")],
            }));

        let result = pipeline.execute(FeedQuery::new("u1", 20)).await;
        assert_eq!(result.selected.len(), 1);

        let failed: Vec<_> = result
            .component_metrics
            .iter()
            .filter(|m| m.error.is_some())
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].name, "FailingSource");
        assert_eq!(failed[0].stage, "Source");
        assert!(!failed[0].timed_out);
    }

    #[tokio::test]
    async fn slow_component_times_out_and_is_flagged() {
        let config = PipelineConfig {
            component_timeout_ms: Some(20),
            ..PipelineConfig::default()
        };
        let pipeline = FeedPipeline::new(config).with_source(Arc::new(SlowSource));

        let result = pipeline.execute(FeedQuery::new("u1", 20)).await;
        assert!(result.selected.is_empty());
        let timed_out: Vec<_> = result
            .component_metrics
            .iter()
            .filter(|m| m.timed_out)
            .collect();
        assert_eq!(timed_out.len(), 1);
        assert_eq!(timed_out[0].name, "SlowSource");
    }

    #[tokio::test]
    async fn source_pool_is_capped_at_max_candidates() {
        let config = PipelineConfig {
            max_candidates: 3,
            component_timeout_ms: None,
            ..PipelineConfig::default()
        };
        let many: Vec<FeedCandidate> = (0..10).map(|i| candidate(&format!("p{i}"))).collect();
        let pipeline = FeedPipeline::new(config).with_source(Arc::new(ListSource {
            name: "Big",
            candidates: many,
        }));

        let result = pipeline.execute(FeedQuery::new("u1", 20)).await;
        assert_eq!(result.counts.retrieved, 3);
    }

    #[tokio::test]
    async fn failing_filter_keeps_its_input() {
        let pipeline = FeedPipeline::new(pipeline_config())
            .with_source(Arc::new(ListSource {
                name: "S",
                candidates: vec![candidate("p1"), candidate("p2")],
            }))
            .with_filter(Arc::new(FailingFilter))
            .with_filter(Arc::new(DropFirstFilter));

        let result = pipeline.execute(FeedQuery::new("u1", 20)).await;
        assert_eq!(result.selected.len(), 1);
        assert_eq!(result.counts.filtered, 1);
        assert_eq!(result.removed.len(), 1);
        assert_eq!(result.removed[0].post_id, "p1");
    }

    #[tokio::test]
    async fn later_scorer_overwrites_score_and_merges_breakdown() {
        let pipeline = FeedPipeline::new(pipeline_config())
            .with_source(Arc::new(ListSource {
                name: "S",
                candidates: vec![candidate("p1"), candidate("p2")],
            }))
            .with_scorer(Arc::new(FixedScorer {
                name: "First",
                scores: vec![1.0, 2.0],
            }))
            .with_scorer(Arc::new(FixedScorer {
                name: "Second",
                scores: vec![10.0, 5.0],
            }));

        let config = PipelineConfig {
            debug: true,
            component_timeout_ms: None,
            ..PipelineConfig::default()
        };
        let pipeline = FeedPipeline {
            config,
            ..pipeline
        };

        let result = pipeline.execute(FeedQuery::new("u1", 20)).await;
        // Default selection sorts by the last wrapper score, descending.
        assert_eq!(result.selected[0].post_id, "p1");
        assert_eq!(result.selected[0].score, Some(10.0));

        let detail = result.score_details.get("p1").expect("debug detail");
        assert_eq!(detail.score, 10.0);
        assert_eq!(detail.breakdown.get("First"), Some(&1.0));
        assert_eq!(detail.breakdown.get("Second"), Some(&10.0));
    }

    #[tokio::test]
    async fn scorer_length_mismatch_is_skipped() {
        let pipeline = FeedPipeline::new(pipeline_config())
            .with_source(Arc::new(ListSource {
                name: "S",
                candidates: vec![candidate("p1"), candidate("p2")],
            }))
            .with_scorer(Arc::new(FixedScorer {
                name: "Good",
                scores: vec![3.0, 4.0],
            }))
            .with_scorer(Arc::new(ShortScorer));

        let result = pipeline.execute(FeedQuery::new("u1", 20)).await;
        // ShortScorer's update never ran; the wrapper scores from Good stand.
        assert_eq!(result.selected[0].post_id, "p2");
        assert_eq!(result.selected[0].score, Some(4.0));
    }

    #[tokio::test]
    async fn final_page_is_truncated_to_query_limit() {
        let many: Vec<FeedCandidate> = (0..30).map(|i| candidate(&format!("p{i}"))).collect();
        let pipeline = FeedPipeline::new(pipeline_config()).with_source(Arc::new(ListSource {
            name: "S",
            candidates: many,
        }));

        let result = pipeline.execute(FeedQuery::new("u1", 5)).await;
        assert_eq!(result.selected.len(), 5);
        assert_eq!(result.counts.selected, 5);
    }

    #[tokio::test]
    async fn side_effects_run_detached_with_final_page() {
        struct ChannelSideEffect {
            tx: tokio::sync::mpsc::UnboundedSender<usize>,
        }

        #[async_trait]
        impl SideEffect for ChannelSideEffect {
            fn name(&self) -> &'static str {
                "ChannelSideEffect"
            }
            async fn run(
                &self,
                _query: &FeedQuery,
                selected: &[FeedCandidate],
            ) -> anyhow::Result<()> {
                self.tx.send(selected.len()).ok();
                Ok(())
            }
        }

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let pipeline = FeedPipeline::new(pipeline_config())
            .with_source(Arc::new(ListSource {
                name: "S",
                candidates: vec![candidate("p1"), candidate("p2")],
            }))
            .with_side_effect(Arc::new(ChannelSideEffect { tx }));

        let result = pipeline.execute(FeedQuery::new("u1", 1)).await;
        assert_eq!(result.selected.len(), 1);

        let seen = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("side effect ran")
            .expect("channel open");
        assert_eq!(seen, 1);
    }
}
