use std::sync::Arc;

use redis::aio::ConnectionManager;
use tokio::sync::RwLock;
use tracing::debug;

use crate::clients::{AnnClient, GraphClient, PredictionClient, SafetyClient};
use crate::config::Config;
use crate::error::FeedError;
use crate::experiment::ExperimentRegistry;
use crate::metrics;
use crate::models::{FeedRequest, FeedResponse};
use crate::pipeline::{FeedPipeline, PipelineResult};
use crate::stores::{ContentStore, InteractionStore, ServedStore, UserStore};

use super::filters::{
    AgeFilter, BlockedAuthorFilter, ConversationDedupFilter, DedupFilter, MutedKeywordFilter,
    NewsExternalIdDedupFilter, PreviouslyServedFilter, RepostDedupFilter, SeenPostsFilter,
    SelfPostFilter, VisibilityFilter,
};
use super::hydrators::{
    AuthorInfoHydrator, ExperimentContextQueryHydrator, NewsModelContextQueryHydrator,
    UserActionSeqQueryHydrator, UserFeaturesQueryHydrator, UserInteractionHydrator,
    VfCandidateHydrator, VideoInfoHydrator,
};
use super::scorers::{
    AuthorAffinityScorer, AuthorDiversityScorer, ContentQualityScorer, EngagementScorer,
    OonScorer, PhoenixScorer, RecencyScorer, WeightedScorer,
};
use super::selection::TopScoreSelector;
use super::side_effects::{served_id_set, ImpressionLogger, MetricsCollector, ServeCacheSideEffect};
use super::sources::{
    ColdStartSource, FollowingSource, FollowingTimelineReader, GraphSource, NewsAnnSource,
    PopularSource, TwoTowerSource,
};

/// Storage backends the production pipeline reads and writes.
pub struct FeedStores {
    pub content: Arc<dyn ContentStore>,
    pub users: Arc<dyn UserStore>,
    pub interactions: Arc<dyn InteractionStore>,
    pub served: Arc<dyn ServedStore>,
}

/// ML sidecar clients. Every slot is optional; an absent client disables
/// the stages that depend on it instead of failing requests.
#[derive(Default)]
pub struct FeedClients {
    pub ann: Option<Arc<dyn AnnClient>>,
    pub prediction: Option<Arc<dyn PredictionClient>>,
    pub safety: Option<Arc<dyn SafetyClient>>,
    pub graph: Option<Arc<dyn GraphClient>>,
}

/// Feed entry point: one assembled pipeline behind the request/response
/// surface. Construct once per process and share.
pub struct FeedMixer {
    pipeline: FeedPipeline,
    default_result_size: usize,
}

impl FeedMixer {
    /// Assembles the production stage list. Stage order is load-bearing and
    /// matches the phase contracts; see the module docs of each stage group.
    pub fn new(
        config: &Config,
        stores: FeedStores,
        clients: FeedClients,
        experiments: Arc<ExperimentRegistry>,
        redis: Option<Arc<RwLock<ConnectionManager>>>,
    ) -> Self {
        let timeline = Arc::new(FollowingTimelineReader::new(
            redis,
            Arc::clone(&stores.content),
        ));

        let pipeline = FeedPipeline::new(config.pipeline.clone())
            .with_query_hydrator(Arc::new(ExperimentContextQueryHydrator::new(experiments)))
            .with_query_hydrator(Arc::new(UserFeaturesQueryHydrator::new(
                Arc::clone(&stores.users),
                Arc::clone(&stores.interactions),
            )))
            .with_query_hydrator(Arc::new(UserActionSeqQueryHydrator::new(Arc::clone(
                &stores.interactions,
            ))))
            .with_query_hydrator(Arc::new(NewsModelContextQueryHydrator::new(
                Arc::clone(&stores.interactions),
                Arc::clone(&stores.content),
            )))
            .with_source(Arc::new(FollowingSource::new(timeline)))
            .with_source(Arc::new(PopularSource::new(Arc::clone(&stores.content))))
            .with_source(Arc::new(TwoTowerSource::new(
                Arc::clone(&stores.content),
                clients.ann.clone(),
            )))
            .with_source(Arc::new(NewsAnnSource::new(
                Arc::clone(&stores.content),
                clients.ann.clone(),
            )))
            .with_source(Arc::new(ColdStartSource::new(Arc::clone(&stores.content))))
            .with_source(Arc::new(GraphSource::new(
                Arc::clone(&stores.content),
                clients.graph.clone(),
            )))
            .with_hydrator(Arc::new(AuthorInfoHydrator::new(Arc::clone(&stores.users))))
            .with_hydrator(Arc::new(UserInteractionHydrator::new(Arc::clone(
                &stores.interactions,
            ))))
            .with_hydrator(Arc::new(VideoInfoHydrator::new(Arc::clone(&stores.content))))
            .with_filter(Arc::new(DedupFilter))
            .with_filter(Arc::new(NewsExternalIdDedupFilter))
            .with_filter(Arc::new(SelfPostFilter))
            .with_filter(Arc::new(RepostDedupFilter))
            .with_filter(Arc::new(AgeFilter::new(config.ranking.age_window_days)))
            .with_filter(Arc::new(BlockedAuthorFilter))
            .with_filter(Arc::new(MutedKeywordFilter))
            .with_filter(Arc::new(SeenPostsFilter))
            .with_filter(Arc::new(PreviouslyServedFilter))
            .with_scorer(Arc::new(PhoenixScorer::new(clients.prediction.clone())))
            .with_scorer(Arc::new(EngagementScorer))
            .with_scorer(Arc::new(WeightedScorer::new()))
            .with_scorer(Arc::new(ContentQualityScorer::new()))
            .with_scorer(Arc::new(AuthorAffinityScorer))
            .with_scorer(Arc::new(RecencyScorer::new(&config.ranking)))
            .with_scorer(Arc::new(AuthorDiversityScorer::new(&config.ranking)))
            .with_scorer(Arc::new(OonScorer::new(&config.ranking)))
            .with_selector(Arc::new(TopScoreSelector::new(
                config.pipeline.oversample_factor,
            )))
            .with_post_selection_hydrator(Arc::new(VfCandidateHydrator::new(
                clients.safety.clone(),
            )))
            .with_post_selection_filter(Arc::new(VisibilityFilter::new(config.safety.clone())))
            .with_post_selection_filter(Arc::new(ConversationDedupFilter))
            .with_side_effect(Arc::new(ImpressionLogger::new(Arc::clone(
                &stores.interactions,
            ))))
            .with_side_effect(Arc::new(ServeCacheSideEffect::new(Arc::clone(
                &stores.served,
            ))))
            .with_side_effect(Arc::new(MetricsCollector));

        Self {
            pipeline,
            default_result_size: config.pipeline.default_result_size,
        }
    }

    /// Wraps an already-assembled pipeline. Tests and non-standard surfaces
    /// pass their own stage list here.
    pub fn with_pipeline(pipeline: FeedPipeline, default_result_size: usize) -> Self {
        Self {
            pipeline,
            default_result_size,
        }
    }

    pub async fn get_feed(&self, request: FeedRequest) -> Result<FeedResponse, FeedError> {
        if let Err(err) = request.validate() {
            metrics::record_feed_request(match &err {
                FeedError::Validation(_) => "validation_error",
                FeedError::AuthRequired => "auth_error",
            });
            return Err(err);
        }

        let query = request.into_query(self.default_result_size);
        let limit = query.limit;
        let result = self.pipeline.execute(query).await;

        let has_more = result.selected.len() >= limit;
        let next_cursor = result.selected.iter().map(|c| c.created_at).min();
        let served_ids_delta = served_id_set(&result.selected);
        debug!(
            request_id = %result.request_id,
            posts = result.selected.len(),
            has_more,
            "feed page built"
        );
        metrics::record_feed_request("ok");

        Ok(FeedResponse {
            posts: result.selected,
            has_more,
            next_cursor,
            served_ids_delta,
            request_id: result.request_id,
        })
    }

    /// Same execution as [`get_feed`](Self::get_feed), returning the raw
    /// pipeline result with removed candidates, timings, and score
    /// breakdowns. Pair with `PipelineConfig::debug` to keep breakdowns.
    pub async fn get_feed_debug(&self, request: FeedRequest) -> Result<PipelineResult, FeedError> {
        request.validate()?;
        let query = request.into_query(self.default_result_size);
        Ok(self.pipeline.execute(query).await)
    }
}
