// In-memory backends for the integration tests. The pipeline only knows the
// storage and client traits, so these stand in for the real content store,
// social graph, interaction log, and ML sidecars.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};

use feed_ranking::clients::{
    PhoenixPrediction, PredictionClient, PredictionRequest, SafetyCheckItem, SafetyClient,
    SafetyVerdict,
};
use feed_ranking::config::Config;
use feed_ranking::experiment::ExperimentRegistry;
use feed_ranking::models::{
    AuthorProfile, ImpressionRecord, NewsMetadata, PhoenixScores, PostQuery, PostRecord,
    UserAction, VfVerdict,
};
use feed_ranking::services::{FeedClients, FeedMixer, FeedStores};
use feed_ranking::stores::{
    AccountSummary, ContentStore, EngagementFlags, InteractionStore, MemoryServedStore, UserStore,
};

// ============================================
// Record builders
// ============================================

pub fn post(id: &str, author: &str, hours_ago: i64) -> PostRecord {
    PostRecord {
        id: id.to_string(),
        author_id: author.to_string(),
        text: format!("post {id} by {author}"),
        created_at: Utc::now() - ChronoDuration::hours(hours_ago),
        ..PostRecord::default()
    }
}

pub fn liked(mut record: PostRecord, likes: u64) -> PostRecord {
    record.like_count = likes;
    record
}

pub fn repost_of(id: &str, author: &str, original: &str, hours_ago: i64) -> PostRecord {
    PostRecord {
        is_repost: true,
        original_post_id: Some(original.to_string()),
        ..post(id, author, hours_ago)
    }
}

pub fn news_post(id: &str, external_id: &str, domain: &str, hours_ago: i64) -> PostRecord {
    PostRecord {
        is_news: true,
        news_metadata: Some(NewsMetadata {
            external_id: Some(external_id.to_string()),
            source_url: Some(format!("https://{domain}/story/{external_id}")),
            ..NewsMetadata::default()
        }),
        ..post(id, "news-bot", hours_ago)
    }
}

pub fn safe_verdict(level: &str) -> VfVerdict {
    VfVerdict {
        safe: true,
        reason: None,
        level: Some(level.to_string()),
        score: None,
        violations: vec![],
        requires_review: false,
    }
}

pub fn unsafe_verdict(reason: &str) -> VfVerdict {
    VfVerdict {
        safe: false,
        reason: Some(reason.to_string()),
        level: Some("high".to_string()),
        score: Some(0.95),
        violations: vec![reason.to_string()],
        requires_review: false,
    }
}

// ============================================
// Storage fakes
// ============================================

#[derive(Default)]
pub struct InMemoryContent {
    posts: Mutex<Vec<PostRecord>>,
}

impl InMemoryContent {
    pub fn new(posts: Vec<PostRecord>) -> Self {
        Self {
            posts: Mutex::new(posts),
        }
    }

    pub fn push(&self, record: PostRecord) {
        self.posts.lock().unwrap().push(record);
    }
}

#[async_trait]
impl ContentStore for InMemoryContent {
    async fn find_posts(&self, query: &PostQuery) -> anyhow::Result<Vec<PostRecord>> {
        let posts = self.posts.lock().unwrap();
        let mut matched: Vec<PostRecord> = posts
            .iter()
            .filter(|p| match &query.author_ids {
                Some(ids) => ids.contains(&p.author_id),
                None => true,
            })
            .filter(|p| !query.exclude_author_ids.contains(&p.author_id))
            .filter(|p| query.created_after.map_or(true, |t| p.created_at > t))
            .filter(|p| query.created_before.map_or(true, |t| p.created_at < t))
            .filter(|p| query.is_news.map_or(true, |news| p.is_news == news))
            .filter(|p| {
                query
                    .min_engagement
                    .map_or(true, |floor| p.engagement_score() >= floor)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if query.limit > 0 {
            matched.truncate(query.limit);
        }
        Ok(matched)
    }

    async fn find_by_ids(&self, ids: &[String]) -> anyhow::Result<Vec<PostRecord>> {
        let posts = self.posts.lock().unwrap();
        Ok(posts.iter().filter(|p| ids.contains(&p.id)).cloned().collect())
    }

    async fn find_by_external_ids(
        &self,
        external_ids: &[String],
    ) -> anyhow::Result<Vec<PostRecord>> {
        let posts = self.posts.lock().unwrap();
        Ok(posts
            .iter()
            .filter(|p| {
                p.news_metadata
                    .as_ref()
                    .and_then(|m| m.external_id.as_ref())
                    .map_or(false, |ext| external_ids.contains(ext))
            })
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryUsers {
    following: Mutex<HashMap<String, HashSet<String>>>,
    blocked: Mutex<HashMap<String, HashSet<String>>>,
    muted: Mutex<HashMap<String, Vec<String>>>,
    summaries: Mutex<HashMap<String, AccountSummary>>,
    profiles: Mutex<HashMap<String, AuthorProfile>>,
}

impl InMemoryUsers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn follow(&self, user: &str, author: &str) {
        self.following
            .lock()
            .unwrap()
            .entry(user.to_string())
            .or_default()
            .insert(author.to_string());
    }

    pub fn block(&self, user: &str, author: &str) {
        self.blocked
            .lock()
            .unwrap()
            .entry(user.to_string())
            .or_default()
            .insert(author.to_string());
    }

    pub fn mute_keyword(&self, user: &str, keyword: &str) {
        self.muted
            .lock()
            .unwrap()
            .entry(user.to_string())
            .or_default()
            .push(keyword.to_string());
    }

    pub fn add_profile(&self, user_id: &str, username: &str) {
        self.profiles.lock().unwrap().insert(
            user_id.to_string(),
            AuthorProfile {
                user_id: user_id.to_string(),
                username: username.to_string(),
                avatar_url: None,
            },
        );
    }
}

#[async_trait]
impl UserStore for InMemoryUsers {
    async fn followed_user_ids(&self, user_id: &str) -> anyhow::Result<HashSet<String>> {
        Ok(self
            .following
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn blocked_user_ids(&self, user_id: &str) -> anyhow::Result<HashSet<String>> {
        Ok(self
            .blocked
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn muted_keywords(&self, user_id: &str) -> anyhow::Result<Vec<String>> {
        Ok(self
            .muted
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn account_summary(&self, user_id: &str) -> anyhow::Result<AccountSummary> {
        Ok(self
            .summaries
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn profiles_by_ids(&self, user_ids: &[String]) -> anyhow::Result<Vec<AuthorProfile>> {
        let profiles = self.profiles.lock().unwrap();
        Ok(user_ids
            .iter()
            .filter_map(|id| profiles.get(id).cloned())
            .collect())
    }
}

/// Interaction log that also captures every impression written to it, so
/// tests can assert on the detached side-effect output.
#[derive(Default)]
pub struct RecordingInteractions {
    actions: Mutex<HashMap<String, Vec<UserAction>>>,
    seen: Mutex<HashMap<String, HashSet<String>>>,
    liked: Mutex<HashMap<String, HashSet<String>>>,
    impressions: Mutex<Vec<ImpressionRecord>>,
}

impl RecordingInteractions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_action(&self, user: &str, action_type: &str, post_id: &str) {
        self.actions
            .lock()
            .unwrap()
            .entry(user.to_string())
            .or_default()
            .push(UserAction {
                action_type: action_type.to_string(),
                target_post_id: Some(post_id.to_string()),
                target_author_id: None,
                created_at: Utc::now(),
                dwell_time_ms: None,
            });
    }

    pub fn mark_seen(&self, user: &str, post_id: &str) {
        self.seen
            .lock()
            .unwrap()
            .entry(user.to_string())
            .or_default()
            .insert(post_id.to_string());
    }

    pub fn mark_liked(&self, user: &str, post_id: &str) {
        self.liked
            .lock()
            .unwrap()
            .entry(user.to_string())
            .or_default()
            .insert(post_id.to_string());
    }

    pub fn recorded_impressions(&self) -> Vec<ImpressionRecord> {
        self.impressions.lock().unwrap().clone()
    }
}

#[async_trait]
impl InteractionStore for RecordingInteractions {
    async fn recent_actions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<UserAction>> {
        let mut actions = self
            .actions
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default();
        actions.truncate(limit);
        Ok(actions)
    }

    async fn seen_post_ids(&self, user_id: &str) -> anyhow::Result<HashSet<String>> {
        Ok(self
            .seen
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn engagement_flags(
        &self,
        user_id: &str,
        post_ids: &[String],
    ) -> anyhow::Result<EngagementFlags> {
        let liked = self
            .liked
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default();
        Ok(EngagementFlags {
            liked: post_ids.iter().filter(|id| liked.contains(*id)).cloned().collect(),
            reposted: HashSet::new(),
        })
    }

    async fn record_impressions(&self, impressions: &[ImpressionRecord]) -> anyhow::Result<()> {
        self.impressions.lock().unwrap().extend_from_slice(impressions);
        Ok(())
    }
}

// ============================================
// Client fakes
// ============================================

/// Prediction service that answers from a fixed score table. Responses come
/// back sorted by descending post id, never in request order, so tests
/// catch any positional mapping of predictions.
pub struct ScriptedPredictions {
    by_id: HashMap<String, PhoenixScores>,
    requests: Mutex<Vec<PredictionRequest>>,
}

impl ScriptedPredictions {
    pub fn new(rows: Vec<(&str, PhoenixScores)>) -> Self {
        Self {
            by_id: rows
                .into_iter()
                .map(|(id, scores)| (id.to_string(), scores))
                .collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn seen_requests(&self) -> Vec<PredictionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PredictionClient for ScriptedPredictions {
    async fn predict(
        &self,
        request: &PredictionRequest,
    ) -> anyhow::Result<Vec<PhoenixPrediction>> {
        self.requests.lock().unwrap().push(request.clone());
        let mut rows: Vec<PhoenixPrediction> = request
            .candidates
            .iter()
            .filter_map(|c| {
                self.by_id.get(&c.post_id).map(|scores| PhoenixPrediction {
                    post_id: c.post_id.clone(),
                    scores: scores.clone(),
                })
            })
            .collect();
        rows.sort_by(|a, b| b.post_id.cmp(&a.post_id));
        Ok(rows)
    }
}

/// Safety sidecar answering from a fixed verdict table. Posts missing from
/// the table get the default verdict, or no verdict at all when there is
/// none, like a partial service response.
pub struct StaticSafety {
    default: Option<VfVerdict>,
    verdicts: HashMap<String, VfVerdict>,
}

impl StaticSafety {
    pub fn new(rows: Vec<(&str, VfVerdict)>) -> Self {
        Self {
            default: None,
            verdicts: rows
                .into_iter()
                .map(|(id, verdict)| (id.to_string(), verdict))
                .collect(),
        }
    }

    /// Everything is safe unless overridden. The usual harness client: it
    /// keeps the visibility filter from dropping out-of-network content for
    /// lack of a verdict.
    pub fn all_safe() -> Self {
        Self {
            default: Some(safe_verdict("safe")),
            verdicts: HashMap::new(),
        }
    }

    pub fn with_verdict(mut self, post_id: &str, verdict: VfVerdict) -> Self {
        self.verdicts.insert(post_id.to_string(), verdict);
        self
    }
}

#[async_trait]
impl SafetyClient for StaticSafety {
    async fn check(&self, items: &[SafetyCheckItem]) -> anyhow::Result<Vec<SafetyVerdict>> {
        Ok(items
            .iter()
            .filter_map(|item| {
                self.verdicts
                    .get(&item.post_id)
                    .or(self.default.as_ref())
                    .map(|verdict| SafetyVerdict {
                        post_id: item.post_id.clone(),
                        verdict: verdict.clone(),
                    })
            })
            .collect())
    }
}

// ============================================
// Harness
// ============================================

/// One set of fake backends plus the production mixer assembled on top of
/// them. Handles to the fakes stay available for seeding and assertions.
pub struct TestBackend {
    pub content: Arc<InMemoryContent>,
    pub users: Arc<InMemoryUsers>,
    pub interactions: Arc<RecordingInteractions>,
    pub served: Arc<MemoryServedStore>,
}

static TRACING: Once = Once::new();

/// Opt-in pipeline logs while debugging a test (`RUST_LOG=feed_ranking=debug`).
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

impl TestBackend {
    pub fn new() -> Self {
        init_tracing();
        Self {
            content: Arc::new(InMemoryContent::default()),
            users: Arc::new(InMemoryUsers::new()),
            interactions: Arc::new(RecordingInteractions::new()),
            served: Arc::new(MemoryServedStore::new()),
        }
    }

    pub fn stores(&self) -> FeedStores {
        FeedStores {
            content: self.content.clone(),
            users: self.users.clone(),
            interactions: self.interactions.clone(),
            served: self.served.clone(),
        }
    }

    /// Production assembly over the fakes, with a permissive safety client
    /// so pages are not emptied by the missing-verdict degrade posture.
    pub fn mixer(&self, config: &Config) -> FeedMixer {
        self.mixer_with_clients(
            config,
            FeedClients {
                safety: Some(Arc::new(StaticSafety::all_safe())),
                ..FeedClients::default()
            },
        )
    }

    pub fn mixer_with_clients(&self, config: &Config, clients: FeedClients) -> FeedMixer {
        self.mixer_with_experiments(config, clients, ExperimentRegistry::empty())
    }

    pub fn mixer_with_experiments(
        &self,
        config: &Config,
        clients: FeedClients,
        experiments: ExperimentRegistry,
    ) -> FeedMixer {
        FeedMixer::new(config, self.stores(), clients, Arc::new(experiments), None)
    }
}

/// Polls until `check` passes; side effects run detached from the request,
/// so assertions on their output have to wait for the spawned tasks.
pub async fn eventually(check: impl Fn() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met within 1s");
}
