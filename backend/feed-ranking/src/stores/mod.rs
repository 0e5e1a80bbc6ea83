// Storage seams the pipeline depends on. The pipeline only sees these
// traits; concrete backends are wired in at assembly time.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
#[cfg(test)]
use mockall::automock;
use redis::aio::ConnectionManager;
use tokio::sync::RwLock;
use tracing::warn;

use crate::models::{AuthorProfile, ImpressionRecord, PostQuery, PostRecord, UserAction};

/// Serve-cache TTL: one day.
pub const SERVE_TTL_SECONDS: u64 = 24 * 60 * 60;

/// Per-user cap for the in-memory serve cache fallback.
const MAX_SERVED_PER_USER: usize = 500;

/// Post lookup backing sources and hydrators. `find_posts` returns newest
/// first; id lookups return whatever order the backend produces.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn find_posts(&self, query: &PostQuery) -> anyhow::Result<Vec<PostRecord>>;
    async fn find_by_ids(&self, ids: &[String]) -> anyhow::Result<Vec<PostRecord>>;
    /// News posts carrying any of the given external corpus ids.
    async fn find_by_external_ids(&self, external_ids: &[String])
        -> anyhow::Result<Vec<PostRecord>>;
}

/// Follower-count and account-age snapshot for ranking heuristics.
#[derive(Debug, Clone, Default)]
pub struct AccountSummary {
    pub follower_count: u64,
    pub account_age_days: i64,
}

/// Social graph and profile lookups.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn followed_user_ids(&self, user_id: &str) -> anyhow::Result<HashSet<String>>;
    async fn blocked_user_ids(&self, user_id: &str) -> anyhow::Result<HashSet<String>>;
    async fn muted_keywords(&self, user_id: &str) -> anyhow::Result<Vec<String>>;
    async fn account_summary(&self, user_id: &str) -> anyhow::Result<AccountSummary>;
    async fn profiles_by_ids(&self, user_ids: &[String]) -> anyhow::Result<Vec<AuthorProfile>>;
}

/// Which of a batch of posts the user has liked or reposted.
#[derive(Debug, Clone, Default)]
pub struct EngagementFlags {
    pub liked: HashSet<String>,
    pub reposted: HashSet<String>,
}

/// Engagement history reads and impression writes.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InteractionStore: Send + Sync {
    async fn recent_actions(&self, user_id: &str, limit: usize)
        -> anyhow::Result<Vec<UserAction>>;
    async fn seen_post_ids(&self, user_id: &str) -> anyhow::Result<HashSet<String>>;
    async fn engagement_flags(
        &self,
        user_id: &str,
        post_ids: &[String],
    ) -> anyhow::Result<EngagementFlags>;
    async fn record_impressions(&self, impressions: &[ImpressionRecord]) -> anyhow::Result<()>;
}

/// Tracks which posts a user was already served within the TTL window.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ServedStore: Send + Sync {
    /// Returns the subset of `post_ids` already served to this user.
    async fn contained(
        &self,
        user_id: &str,
        post_ids: &[String],
    ) -> anyhow::Result<HashSet<String>>;
    async fn mark_served(&self, user_id: &str, post_ids: &[String]) -> anyhow::Result<()>;
}

fn serve_key(user_id: &str) -> String {
    format!("serve:{user_id}")
}

/// Redis-backed serve cache: one set per user, refreshed to the full TTL on
/// every write.
pub struct RedisServedStore {
    redis: Arc<RwLock<ConnectionManager>>,
}

impl RedisServedStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self {
            redis: Arc::new(RwLock::new(redis)),
        }
    }
}

#[async_trait]
impl ServedStore for RedisServedStore {
    async fn contained(
        &self,
        user_id: &str,
        post_ids: &[String],
    ) -> anyhow::Result<HashSet<String>> {
        if post_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let key = serve_key(user_id);
        let mut conn = self.redis.write().await;
        let flags: Vec<bool> = redis::cmd("SMISMEMBER")
            .arg(&key)
            .arg(post_ids)
            .query_async(&mut *conn)
            .await
            .map_err(|e| {
                warn!("Redis SMISMEMBER failed for {}: {}", key, e);
                anyhow::anyhow!("redis error: {e}")
            })?;
        Ok(post_ids
            .iter()
            .zip(flags)
            .filter(|(_, hit)| *hit)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn mark_served(&self, user_id: &str, post_ids: &[String]) -> anyhow::Result<()> {
        if post_ids.is_empty() {
            return Ok(());
        }
        let key = serve_key(user_id);
        let mut conn = self.redis.write().await;
        redis::cmd("SADD")
            .arg(&key)
            .arg(post_ids)
            .query_async::<_, ()>(&mut *conn)
            .await
            .map_err(|e| {
                warn!("Redis SADD failed for {}: {}", key, e);
                anyhow::anyhow!("redis error: {e}")
            })?;
        redis::cmd("EXPIRE")
            .arg(&key)
            .arg(SERVE_TTL_SECONDS)
            .query_async::<_, ()>(&mut *conn)
            .await
            .map_err(|e| {
                warn!("Redis EXPIRE failed for {}: {}", key, e);
                anyhow::anyhow!("redis error: {e}")
            })?;
        Ok(())
    }
}

/// In-process fallback used when no Redis url is configured. Keeps the most
/// recent entries per user, oldest dropped first.
#[derive(Default)]
pub struct MemoryServedStore {
    served: DashMap<String, Vec<String>>,
}

impl MemoryServedStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ServedStore for MemoryServedStore {
    async fn contained(
        &self,
        user_id: &str,
        post_ids: &[String],
    ) -> anyhow::Result<HashSet<String>> {
        let Some(entry) = self.served.get(user_id) else {
            return Ok(HashSet::new());
        };
        let known: HashSet<&str> = entry.iter().map(String::as_str).collect();
        Ok(post_ids
            .iter()
            .filter(|id| known.contains(id.as_str()))
            .cloned()
            .collect())
    }

    async fn mark_served(&self, user_id: &str, post_ids: &[String]) -> anyhow::Result<()> {
        let mut entry = self.served.entry(user_id.to_string()).or_default();
        for id in post_ids {
            if !entry.contains(id) {
                entry.push(id.clone());
            }
        }
        if entry.len() > MAX_SERVED_PER_USER {
            let overflow = entry.len() - MAX_SERVED_PER_USER;
            entry.drain(..overflow);
        }
        Ok(())
    }
}
