use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::models::{PostQuery, PostRecord};
use crate::stores::ContentStore;

/// How far back a timeline read looks.
const WINDOW_DAYS: i64 = 7;

/// Fan-in cap; beyond this many followed authors the oldest-registered rest
/// is ignored for the read.
const MAX_AUTHORS: usize = 2000;

const MIN_PER_AUTHOR: usize = 3;
const MAX_PER_AUTHOR: usize = 30;

/// Fallback-path cache entry lifetime.
const CACHE_TTL: StdDuration = StdDuration::from_secs(60);
const MAX_CACHED_PER_AUTHOR: usize = 200;
const FALLBACK_FETCH_LIMIT: usize = 1000;

fn timeline_key(author_id: &str) -> String {
    format!("tl:author:{author_id}")
}

struct CachedAuthorPosts {
    fetched_at: Instant,
    posts: Vec<PostRecord>,
}

/// Fan-out-on-write reader: per-author Redis sorted sets keyed by
/// `tl:author:{id}`, scored by created-at millis. Reads fan in over the
/// followed authors with a per-author budget so one prolific author cannot
/// crowd out the rest of the merge.
///
/// Without Redis (or when the sets are cold) the reader falls back to the
/// content store, memoizing per-author slices for a short TTL.
pub struct FollowingTimelineReader {
    redis: Option<Arc<RwLock<ConnectionManager>>>,
    content: Arc<dyn ContentStore>,
    cache: DashMap<String, CachedAuthorPosts>,
}

impl FollowingTimelineReader {
    pub fn new(
        redis: Option<Arc<RwLock<ConnectionManager>>>,
        content: Arc<dyn ContentStore>,
    ) -> Self {
        Self {
            redis,
            content,
            cache: DashMap::new(),
        }
    }

    /// Most recent posts by the given authors, newest first, strictly older
    /// than `cursor` when present.
    pub async fn fetch(
        &self,
        author_ids: &[String],
        max_results: usize,
        cursor: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<PostRecord>> {
        if author_ids.is_empty() {
            return Ok(Vec::new());
        }
        let authors = &author_ids[..author_ids.len().min(MAX_AUTHORS)];
        let total = (max_results * 5).max(200);

        if let Some(redis) = &self.redis {
            match self.fetch_from_redis(redis, authors, total, cursor).await {
                Ok(posts) if !posts.is_empty() => return Ok(posts),
                Ok(_) => debug!("timeline sets empty, falling back to content store"),
                Err(err) => warn!(error = %err, "timeline read failed, falling back"),
            }
        }

        self.fetch_from_store(authors, total, cursor).await
    }

    async fn fetch_from_redis(
        &self,
        redis: &Arc<RwLock<ConnectionManager>>,
        authors: &[String],
        total: usize,
        cursor: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<PostRecord>> {
        let budget = total
            .div_ceil(authors.len())
            .clamp(MIN_PER_AUTHOR, MAX_PER_AUTHOR);
        // Exclusive upper bound keeps the cursor post itself off the page.
        let max_score = match cursor {
            Some(cursor) => format!("({}", cursor.timestamp_millis()),
            None => "+inf".to_string(),
        };
        let min_score = (Utc::now() - Duration::days(WINDOW_DAYS))
            .timestamp_millis()
            .to_string();

        let mut pipe = redis::pipe();
        for author_id in authors {
            pipe.cmd("ZREVRANGEBYSCORE")
                .arg(timeline_key(author_id))
                .arg(&max_score)
                .arg(&min_score)
                .arg("WITHSCORES")
                .arg("LIMIT")
                .arg(0)
                .arg(budget);
        }
        let rows: Vec<Vec<(String, f64)>> = {
            let mut conn = redis.write().await;
            pipe.query_async(&mut *conn)
                .await
                .context("timeline fan-in read failed")?
        };

        let mut hits: Vec<(String, f64)> = rows.into_iter().flatten().collect();
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let mut seen = HashSet::new();
        let ordered: Vec<String> = hits
            .into_iter()
            .filter(|(id, _)| seen.insert(id.clone()))
            .map(|(id, _)| id)
            .take(total)
            .collect();
        if ordered.is_empty() {
            return Ok(Vec::new());
        }

        let posts = self.content.find_by_ids(&ordered).await?;
        let mut by_id: HashMap<String, PostRecord> =
            posts.into_iter().map(|p| (p.id.clone(), p)).collect();
        Ok(ordered
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect())
    }

    async fn fetch_from_store(
        &self,
        authors: &[String],
        total: usize,
        cursor: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<PostRecord>> {
        let mut posts: Vec<PostRecord> = Vec::new();
        let mut missing: Vec<String> = Vec::new();
        for author in authors {
            match self.cache.get(author) {
                Some(entry) if entry.fetched_at.elapsed() < CACHE_TTL => {
                    posts.extend(entry.posts.iter().cloned());
                }
                _ => missing.push(author.clone()),
            }
        }

        if !missing.is_empty() {
            let fetched = self
                .content
                .find_posts(&PostQuery {
                    author_ids: Some(missing.clone()),
                    created_after: Some(Utc::now() - Duration::days(WINDOW_DAYS)),
                    limit: (missing.len() * MAX_CACHED_PER_AUTHOR).min(FALLBACK_FETCH_LIMIT),
                    ..PostQuery::default()
                })
                .await?;

            let mut by_author: HashMap<String, Vec<PostRecord>> = HashMap::new();
            for post in fetched {
                by_author.entry(post.author_id.clone()).or_default().push(post);
            }
            for author in missing {
                let mut list = by_author.remove(&author).unwrap_or_default();
                list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                list.truncate(MAX_CACHED_PER_AUTHOR);
                posts.extend(list.iter().cloned());
                self.cache.insert(
                    author,
                    CachedAuthorPosts {
                        fetched_at: Instant::now(),
                        posts: list,
                    },
                );
            }
        }

        if let Some(cursor) = cursor {
            posts.retain(|p| p.created_at < cursor);
        }
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let mut seen = HashSet::new();
        posts.retain(|p| seen.insert(p.id.clone()));
        posts.truncate(total);
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MockContentStore;

    fn post(id: &str, author_id: &str, minutes_ago: i64) -> PostRecord {
        PostRecord {
            id: id.to_string(),
            author_id: author_id.to_string(),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            ..PostRecord::default()
        }
    }

    #[tokio::test]
    async fn fallback_merges_newest_first_and_respects_cursor() {
        let mut content = MockContentStore::new();
        content.expect_find_posts().times(1).returning(|_| {
            Ok(vec![
                post("p1", "a1", 10),
                post("p2", "a2", 5),
                post("p3", "a1", 90),
            ])
        });

        let reader = FollowingTimelineReader::new(None, Arc::new(content));
        let authors = vec!["a1".to_string(), "a2".to_string()];

        let posts = reader.fetch(&authors, 20, None).await.unwrap();
        assert_eq!(
            posts.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            ["p2", "p1", "p3"]
        );

        // Second read is served from cache: the mock allows only one fetch.
        let paged = reader
            .fetch(&authors, 20, Some(Utc::now() - Duration::minutes(30)))
            .await
            .unwrap();
        assert_eq!(paged.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(), ["p3"]);
    }

    #[tokio::test]
    async fn no_authors_short_circuits() {
        let content = MockContentStore::new();
        let reader = FollowingTimelineReader::new(None, Arc::new(content));
        assert!(reader.fetch(&[], 20, None).await.unwrap().is_empty());
    }
}
