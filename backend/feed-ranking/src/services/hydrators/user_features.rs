use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::models::{FeedQuery, QueryUpdate, UserFeatures};
use crate::pipeline::QueryHydrator;
use crate::stores::{InteractionStore, UserStore};

/// Loads the viewer's social context: follow graph, block list, muted
/// keywords, server-tracked seen posts, and account summary. Every part
/// degrades to empty on its own, so one slow lookup never costs the rest.
pub struct UserFeaturesQueryHydrator {
    users: Arc<dyn UserStore>,
    interactions: Arc<dyn InteractionStore>,
}

impl UserFeaturesQueryHydrator {
    pub fn new(users: Arc<dyn UserStore>, interactions: Arc<dyn InteractionStore>) -> Self {
        Self {
            users,
            interactions,
        }
    }
}

#[async_trait]
impl QueryHydrator for UserFeaturesQueryHydrator {
    fn name(&self) -> &'static str {
        "UserFeaturesQueryHydrator"
    }

    async fn hydrate(&self, query: &FeedQuery) -> anyhow::Result<QueryUpdate> {
        let user_id = query.user_id.as_str();
        // The client's own seen_ids win; skip the server-side lookup then.
        let load_seen = query.seen_ids.is_empty();

        let (followed, blocked, muted, seen, summary) = tokio::join!(
            self.users.followed_user_ids(user_id),
            self.users.blocked_user_ids(user_id),
            self.users.muted_keywords(user_id),
            async {
                if load_seen {
                    self.interactions.seen_post_ids(user_id).await
                } else {
                    Ok(Default::default())
                }
            },
            self.users.account_summary(user_id),
        );

        let mut features = UserFeatures::default();
        match followed {
            Ok(ids) => features.followed_user_ids = ids,
            Err(err) => warn!(user_id, error = %err, "failed to load followed users"),
        }
        match blocked {
            Ok(ids) => features.blocked_user_ids = ids,
            Err(err) => warn!(user_id, error = %err, "failed to load blocked users"),
        }
        match muted {
            Ok(keywords) => features.muted_keywords = keywords,
            Err(err) => warn!(user_id, error = %err, "failed to load muted keywords"),
        }
        match seen {
            Ok(ids) => features.seen_post_ids = ids,
            Err(err) => warn!(user_id, error = %err, "failed to load seen posts"),
        }
        match summary {
            Ok(summary) => {
                features.follower_count = summary.follower_count;
                features.account_age_days = summary.account_age_days;
            }
            Err(err) => warn!(user_id, error = %err, "failed to load account summary"),
        }

        Ok(QueryUpdate {
            user_features: Some(features),
            ..QueryUpdate::default()
        })
    }
}
