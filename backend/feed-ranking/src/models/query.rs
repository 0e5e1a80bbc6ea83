use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::experiment::ExperimentContext;

/// Per-user features loaded by the user-features query hydrator.
///
/// Always present on the query with empty defaults, so stages index into the
/// sets without branching on presence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserFeatures {
    pub followed_user_ids: HashSet<String>,
    pub blocked_user_ids: HashSet<String>,
    pub muted_keywords: Vec<String>,
    /// Server-tracked seen ids; the fallback when the client did not send
    /// its own `seen_ids`.
    pub seen_post_ids: HashSet<String>,
    pub follower_count: u64,
    pub account_age_days: i64,
}

/// One event from the user's recent interaction history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAction {
    /// Open vocabulary: "like", "reply", "repost", "quote", "click",
    /// "profile_click", "share", ... as recorded by the interaction store.
    pub action_type: String,
    pub target_post_id: Option<String>,
    pub target_author_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub dwell_time_ms: Option<i64>,
}

/// Action event in the shape the prediction service expects: keyed by the
/// external corpus id with a model-vocabulary label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelAction {
    pub external_id: String,
    pub action_label: String,
    pub timestamp: DateTime<Utc>,
}

/// Request context flowing through the pipeline.
///
/// Identity and paging fields are fixed at construction; the enrichment
/// slots are filled by query hydrators before sourcing starts.
#[derive(Debug, Clone)]
pub struct FeedQuery {
    pub request_id: String,
    pub user_id: String,
    pub limit: usize,
    pub cursor: Option<DateTime<Utc>>,
    pub in_network_only: bool,

    /// Client-echoed ids of posts already rendered; preferred over the
    /// server-tracked seen set.
    pub seen_ids: Vec<String>,
    /// Client-echoed ids of posts served on previous pages; only consulted
    /// on bottom (paging) requests.
    pub served_ids: Vec<String>,
    pub is_bottom_request: bool,

    pub user_features: UserFeatures,
    pub user_action_sequence: Vec<UserAction>,
    /// Recent news-corpus ids from the user's history, newest first.
    pub news_history_external_ids: Vec<String>,
    /// Action history in the prediction service's shape.
    pub model_action_sequence: Vec<ModelAction>,
    pub experiment_context: Option<ExperimentContext>,
}

impl FeedQuery {
    pub fn new(user_id: impl Into<String>, limit: usize) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            limit,
            cursor: None,
            in_network_only: false,
            seen_ids: Vec::new(),
            served_ids: Vec::new(),
            is_bottom_request: false,
            user_features: UserFeatures::default(),
            user_action_sequence: Vec::new(),
            news_history_external_ids: Vec::new(),
            model_action_sequence: Vec::new(),
            experiment_context: None,
        }
    }

    /// Typed experiment lookup; no context or no assignment means `default`.
    pub fn experiment_config<T: DeserializeOwned>(
        &self,
        experiment_id: &str,
        key: &str,
        default: T,
    ) -> T {
        match &self.experiment_context {
            Some(ctx) => ctx.get_config(experiment_id, key, default),
            None => default,
        }
    }

    /// Boolean experiment gate, the dominant call shape.
    pub fn experiment_flag(&self, experiment_id: &str, key: &str, default: bool) -> bool {
        self.experiment_config(experiment_id, key, default)
    }
}

/// Partial query update returned by a query hydrator. Fields are disjoint
/// across hydrators in practice; merge is last-writer-wins per field.
#[derive(Debug, Clone, Default)]
pub struct QueryUpdate {
    pub user_features: Option<UserFeatures>,
    pub user_action_sequence: Option<Vec<UserAction>>,
    pub news_history_external_ids: Option<Vec<String>>,
    pub model_action_sequence: Option<Vec<ModelAction>>,
    pub experiment_context: Option<ExperimentContext>,
}

impl QueryUpdate {
    pub fn apply_to(self, query: &mut FeedQuery) {
        if let Some(features) = self.user_features {
            query.user_features = features;
        }
        if let Some(actions) = self.user_action_sequence {
            query.user_action_sequence = actions;
        }
        if let Some(ids) = self.news_history_external_ids {
            query.news_history_external_ids = ids;
        }
        if let Some(actions) = self.model_action_sequence {
            query.model_action_sequence = actions;
        }
        if let Some(ctx) = self.experiment_context {
            query.experiment_context = Some(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_only_overwrites_present_fields() {
        let mut query = FeedQuery::new("u1", 20);
        query.user_action_sequence = vec![UserAction {
            action_type: "like".to_string(),
            target_post_id: Some("p1".to_string()),
            target_author_id: None,
            created_at: Utc::now(),
            dwell_time_ms: None,
        }];

        let mut features = UserFeatures::default();
        features.followed_user_ids.insert("a1".to_string());
        QueryUpdate {
            user_features: Some(features),
            ..QueryUpdate::default()
        }
        .apply_to(&mut query);

        assert!(query.user_features.followed_user_ids.contains("a1"));
        assert_eq!(query.user_action_sequence.len(), 1);
    }

    #[test]
    fn experiment_lookup_defaults_without_context() {
        let query = FeedQuery::new("u1", 20);
        assert!(!query.experiment_flag("exp", "enabled", false));
        assert_eq!(query.experiment_config("exp", "cap", 3_u64), 3);
    }
}
