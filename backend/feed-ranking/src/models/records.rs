use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::candidate::NewsMetadata;

/// Raw content record as returned by the content store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    pub author_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub is_reply: bool,
    pub reply_to_post_id: Option<String>,
    pub is_repost: bool,
    pub original_post_id: Option<String>,
    pub conversation_id: Option<String>,
    pub has_image: bool,
    pub has_video: bool,
    pub video_duration_sec: Option<f64>,
    pub like_count: u64,
    pub comment_count: u64,
    pub repost_count: u64,
    pub view_count: u64,
    pub keywords: Vec<String>,
    pub is_nsfw: bool,
    pub is_news: bool,
    pub news_metadata: Option<NewsMetadata>,
}

impl PostRecord {
    pub fn engagement_score(&self) -> u64 {
        self.like_count + 2 * self.comment_count + 3 * self.repost_count
    }
}

impl Default for PostRecord {
    fn default() -> Self {
        Self {
            id: String::new(),
            author_id: String::new(),
            text: String::new(),
            created_at: Utc::now(),
            is_reply: false,
            reply_to_post_id: None,
            is_repost: false,
            original_post_id: None,
            conversation_id: None,
            has_image: false,
            has_video: false,
            video_duration_sec: None,
            like_count: 0,
            comment_count: 0,
            repost_count: 0,
            view_count: 0,
            keywords: Vec::new(),
            is_nsfw: false,
            is_news: false,
            news_metadata: None,
        }
    }
}

/// Filter for content-store candidate queries. Unset fields do not
/// constrain the result.
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    pub author_ids: Option<Vec<String>>,
    pub exclude_author_ids: Vec<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub is_news: Option<bool>,
    pub min_engagement: Option<u64>,
    pub limit: usize,
}

/// Author identity as returned by the user store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorProfile {
    pub user_id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

/// Exposure kind written to the interaction log. `Impression` means the
/// post was rendered; `Delivery` means the ranker returned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureAction {
    Impression,
    Delivery,
}

/// One training-grade exposure record. Carries the ranking context the
/// model needs to join exposures with later engagement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpressionRecord {
    pub user_id: String,
    pub action: ExposureAction,
    pub post_id: String,
    /// Model-vocabulary id (news external id where one exists).
    pub model_post_id: String,
    pub author_id: String,
    /// 1-based position in the returned page.
    pub rank: usize,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weighted_score: Option<f64>,
    pub in_network: bool,
    pub is_news: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recall_source: Option<String>,
    pub experiment_keys: Vec<String>,
    pub product_surface: String,
    pub shown_at: DateTime<Utc>,
}
