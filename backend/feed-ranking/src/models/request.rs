use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{FeedCandidate, FeedQuery};
use crate::error::FeedError;

/// Hard cap on client-echoed id lists; anything longer is truncated, not
/// rejected.
pub const MAX_CLIENT_ID_LIST: usize = 200;

const MAX_PAGE_SIZE: usize = 100;

/// Inbound feed request as the transport layer hands it over.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedRequest {
    pub user_id: String,
    pub limit: Option<usize>,
    pub cursor: Option<DateTime<Utc>>,
    #[serde(default)]
    pub in_network_only: bool,
    #[serde(default)]
    pub seen_ids: Vec<String>,
    #[serde(default)]
    pub served_ids: Vec<String>,
    #[serde(default)]
    pub is_bottom_request: bool,
    pub request_id: Option<String>,
}

impl FeedRequest {
    /// Rejects malformed requests before any pipeline work starts.
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.user_id.trim().is_empty() {
            return Err(FeedError::AuthRequired);
        }
        if let Some(limit) = self.limit {
            if limit == 0 || limit > MAX_PAGE_SIZE {
                return Err(FeedError::Validation(format!(
                    "limit must be between 1 and {MAX_PAGE_SIZE}, got {limit}"
                )));
            }
        }
        Ok(())
    }

    /// Builds the pipeline query. Call `validate` first; this only shapes
    /// the data (default limit, id-list truncation, request id).
    pub fn into_query(self, default_limit: usize) -> FeedQuery {
        let mut seen_ids = self.seen_ids;
        seen_ids.truncate(MAX_CLIENT_ID_LIST);
        let mut served_ids = self.served_ids;
        served_ids.truncate(MAX_CLIENT_ID_LIST);

        let mut query = FeedQuery::new(self.user_id, self.limit.unwrap_or(default_limit));
        if let Some(request_id) = self.request_id {
            query.request_id = request_id;
        } else {
            query.request_id = Uuid::new_v4().to_string();
        }
        query.cursor = self.cursor;
        query.in_network_only = self.in_network_only;
        query.seen_ids = seen_ids;
        query.served_ids = served_ids;
        query.is_bottom_request = self.is_bottom_request;
        query
    }
}

/// Outbound feed page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedResponse {
    pub posts: Vec<FeedCandidate>,
    pub has_more: bool,
    pub next_cursor: Option<DateTime<Utc>>,
    /// Ids freshly marked served by this response, including related post
    /// ids, for the client to echo back on the next page.
    pub served_ids_delta: Vec<String>,
    pub request_id: String,
}
