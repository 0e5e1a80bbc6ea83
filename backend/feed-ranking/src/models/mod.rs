mod candidate;
mod query;
mod records;
mod request;
mod scored;

pub use candidate::{FeedCandidate, NewsMetadata, PhoenixScores, VfVerdict};
pub use query::{FeedQuery, ModelAction, QueryUpdate, UserAction, UserFeatures};
pub use records::{AuthorProfile, ExposureAction, ImpressionRecord, PostQuery, PostRecord};
pub use request::{FeedRequest, FeedResponse};
pub use scored::ScoredCandidate;
