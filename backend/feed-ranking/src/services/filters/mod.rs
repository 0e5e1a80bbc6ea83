// Exclusion rules, applied in registration order. Earlier filters shrink
// the pool later filters iterate, so the cheap structural dedups run first
// and the per-user rules after.

mod author;
mod content;
mod conversation;
mod dedup;
mod news_dedup;
mod seen;
mod visibility;

pub use author::{BlockedAuthorFilter, SelfPostFilter};
pub use content::{AgeFilter, MutedKeywordFilter};
pub use conversation::ConversationDedupFilter;
pub use dedup::{DedupFilter, RepostDedupFilter};
pub use news_dedup::NewsExternalIdDedupFilter;
pub use seen::{PreviouslyServedFilter, SeenPostsFilter};
pub use visibility::VisibilityFilter;
