// Retrieval channels. Each source covers one candidate population; the
// orchestrator merges them in registration order and caps the pool.

mod cold_start;
mod following;
mod graph;
mod news_ann;
mod popular;
mod timeline;
mod two_tower;

pub use cold_start::ColdStartSource;
pub use following::FollowingSource;
pub use graph::GraphSource;
pub use news_ann::NewsAnnSource;
pub use popular::PopularSource;
pub use timeline::FollowingTimelineReader;
pub use two_tower::TwoTowerSource;
