// Query and candidate hydrators. Query hydrators enrich the request before
// sourcing; candidate hydrators batch-fetch per-candidate context. Each one
// owns a disjoint set of fields and merges only those in `update`.

mod author_info;
mod experiment_context;
mod interaction;
mod news_context;
mod user_actions;
mod user_features;
mod vf_candidate;
mod video_info;

pub use author_info::AuthorInfoHydrator;
pub use experiment_context::ExperimentContextQueryHydrator;
pub use interaction::UserInteractionHydrator;
pub use news_context::NewsModelContextQueryHydrator;
pub use user_actions::UserActionSeqQueryHydrator;
pub use user_features::UserFeaturesQueryHydrator;
pub use vf_candidate::VfCandidateHydrator;
pub use video_info::VideoInfoHydrator;
