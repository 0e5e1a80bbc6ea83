pub mod clients;
pub mod config;
pub mod error;
pub mod experiment;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod stores;
pub mod utils;

pub use config::Config;
pub use error::FeedError;
pub use models::{FeedCandidate, FeedQuery, FeedRequest, FeedResponse};
pub use pipeline::{FeedPipeline, PipelineResult};
pub use services::FeedMixer;
