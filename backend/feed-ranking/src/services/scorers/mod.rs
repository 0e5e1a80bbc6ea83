//! Scoring stages, listed in execution order.
//!
//! The orchestrator runs scorers sequentially and folds each pass back onto
//! the candidates, so ordering is part of the contract: prediction first,
//! heuristic fill-in, weighted combination and its multiplicative tweaks on
//! `weighted_score`, then diversity (the first writer of `score`) and the
//! out-of-network discount last.

mod affinity;
mod diversity;
mod engagement;
mod oon;
mod phoenix;
mod quality;
mod recency;
mod weighted;

pub use affinity::{author_affinities, AuthorAffinityScorer};
pub use diversity::AuthorDiversityScorer;
pub use engagement::EngagementScorer;
pub use oon::OonScorer;
pub use phoenix::PhoenixScorer;
pub use quality::ContentQualityScorer;
pub use recency::RecencyScorer;
pub use weighted::WeightedScorer;
