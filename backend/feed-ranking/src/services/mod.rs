//! Pipeline stage implementations and the mixer that assembles them.

pub mod filters;
pub mod hydrators;
mod mixer;
pub mod scorers;
pub mod selection;
pub mod side_effects;
pub mod sources;

pub use mixer::{FeedClients, FeedMixer, FeedStores};
