use thiserror::Error;

/// Errors surfaced to the caller of [`get_feed`](crate::services::FeedMixer::get_feed).
///
/// Both variants reject the request before the pipeline runs. Stage failures
/// inside the pipeline never reach the caller; they degrade to the stage's
/// fallback behavior and are recorded as [`StageError`] component metrics.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("user identity required")]
    AuthRequired,
}

/// Internal classification of a failed stage call.
///
/// Produced by the orchestrator's component wrapper and consumed by logging
/// and metrics only. Collaborator unavailability (timeout, connection error,
/// bad payload) all land here.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("{stage} {name} timed out after {timeout_ms}ms")]
    Timeout {
        stage: &'static str,
        name: String,
        timeout_ms: u64,
    },

    #[error("{stage} {name} unavailable: {cause}")]
    Unavailable {
        stage: &'static str,
        name: String,
        cause: anyhow::Error,
    },
}

impl StageError {
    /// Short label for metrics ("timeout" / "error").
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::Timeout { .. } => "timeout",
            StageError::Unavailable { .. } => "error",
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            StageError::Timeout { stage, .. } => stage,
            StageError::Unavailable { stage, .. } => stage,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            StageError::Timeout { name, .. } => name,
            StageError::Unavailable { name, .. } => name,
        }
    }
}
