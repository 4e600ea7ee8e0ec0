use thiserror::Error;

use crate::scorer::ScoringContext;

/// Errors that can occur while associating detections to tracks.
///
/// An empty frame is not an error: it resets tracking state instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("affinity scorer unavailable ({context}): {reason}")]
    ScorerUnavailable {
        context: ScoringContext,
        reason: String,
    },

    #[error("affinity scorer timed out ({context}): took {elapsed_ms} ms, limit {limit_ms} ms")]
    ScorerTimeout {
        context: ScoringContext,
        elapsed_ms: u64,
        limit_ms: u64,
    },

    #[error("affinity scorer circuit open ({context}), call not attempted")]
    CircuitOpen { context: ScoringContext },

    #[error("invalid affinity scorer output ({context}): {reason}")]
    InvalidScorerOutput {
        context: ScoringContext,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid checkpoint: {0}")]
    InvalidCheckpoint(String),

    #[error("invalid job: {0}")]
    InvalidJob(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for failures of the affinity scorer, which abort a frame's association.
    pub fn is_scorer_failure(&self) -> bool {
        matches!(
            self,
            Error::ScorerUnavailable { .. }
                | Error::ScorerTimeout { .. }
                | Error::CircuitOpen { .. }
                | Error::InvalidScorerOutput { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
