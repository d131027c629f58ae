//! Error types for the simulator

use thiserror::Error;

/// Result type for simulator operations
pub type QamtResult<T> = Result<T, QamtError>;

/// Error types surfaced by the packing, scheduling and simulation layers
#[derive(Error, Debug)]
pub enum QamtError {
    /// A task cannot be placed even on an empty resource grid
    #[error("no feasible placement for task(s) [{0}] on an empty grid")]
    InfeasiblePlacement(String),

    /// An instruction was built from an empty schedule
    #[error("cannot build an instruction from an empty schedule")]
    EmptySchedule,

    /// Tasks fused into one instruction disagree on anneal time
    #[error("schedule mixes anneal times: expected {expected}, found {found}")]
    MismatchedAnnealTime { expected: u64, found: u64 },

    /// Task input rejected at load time
    #[error("invalid task input: {0}")]
    InvalidTask(String),

    /// Weighted-random-fit was given unusable weights
    #[error("invalid weights: {0}")]
    InvalidWeights(String),

    /// Task input could not be parsed
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for QamtError {
    fn from(err: serde_json::Error) -> Self {
        QamtError::Parse(err.to_string())
    }
}
