//! Error types for ensemble.

use thiserror::Error;

/// Primary error type for all ensemble operations.
#[derive(Error, Debug)]
pub enum EnsembleError {
    /// The run's cancellation token was set; the operation stopped at the
    /// next suspension point without producing a result.
    #[error("Operation cancelled")]
    Cancelled,

    /// A termination condition was evaluated again after it had already
    /// fired, without an intervening `reset()`.
    #[error("Termination condition has already been reached")]
    AlreadyTerminated,

    /// A run, snapshot, or reset was requested while another run on the same
    /// team was still active.
    #[error("A run is already in progress")]
    RunInProgress,

    /// A resume was attempted with no task and an empty message history.
    #[error("No task provided and no previous history to resume from")]
    NoTaskAndNoHistory,

    /// An agent raised an error during its turn. Agent failures are fatal to
    /// the run and are never retried at this layer.
    #[error("Agent '{agent}' failed: {source}")]
    AgentFailure {
        agent: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A snapshot could not be applied: structural mismatch between the
    /// snapshot and the current team (load is all-or-nothing).
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// A name did not match any participant in the team roster.
    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EnsembleError {
    /// Wrap an arbitrary error as a failure of the named agent.
    pub fn agent_failure(
        agent: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::AgentFailure {
            agent: agent.into(),
            source: source.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, EnsembleError>;
