//! Termination condition engine.
//!
//! A termination condition is a stateful predicate over the items produced
//! since its previous evaluation. The orchestrator feeds it incremental
//! deltas, never the full history, so conditions keep cumulative counters
//! internally.

mod combinators;
mod conditions;

pub use combinators::{all_of, any_of, AndTermination, OrTermination};
pub use conditions::{
    ExternalTermination, FunctionCallTermination, HandoffTermination, MaxMessageTermination,
    SourceMatchTermination, StopMessageTermination, TextMentionTermination,
    TextMessageTermination,
};

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{StopMessage, TeamItem};

/// Stateful stop predicate, composable via [`any_of`] and [`all_of`].
#[async_trait]
pub trait TerminationCondition: Send {
    /// Whether this condition has already fired.
    fn terminated(&self) -> bool;

    /// Evaluate the condition against the items produced since the previous
    /// evaluation.
    ///
    /// # Errors
    ///
    /// Fails with [`EnsembleError::AlreadyTerminated`](crate::error::EnsembleError::AlreadyTerminated)
    /// if called again after returning a stop message, until explicitly reset.
    async fn evaluate(&mut self, new_items: &[TeamItem]) -> Result<Option<StopMessage>>;

    /// Return to the not-terminated state and clear internal counters.
    async fn reset(&mut self) -> Result<()>;

    /// Serializable internal state, embedded in the team snapshot envelope.
    fn save_state(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Restore internal state produced by [`save_state`](Self::save_state).
    fn load_state(&mut self, _state: &serde_json::Value) -> Result<()> {
        Ok(())
    }
}
