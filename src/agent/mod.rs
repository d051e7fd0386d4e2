//! The polymorphic contract every conversation participant implements.

mod assistant;
mod user_proxy;

pub use assistant::AssistantAgent;
pub use user_proxy::{InputFn, UserProxyAgent};

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;

use crate::error::{EnsembleError, Result};
use crate::run_control::CancellationToken;
use crate::types::{ChatMessage, MessageKind, Response, TeamItem};

/// One item of an agent's streamed turn: intermediate trace items followed by
/// exactly one terminal [`Response`].
#[derive(Debug, Clone, PartialEq)]
pub enum AgentTurnItem {
    Item(TeamItem),
    Response(Response),
}

/// A conversation participant.
///
/// Implementations own their private internal state (e.g., a buffered
/// context) and expose it only through [`save_state`](Agent::save_state) /
/// [`load_state`](Agent::load_state). An implementation that errors mid-turn
/// must leave its state as either "turn not started" or "turn fully applied";
/// the orchestrator treats any turn error as fatal to the run.
#[async_trait]
pub trait Agent: Send {
    /// Unique participant name within a team.
    fn name(&self) -> &str;

    /// Short role description, shown to selector policies.
    fn description(&self) -> &str {
        ""
    }

    /// Which message kinds this agent can emit. Used for validation only.
    fn produced_message_kinds(&self) -> Vec<MessageKind>;

    /// Streaming turn: a lazy, finite, non-restartable sequence ending with
    /// exactly one [`Response`]. Cancellation is checked before each yielded
    /// item; if the token is set the sequence ends with
    /// [`EnsembleError::Cancelled`] instead of a response.
    ///
    /// `new_messages` is the delta of history the agent has not yet seen.
    fn on_messages_stream<'a>(
        &'a mut self,
        new_messages: &'a [ChatMessage],
        cancel: &'a CancellationToken,
    ) -> BoxStream<'a, Result<AgentTurnItem>>;

    /// Blocking turn: drain [`on_messages_stream`](Agent::on_messages_stream)
    /// and keep only the terminal response.
    async fn on_messages(
        &mut self,
        new_messages: &[ChatMessage],
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let name = self.name().to_string();
        let mut stream = self.on_messages_stream(new_messages, cancel);
        let mut response = None;
        while let Some(item) = stream.next().await {
            if let AgentTurnItem::Response(r) = item? {
                response = Some(r);
            }
        }
        drop(stream);
        response.ok_or_else(|| {
            EnsembleError::agent_failure(name, "turn stream ended without a terminal response")
        })
    }

    /// Clear internal state back to the construction-time baseline.
    /// Idempotent.
    async fn reset(&mut self) -> Result<()>;

    /// Opaque serializable snapshot of internal state.
    fn save_state(&self) -> Result<serde_json::Value>;

    /// Restore a snapshot produced by [`save_state`](Agent::save_state).
    /// Round-trip leaves behavior observably unchanged.
    fn load_state(&mut self, state: &serde_json::Value) -> Result<()>;
}
