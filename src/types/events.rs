//! Agent events: non-message signals emitted during a turn.
//!
//! Events narrate *how* a response was produced; messages are the response
//! content itself. Both are strictly ordered within a turn.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::ChatMessage;

/// A tool call requested by a participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// The result of executing a requested tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionExecutionResult {
    pub call_id: String,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

/// A non-message signal emitted during an agent's turn.
///
/// The orchestrator only observes these; tool execution itself happens behind
/// the agent boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    ToolCallRequested {
        source: String,
        calls: Vec<FunctionCall>,
    },
    ToolCallExecuted {
        source: String,
        results: Vec<FunctionExecutionResult>,
    },
    UserInputRequested {
        source: String,
        request_id: Uuid,
    },
}

impl AgentEvent {
    /// Name of the participant that emitted this event.
    pub fn source(&self) -> &str {
        match self {
            Self::ToolCallRequested { source, .. }
            | Self::ToolCallExecuted { source, .. }
            | Self::UserInputRequested { source, .. } => source,
        }
    }
}

/// One ordered item of a run's trace: either a chat message or an agent
/// event. This is what observers of `run_stream` receive and what
/// termination conditions evaluate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "item", rename_all = "snake_case")]
pub enum TeamItem {
    Message(ChatMessage),
    Event(AgentEvent),
}

impl TeamItem {
    /// The chat message, if this item is one.
    pub fn as_message(&self) -> Option<&ChatMessage> {
        match self {
            Self::Message(msg) => Some(msg),
            Self::Event(_) => None,
        }
    }

    /// Name of the participant that produced this item.
    pub fn source(&self) -> &str {
        match self {
            Self::Message(msg) => &msg.source,
            Self::Event(event) => event.source(),
        }
    }
}

impl From<ChatMessage> for TeamItem {
    fn from(msg: ChatMessage) -> Self {
        Self::Message(msg)
    }
}

impl From<AgentEvent> for TeamItem {
    fn from(event: AgentEvent) -> Self {
        Self::Event(event)
    }
}
