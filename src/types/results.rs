//! Turn and run result types.

use serde::{Deserialize, Serialize};

use super::events::TeamItem;
use super::message::ChatMessage;

/// The terminal output of one agent turn: exactly one chat message (the
/// externally visible result) plus the ordered inner trace produced while
/// computing it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    pub chat_message: ChatMessage,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inner: Vec<TeamItem>,
}

impl Response {
    pub fn new(chat_message: ChatMessage) -> Self {
        Self {
            chat_message,
            inner: Vec::new(),
        }
    }

    pub fn with_inner(mut self, inner: Vec<TeamItem>) -> Self {
        self.inner = inner;
        self
    }
}

/// The terminal output of a full run: the complete ordered trace plus the
/// reason the run ended. Produced once per run, immutable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskResult {
    pub messages: Vec<TeamItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

impl TaskResult {
    /// Chat messages of the trace, skipping events.
    pub fn chat_messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter_map(TeamItem::as_message)
    }
}

/// What a termination condition returns when it fires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StopMessage {
    pub content: String,
    pub source: String,
}

impl StopMessage {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
        }
    }
}
