//! Shared test support: deterministic scripted participants.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use ensemble::agent::{Agent, AgentTurnItem};
use ensemble::error::{EnsembleError, Result};
use ensemble::run_control::CancellationToken;
use ensemble::types::{AgentEvent, ChatMessage, MessageContent, MessageKind, Response, TeamItem};

/// An agent that replays a fixed script of message contents, cycling when the
/// script runs out. Optionally emits events before each response.
pub struct ScriptedAgent {
    name: String,
    script: Vec<MessageContent>,
    pre_events: Vec<AgentEvent>,
    kinds: Vec<MessageKind>,
    cursor: usize,
}

#[derive(Serialize, Deserialize)]
struct ScriptedState {
    cursor: usize,
}

impl ScriptedAgent {
    pub fn new(name: impl Into<String>, script: Vec<MessageContent>) -> Self {
        Self {
            name: name.into(),
            script,
            pre_events: Vec::new(),
            kinds: vec![MessageKind::Text, MessageKind::Handoff, MessageKind::Stop],
            cursor: 0,
        }
    }

    /// Convenience: a script of plain text replies.
    pub fn texts(name: impl Into<String>, texts: &[&str]) -> Self {
        Self::new(
            name,
            texts
                .iter()
                .map(|t| MessageContent::Text {
                    text: t.to_string(),
                })
                .collect(),
        )
    }

    pub fn with_pre_events(mut self, events: Vec<AgentEvent>) -> Self {
        self.pre_events = events;
        self
    }

    pub fn with_kinds(mut self, kinds: Vec<MessageKind>) -> Self {
        self.kinds = kinds;
        self
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn produced_message_kinds(&self) -> Vec<MessageKind> {
        self.kinds.clone()
    }

    fn on_messages_stream<'a>(
        &'a mut self,
        _new_messages: &'a [ChatMessage],
        cancel: &'a CancellationToken,
    ) -> BoxStream<'a, Result<AgentTurnItem>> {
        Box::pin(try_stream! {
            if cancel.is_cancelled() {
                Err(EnsembleError::Cancelled)?;
            }
            for event in self.pre_events.clone() {
                yield AgentTurnItem::Item(TeamItem::Event(event));
            }
            let content = self.script[self.cursor % self.script.len()].clone();
            self.cursor += 1;
            let message = ChatMessage {
                source: self.name.clone(),
                content,
                timestamp: None,
            };
            yield AgentTurnItem::Response(Response::new(message));
        })
    }

    async fn reset(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }

    fn save_state(&self) -> Result<serde_json::Value> {
        Ok(serde_json::json!(ScriptedState {
            cursor: self.cursor
        }))
    }

    fn load_state(&mut self, state: &serde_json::Value) -> Result<()> {
        let state: ScriptedState = serde_json::from_value(state.clone())?;
        self.cursor = state.cursor;
        Ok(())
    }
}

/// An agent that cancels the shared token on its turn and then honors it,
/// simulating cancellation arriving while a turn is in flight.
pub struct CancellingAgent {
    name: String,
}

impl CancellingAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Agent for CancellingAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn produced_message_kinds(&self) -> Vec<MessageKind> {
        vec![MessageKind::Text]
    }

    fn on_messages_stream<'a>(
        &'a mut self,
        _new_messages: &'a [ChatMessage],
        cancel: &'a CancellationToken,
    ) -> BoxStream<'a, Result<AgentTurnItem>> {
        Box::pin(try_stream! {
            cancel.cancel();
            if cancel.is_cancelled() {
                Err(EnsembleError::Cancelled)?;
            }
            // Unreachable: the token was just set.
            yield AgentTurnItem::Response(Response::new(ChatMessage::text(&self.name, "")));
        })
    }

    async fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    fn save_state(&self) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }

    fn load_state(&mut self, _state: &serde_json::Value) -> Result<()> {
        Ok(())
    }
}

/// An agent whose turn always errors.
pub struct FailingAgent {
    name: String,
}

impl FailingAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Agent for FailingAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn produced_message_kinds(&self) -> Vec<MessageKind> {
        vec![MessageKind::Text]
    }

    fn on_messages_stream<'a>(
        &'a mut self,
        _new_messages: &'a [ChatMessage],
        _cancel: &'a CancellationToken,
    ) -> BoxStream<'a, Result<AgentTurnItem>> {
        Box::pin(try_stream! {
            Err(EnsembleError::Configuration("scripted turn failure".into()))?;
            // Unreachable; gives the stream its item type.
            yield AgentTurnItem::Response(Response::new(ChatMessage::text(&self.name, "")));
        })
    }

    async fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    fn save_state(&self) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }

    fn load_state(&mut self, _state: &serde_json::Value) -> Result<()> {
        Ok(())
    }
}

/// Sources of all chat messages in a run trace, in order.
pub fn message_sources(items: &[TeamItem]) -> Vec<String> {
    items
        .iter()
        .filter_map(TeamItem::as_message)
        .map(|m| m.source.clone())
        .collect()
}
