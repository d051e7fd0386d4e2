//! Human-in-the-loop participant.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::error::{EnsembleError, Result};
use crate::run_control::CancellationToken;
use crate::types::{AgentEvent, ChatMessage, MessageKind, Response, TeamItem};

use super::{Agent, AgentTurnItem};

/// Async callback that obtains input from the external user.
pub type InputFn =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Result<String>> + Send>> + Send + Sync>;

/// An agent that proxies the external user: each turn emits a
/// [`AgentEvent::UserInputRequested`] event, awaits the injected input
/// callback, and responds with the user's text.
pub struct UserProxyAgent {
    name: String,
    description: String,
    input_fn: InputFn,
}

impl UserProxyAgent {
    pub fn new(name: impl Into<String>, input_fn: InputFn) -> Self {
        Self {
            name: name.into(),
            description: "A human user".into(),
            input_fn,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[async_trait]
impl Agent for UserProxyAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
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
            if cancel.is_cancelled() {
                Err(EnsembleError::Cancelled)?;
            }
            yield AgentTurnItem::Item(TeamItem::Event(AgentEvent::UserInputRequested {
                source: self.name.clone(),
                request_id: Uuid::new_v4(),
            }));

            let text = (self.input_fn)().await?;
            if cancel.is_cancelled() {
                Err(EnsembleError::Cancelled)?;
            }
            yield AgentTurnItem::Response(Response::new(ChatMessage::text(&self.name, text)));
        })
    }

    async fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    fn save_state(&self) -> Result<serde_json::Value> {
        // Proxies hold no conversational state of their own.
        Ok(serde_json::Value::Null)
    }

    fn load_state(&mut self, _state: &serde_json::Value) -> Result<()> {
        Ok(())
    }
}
