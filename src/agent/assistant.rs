//! Model-backed assistant participant.

use std::sync::Arc;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::client::ChatClient;
use crate::error::{EnsembleError, Result};
use crate::run_control::CancellationToken;
use crate::types::{ChatMessage, MessageKind, Response};

use super::{Agent, AgentTurnItem};

/// Source name used for the synthesized system-prompt message.
const SYSTEM_SOURCE: &str = "system";

/// An agent that produces responses through a [`ChatClient`].
///
/// Maintains a private context buffer of every message it has seen plus its
/// own replies; the orchestrator delivers only the delta since its last turn.
pub struct AssistantAgent {
    name: String,
    description: String,
    system_prompt: Option<String>,
    client: Arc<dyn ChatClient>,
    handoffs: Vec<String>,
    context: Vec<ChatMessage>,
}

impl AssistantAgent {
    pub fn new(name: impl Into<String>, client: Arc<dyn ChatClient>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            system_prompt: None,
            client,
            handoffs: Vec::new(),
            context: Vec::new(),
        }
    }

    /// Set the role description shown to selector policies.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the system prompt prepended to every model request.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Declare the participants this agent may hand the conversation to.
    pub fn with_handoffs(mut self, targets: Vec<String>) -> Self {
        self.handoffs = targets;
        self
    }

    /// The buffered conversational context.
    pub fn context(&self) -> &[ChatMessage] {
        &self.context
    }
}

#[async_trait]
impl Agent for AssistantAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn produced_message_kinds(&self) -> Vec<MessageKind> {
        if self.handoffs.is_empty() {
            vec![MessageKind::Text]
        } else {
            vec![MessageKind::Text, MessageKind::Handoff]
        }
    }

    fn on_messages_stream<'a>(
        &'a mut self,
        new_messages: &'a [ChatMessage],
        cancel: &'a CancellationToken,
    ) -> BoxStream<'a, Result<AgentTurnItem>> {
        Box::pin(try_stream! {
            if cancel.is_cancelled() {
                Err(EnsembleError::Cancelled)?;
            }

            // Build the request without touching the context buffer; the
            // buffer is only advanced once the turn fully succeeds.
            let mut request = Vec::with_capacity(self.context.len() + new_messages.len() + 1);
            if let Some(prompt) = &self.system_prompt {
                request.push(ChatMessage::text(SYSTEM_SOURCE, prompt.clone()));
            }
            request.extend(self.context.iter().cloned());
            request.extend_from_slice(new_messages);

            let completion = self.client.complete(&request).await?;
            if cancel.is_cancelled() {
                Err(EnsembleError::Cancelled)?;
            }

            let message = match completion.handoff {
                Some(target) if self.handoffs.contains(&target) => {
                    ChatMessage::handoff(&self.name, target, completion.text)
                }
                Some(target) => {
                    tracing::warn!(
                        agent = %self.name,
                        %target,
                        "completion named an unconfigured handoff target; emitting text"
                    );
                    ChatMessage::text(&self.name, completion.text)
                }
                None => ChatMessage::text(&self.name, completion.text),
            };

            self.context.extend_from_slice(new_messages);
            self.context.push(message.clone());
            yield AgentTurnItem::Response(Response::new(message));
        })
    }

    async fn reset(&mut self) -> Result<()> {
        self.context.clear();
        Ok(())
    }

    fn save_state(&self) -> Result<serde_json::Value> {
        Ok(serde_json::json!({ "context": self.context }))
    }

    fn load_state(&mut self, state: &serde_json::Value) -> Result<()> {
        let context = state
            .get("context")
            .ok_or_else(|| EnsembleError::InvalidSnapshot("missing 'context' field".into()))?;
        self.context = serde_json::from_value(context.clone())?;
        Ok(())
    }
}
