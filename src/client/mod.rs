//! Model-provider boundary.
//!
//! The orchestration core never speaks provider wire formats. Model-backed
//! agents call an opaque [`ChatClient`]; concrete providers (OpenAI, Azure,
//! Anthropic, Ollama, ...) are pluggable implementations supplied by the
//! caller.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::ChatMessage;

/// A completion returned by a model client.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// The generated text.
    pub text: String,
    /// Optional handoff target the model chose, if the provider adapter maps
    /// tool-style handoffs onto completions.
    pub handoff: Option<String>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            handoff: None,
        }
    }

    pub fn handoff(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            handoff: Some(target.into()),
        }
    }
}

/// Opaque capability to generate a completion from message history.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion>;
}
