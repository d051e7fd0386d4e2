//! Chat message types exchanged between participants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message contributed by a participant (or the external caller) to the
/// shared conversation. Immutable once created; ordering within a run is a
/// strict sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// Name of the participant that produced this message.
    pub source: String,
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    /// Create a plain text message.
    pub fn text(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: MessageContent::Text { text: text.into() },
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a multimodal message from content parts.
    pub fn multimodal(source: impl Into<String>, parts: Vec<ContentPart>) -> Self {
        Self {
            source: source.into(),
            content: MessageContent::Multimodal { parts },
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a handoff message redirecting the next turn to `target`.
    pub fn handoff(
        source: impl Into<String>,
        target: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            content: MessageContent::Handoff {
                target: target.into(),
                text: text.into(),
            },
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a tool-call summary message.
    pub fn tool_call_summary(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: MessageContent::ToolCallSummary { text: text.into() },
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a stop message.
    pub fn stop(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: MessageContent::Stop { text: text.into() },
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a structured-output message.
    pub fn structured(source: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            source: source.into(),
            content: MessageContent::Structured { value },
            timestamp: Some(Utc::now()),
        }
    }

    /// The kind discriminator of this message's content.
    pub fn kind(&self) -> MessageKind {
        self.content.kind()
    }

    /// Extract the text content, concatenating all text parts.
    pub fn text_content(&self) -> String {
        match &self.content {
            MessageContent::Text { text }
            | MessageContent::Handoff { text, .. }
            | MessageContent::ToolCallSummary { text }
            | MessageContent::Stop { text } => text.clone(),
            MessageContent::Multimodal { parts } => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Image(_) => None,
                })
                .collect::<Vec<_>>()
                .join(""),
            MessageContent::Structured { value } => value.to_string(),
        }
    }
}

/// Message payload, discriminated by `kind`. Every consumption site matches
/// exhaustively so that adding a kind is a compile-time event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: String },
    Multimodal { parts: Vec<ContentPart> },
    Handoff { target: String, text: String },
    ToolCallSummary { text: String },
    Stop { text: String },
    Structured { value: serde_json::Value },
}

impl MessageContent {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text { .. } => MessageKind::Text,
            Self::Multimodal { .. } => MessageKind::Multimodal,
            Self::Handoff { .. } => MessageKind::Handoff,
            Self::ToolCallSummary { .. } => MessageKind::ToolCallSummary,
            Self::Stop { .. } => MessageKind::Stop,
            Self::Structured { .. } => MessageKind::Structured,
        }
    }
}

/// Fieldless mirror of [`MessageContent`], used by agents to declare which
/// message kinds they can produce.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Multimodal,
    Handoff,
    ToolCallSummary,
    Stop,
    Structured,
}

/// A single part of multimodal message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image(ImageContent),
}

/// Image content embedded in a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageContent {
    pub data: String,
    pub mime_type: String,
}
