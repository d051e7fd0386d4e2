//! Built-in termination conditions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{EnsembleError, Result};
use crate::run_control::ExternalTerminationHandle;
use crate::types::{AgentEvent, MessageContent, StopMessage, TeamItem};

use super::TerminationCondition;

/// Fires once the cumulative count of items seen reaches a threshold.
///
/// By default only chat messages are counted; set `include_agent_events` to
/// count events as well.
pub struct MaxMessageTermination {
    max_messages: usize,
    include_agent_events: bool,
    count: usize,
    terminated: bool,
}

#[derive(Serialize, Deserialize)]
struct CounterState {
    count: usize,
    terminated: bool,
}

impl MaxMessageTermination {
    pub fn new(max_messages: usize) -> Self {
        Self {
            max_messages,
            include_agent_events: false,
            count: 0,
            terminated: false,
        }
    }

    pub fn include_agent_events(mut self, include: bool) -> Self {
        self.include_agent_events = include;
        self
    }
}

#[async_trait]
impl TerminationCondition for MaxMessageTermination {
    fn terminated(&self) -> bool {
        self.terminated
    }

    async fn evaluate(&mut self, new_items: &[TeamItem]) -> Result<Option<StopMessage>> {
        if self.terminated {
            return Err(EnsembleError::AlreadyTerminated);
        }
        self.count += new_items
            .iter()
            .filter(|item| self.include_agent_events || item.as_message().is_some())
            .count();
        if self.count >= self.max_messages {
            self.terminated = true;
            return Ok(Some(StopMessage::new(
                format!(
                    "Maximum number of messages {} reached, current message count: {}",
                    self.max_messages, self.count
                ),
                "MaxMessageTermination",
            )));
        }
        Ok(None)
    }

    async fn reset(&mut self) -> Result<()> {
        self.count = 0;
        self.terminated = false;
        Ok(())
    }

    fn save_state(&self) -> serde_json::Value {
        serde_json::json!(CounterState {
            count: self.count,
            terminated: self.terminated,
        })
    }

    fn load_state(&mut self, state: &serde_json::Value) -> Result<()> {
        let state: CounterState = serde_json::from_value(state.clone())?;
        self.count = state.count;
        self.terminated = state.terminated;
        Ok(())
    }
}

/// Fires when any seen message's text contains a configured substring.
pub struct TextMentionTermination {
    text: String,
    terminated: bool,
}

impl TextMentionTermination {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            terminated: false,
        }
    }
}

#[async_trait]
impl TerminationCondition for TextMentionTermination {
    fn terminated(&self) -> bool {
        self.terminated
    }

    async fn evaluate(&mut self, new_items: &[TeamItem]) -> Result<Option<StopMessage>> {
        if self.terminated {
            return Err(EnsembleError::AlreadyTerminated);
        }
        for item in new_items {
            let Some(msg) = item.as_message() else {
                continue;
            };
            if msg.text_content().contains(&self.text) {
                self.terminated = true;
                return Ok(Some(StopMessage::new(
                    format!("Text '{}' mentioned", self.text),
                    "TextMentionTermination",
                )));
            }
        }
        Ok(None)
    }

    async fn reset(&mut self) -> Result<()> {
        self.terminated = false;
        Ok(())
    }

    fn save_state(&self) -> serde_json::Value {
        serde_json::json!({ "terminated": self.terminated })
    }

    fn load_state(&mut self, state: &serde_json::Value) -> Result<()> {
        self.terminated = state
            .get("terminated")
            .and_then(serde_json::Value::as_bool)
            .ok_or_else(|| EnsembleError::InvalidSnapshot("missing 'terminated' flag".into()))?;
        Ok(())
    }
}

/// Fires when a plain text message is produced, optionally only from a named
/// source. Useful for single-participant tool loops that end with a final
/// text answer.
#[derive(Default)]
pub struct TextMessageTermination {
    source: Option<String>,
    terminated: bool,
}

impl TextMessageTermination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only fire on text messages from the named participant.
    pub fn from_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

#[async_trait]
impl TerminationCondition for TextMessageTermination {
    fn terminated(&self) -> bool {
        self.terminated
    }

    async fn evaluate(&mut self, new_items: &[TeamItem]) -> Result<Option<StopMessage>> {
        if self.terminated {
            return Err(EnsembleError::AlreadyTerminated);
        }
        for item in new_items {
            let Some(msg) = item.as_message() else {
                continue;
            };
            if !matches!(msg.content, MessageContent::Text { .. }) {
                continue;
            }
            if let Some(source) = &self.source {
                if *source != msg.source {
                    continue;
                }
            }
            self.terminated = true;
            return Ok(Some(StopMessage::new(
                format!("Text message received from '{}'", msg.source),
                "TextMessageTermination",
            )));
        }
        Ok(None)
    }

    async fn reset(&mut self) -> Result<()> {
        self.terminated = false;
        Ok(())
    }

    fn save_state(&self) -> serde_json::Value {
        serde_json::json!({ "terminated": self.terminated })
    }

    fn load_state(&mut self, state: &serde_json::Value) -> Result<()> {
        self.terminated = state
            .get("terminated")
            .and_then(serde_json::Value::as_bool)
            .ok_or_else(|| EnsembleError::InvalidSnapshot("missing 'terminated' flag".into()))?;
        Ok(())
    }
}

/// Fires when its [`ExternalTerminationHandle`] has been set — the graceful
/// "stop a running team from outside" mechanism. The run ends after the turn
/// during which the flag was observed, unlike hard cancellation which may
/// abandon a turn mid-flight.
pub struct ExternalTermination {
    handle: ExternalTerminationHandle,
    terminated: bool,
}

impl ExternalTermination {
    pub fn new() -> Self {
        Self {
            handle: ExternalTerminationHandle::new(),
            terminated: false,
        }
    }

    /// Cloneable handle for setting the stop flag from another task.
    pub fn handle(&self) -> ExternalTerminationHandle {
        self.handle.clone()
    }
}

impl Default for ExternalTermination {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TerminationCondition for ExternalTermination {
    fn terminated(&self) -> bool {
        self.terminated
    }

    async fn evaluate(&mut self, _new_items: &[TeamItem]) -> Result<Option<StopMessage>> {
        if self.terminated {
            return Err(EnsembleError::AlreadyTerminated);
        }
        if self.handle.is_set() {
            self.terminated = true;
            return Ok(Some(StopMessage::new(
                "External termination requested",
                "ExternalTermination",
            )));
        }
        Ok(None)
    }

    async fn reset(&mut self) -> Result<()> {
        self.terminated = false;
        self.handle.clear();
        Ok(())
    }

    fn save_state(&self) -> serde_json::Value {
        serde_json::json!({ "terminated": self.terminated })
    }

    fn load_state(&mut self, state: &serde_json::Value) -> Result<()> {
        self.terminated = state
            .get("terminated")
            .and_then(serde_json::Value::as_bool)
            .ok_or_else(|| EnsembleError::InvalidSnapshot("missing 'terminated' flag".into()))?;
        Ok(())
    }
}

/// Fires when any of the named agents emits a message.
pub struct SourceMatchTermination {
    sources: Vec<String>,
    terminated: bool,
}

impl SourceMatchTermination {
    pub fn new(sources: Vec<String>) -> Self {
        Self {
            sources,
            terminated: false,
        }
    }
}

#[async_trait]
impl TerminationCondition for SourceMatchTermination {
    fn terminated(&self) -> bool {
        self.terminated
    }

    async fn evaluate(&mut self, new_items: &[TeamItem]) -> Result<Option<StopMessage>> {
        if self.terminated {
            return Err(EnsembleError::AlreadyTerminated);
        }
        for item in new_items {
            let Some(msg) = item.as_message() else {
                continue;
            };
            if self.sources.iter().any(|s| *s == msg.source) {
                self.terminated = true;
                return Ok(Some(StopMessage::new(
                    format!("'{}' answered", msg.source),
                    "SourceMatchTermination",
                )));
            }
        }
        Ok(None)
    }

    async fn reset(&mut self) -> Result<()> {
        self.terminated = false;
        Ok(())
    }

    fn save_state(&self) -> serde_json::Value {
        serde_json::json!({ "terminated": self.terminated })
    }

    fn load_state(&mut self, state: &serde_json::Value) -> Result<()> {
        self.terminated = state
            .get("terminated")
            .and_then(serde_json::Value::as_bool)
            .ok_or_else(|| EnsembleError::InvalidSnapshot("missing 'terminated' flag".into()))?;
        Ok(())
    }
}

/// Fires when a tool-execution event reports that the named function ran.
pub struct FunctionCallTermination {
    function_name: String,
    terminated: bool,
}

impl FunctionCallTermination {
    pub fn new(function_name: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            terminated: false,
        }
    }
}

#[async_trait]
impl TerminationCondition for FunctionCallTermination {
    fn terminated(&self) -> bool {
        self.terminated
    }

    async fn evaluate(&mut self, new_items: &[TeamItem]) -> Result<Option<StopMessage>> {
        if self.terminated {
            return Err(EnsembleError::AlreadyTerminated);
        }
        for item in new_items {
            let TeamItem::Event(AgentEvent::ToolCallExecuted { results, .. }) = item else {
                continue;
            };
            if results.iter().any(|r| r.name == self.function_name) {
                self.terminated = true;
                return Ok(Some(StopMessage::new(
                    format!("Function '{}' was executed", self.function_name),
                    "FunctionCallTermination",
                )));
            }
        }
        Ok(None)
    }

    async fn reset(&mut self) -> Result<()> {
        self.terminated = false;
        Ok(())
    }

    fn save_state(&self) -> serde_json::Value {
        serde_json::json!({ "terminated": self.terminated })
    }

    fn load_state(&mut self, state: &serde_json::Value) -> Result<()> {
        self.terminated = state
            .get("terminated")
            .and_then(serde_json::Value::as_bool)
            .ok_or_else(|| EnsembleError::InvalidSnapshot("missing 'terminated' flag".into()))?;
        Ok(())
    }
}

/// Fires when a handoff message names the configured target. Pairs with
/// human-in-the-loop flows where an agent transfers control to the external
/// user.
pub struct HandoffTermination {
    target: String,
    terminated: bool,
}

impl HandoffTermination {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            terminated: false,
        }
    }
}

#[async_trait]
impl TerminationCondition for HandoffTermination {
    fn terminated(&self) -> bool {
        self.terminated
    }

    async fn evaluate(&mut self, new_items: &[TeamItem]) -> Result<Option<StopMessage>> {
        if self.terminated {
            return Err(EnsembleError::AlreadyTerminated);
        }
        for item in new_items {
            let Some(msg) = item.as_message() else {
                continue;
            };
            if let MessageContent::Handoff { target, .. } = &msg.content {
                if *target == self.target {
                    self.terminated = true;
                    return Ok(Some(StopMessage::new(
                        format!("Handoff to {} from {} detected", target, msg.source),
                        "HandoffTermination",
                    )));
                }
            }
        }
        Ok(None)
    }

    async fn reset(&mut self) -> Result<()> {
        self.terminated = false;
        Ok(())
    }

    fn save_state(&self) -> serde_json::Value {
        serde_json::json!({ "terminated": self.terminated })
    }

    fn load_state(&mut self, state: &serde_json::Value) -> Result<()> {
        self.terminated = state
            .get("terminated")
            .and_then(serde_json::Value::as_bool)
            .ok_or_else(|| EnsembleError::InvalidSnapshot("missing 'terminated' flag".into()))?;
        Ok(())
    }
}

/// Fires when any participant produces a stop-kind message.
#[derive(Default)]
pub struct StopMessageTermination {
    terminated: bool,
}

impl StopMessageTermination {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TerminationCondition for StopMessageTermination {
    fn terminated(&self) -> bool {
        self.terminated
    }

    async fn evaluate(&mut self, new_items: &[TeamItem]) -> Result<Option<StopMessage>> {
        if self.terminated {
            return Err(EnsembleError::AlreadyTerminated);
        }
        for item in new_items {
            let Some(msg) = item.as_message() else {
                continue;
            };
            if let MessageContent::Stop { .. } = &msg.content {
                self.terminated = true;
                return Ok(Some(StopMessage::new(
                    format!("Stop message received from '{}'", msg.source),
                    "StopMessageTermination",
                )));
            }
        }
        Ok(None)
    }

    async fn reset(&mut self) -> Result<()> {
        self.terminated = false;
        Ok(())
    }

    fn save_state(&self) -> serde_json::Value {
        serde_json::json!({ "terminated": self.terminated })
    }

    fn load_state(&mut self, state: &serde_json::Value) -> Result<()> {
        self.terminated = state
            .get("terminated")
            .and_then(serde_json::Value::as_bool)
            .ok_or_else(|| EnsembleError::InvalidSnapshot("missing 'terminated' flag".into()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatMessage, FunctionExecutionResult};

    fn msg(source: &str, text: &str) -> TeamItem {
        TeamItem::Message(ChatMessage::text(source, text))
    }

    #[tokio::test]
    async fn max_message_counts_cumulatively_across_deltas() {
        let mut cond = MaxMessageTermination::new(3);
        assert!(cond.evaluate(&[msg("a", "1")]).await.unwrap().is_none());
        assert!(cond.evaluate(&[msg("b", "2")]).await.unwrap().is_none());
        let stop = cond.evaluate(&[msg("a", "3")]).await.unwrap().unwrap();
        assert!(stop.content.contains("Maximum number of messages 3"));
        assert!(cond.terminated());
    }

    #[tokio::test]
    async fn max_message_skips_events_by_default() {
        let mut cond = MaxMessageTermination::new(1);
        let event = TeamItem::Event(AgentEvent::ToolCallExecuted {
            source: "a".into(),
            results: vec![],
        });
        assert!(cond.evaluate(&[event]).await.unwrap().is_none());
        assert!(cond.evaluate(&[msg("a", "hi")]).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn evaluate_after_firing_fails() {
        let mut cond = TextMentionTermination::new("DONE");
        cond.evaluate(&[msg("a", "DONE")]).await.unwrap().unwrap();
        let err = cond.evaluate(&[msg("a", "more")]).await.unwrap_err();
        assert!(matches!(err, EnsembleError::AlreadyTerminated));

        cond.reset().await.unwrap();
        assert!(cond.evaluate(&[msg("a", "fine")]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn external_termination_observes_handle() {
        let mut cond = ExternalTermination::new();
        let handle = cond.handle();
        assert!(cond.evaluate(&[]).await.unwrap().is_none());
        handle.set();
        assert!(cond.evaluate(&[]).await.unwrap().is_some());

        cond.reset().await.unwrap();
        assert!(!handle.is_set());
        assert!(cond.evaluate(&[]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn function_call_termination_matches_executed_name() {
        let mut cond = FunctionCallTermination::new("approve");
        let other = TeamItem::Event(AgentEvent::ToolCallExecuted {
            source: "critic".into(),
            results: vec![FunctionExecutionResult {
                call_id: "1".into(),
                name: "reject".into(),
                content: "".into(),
                is_error: false,
            }],
        });
        assert!(cond.evaluate(&[other]).await.unwrap().is_none());

        let hit = TeamItem::Event(AgentEvent::ToolCallExecuted {
            source: "critic".into(),
            results: vec![FunctionExecutionResult {
                call_id: "2".into(),
                name: "approve".into(),
                content: "".into(),
                is_error: false,
            }],
        });
        let stop = cond.evaluate(&[hit]).await.unwrap().unwrap();
        assert_eq!(stop.content, "Function 'approve' was executed");
    }

    #[tokio::test]
    async fn handoff_termination_matches_target() {
        let mut cond = HandoffTermination::new("user");
        let miss = TeamItem::Message(ChatMessage::handoff("agent", "coder", "over to coder"));
        assert!(cond.evaluate(&[miss]).await.unwrap().is_none());
        let hit = TeamItem::Message(ChatMessage::handoff("agent", "user", "need input"));
        let stop = cond.evaluate(&[hit]).await.unwrap().unwrap();
        assert_eq!(stop.content, "Handoff to user from agent detected");
    }

    #[tokio::test]
    async fn source_match_fires_on_named_agent() {
        let mut cond = SourceMatchTermination::new(vec!["critic".into()]);
        assert!(cond.evaluate(&[msg("writer", "draft")]).await.unwrap().is_none());
        let stop = cond.evaluate(&[msg("critic", "looks good")]).await.unwrap().unwrap();
        assert_eq!(stop.content, "'critic' answered");
    }

    #[tokio::test]
    async fn text_message_termination_honors_source_filter() {
        let mut cond = TextMessageTermination::new().from_source("worker");
        let handoff = TeamItem::Message(ChatMessage::handoff("worker", "critic", "over"));
        assert!(cond.evaluate(&[handoff]).await.unwrap().is_none());
        assert!(cond.evaluate(&[msg("critic", "note")]).await.unwrap().is_none());
        let stop = cond.evaluate(&[msg("worker", "final answer")]).await.unwrap().unwrap();
        assert_eq!(stop.content, "Text message received from 'worker'");
    }

    #[tokio::test]
    async fn counter_state_round_trips() {
        let mut cond = MaxMessageTermination::new(5);
        cond.evaluate(&[msg("a", "1"), msg("b", "2")]).await.unwrap();
        let saved = cond.save_state();

        let mut restored = MaxMessageTermination::new(5);
        restored.load_state(&saved).unwrap();
        // Two seen already: three more messages should fire.
        assert!(restored
            .evaluate(&[msg("a", "3"), msg("b", "4"), msg("a", "5")])
            .await
            .unwrap()
            .is_some());
    }
}
