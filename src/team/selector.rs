//! Turn-selection policies.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{EnsembleError, Result};
use crate::types::ChatMessage;

/// Roster view of one participant, as shown to selection policies.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub name: String,
    pub description: String,
}

/// Pluggable next-speaker policy.
///
/// Selectors own their bookkeeping (cursors, last speaker) and expose it for
/// the team snapshot envelope.
#[async_trait]
pub trait SpeakerSelector: Send {
    /// Choose the next speaker as an index into `roster`.
    async fn select(&mut self, roster: &[Participant], history: &[ChatMessage]) -> Result<usize>;

    /// Record the speaker that actually took the turn. Called for every
    /// turn, including handoff-forced ones that bypassed [`select`](Self::select).
    fn note_speaker(&mut self, index: usize);

    fn reset(&mut self);

    fn save_state(&self) -> serde_json::Value;

    fn load_state(&mut self, state: &serde_json::Value) -> Result<()>;
}

#[derive(Serialize, Deserialize)]
struct CursorState {
    next: usize,
    previous: Option<usize>,
}

/// Advances through the roster in fixed cyclic order starting from index 0.
///
/// A handoff-forced turn does not move the cursor; with `allow_repeated`
/// disabled the cycle additionally skips the previous speaker so no
/// participant takes two consecutive turns.
pub struct RoundRobinSelector {
    allow_repeated: bool,
    next: usize,
    previous: Option<usize>,
}

impl RoundRobinSelector {
    pub fn new() -> Self {
        Self {
            allow_repeated: true,
            next: 0,
            previous: None,
        }
    }

    pub fn allow_repeated(mut self, allow: bool) -> Self {
        self.allow_repeated = allow;
        self
    }
}

impl Default for RoundRobinSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeakerSelector for RoundRobinSelector {
    async fn select(&mut self, roster: &[Participant], _history: &[ChatMessage]) -> Result<usize> {
        let len = roster.len();
        let mut index = self.next % len;
        if !self.allow_repeated && len > 1 && Some(index) == self.previous {
            index = (index + 1) % len;
        }
        self.next = (index + 1) % len;
        Ok(index)
    }

    fn note_speaker(&mut self, index: usize) {
        self.previous = Some(index);
    }

    fn reset(&mut self) {
        self.next = 0;
        self.previous = None;
    }

    fn save_state(&self) -> serde_json::Value {
        serde_json::json!(CursorState {
            next: self.next,
            previous: self.previous,
        })
    }

    fn load_state(&mut self, state: &serde_json::Value) -> Result<()> {
        let state: CursorState = serde_json::from_value(state.clone())?;
        self.next = state.next;
        self.previous = state.previous;
        Ok(())
    }
}

/// Owned view handed to a [`SelectorFunc`]: the eligible candidates plus the
/// conversation so far.
#[derive(Debug, Clone)]
pub struct SelectorContext {
    pub candidates: Vec<Participant>,
    pub history: Vec<ChatMessage>,
}

/// External decision function choosing the next speaker by name, typically
/// backed by a model call.
pub type SelectorFunc = Arc<
    dyn Fn(SelectorContext) -> Pin<Box<dyn Future<Output = Result<String>> + Send>> + Send + Sync,
>;

/// Asks an external decision function to pick the next speaker by name.
///
/// An unknown (or disallowed) name gets one re-prompt; if the second answer
/// still doesn't match, selection falls back to cyclic order over the
/// eligible candidates.
pub struct ModelSelector {
    select_fn: SelectorFunc,
    allow_repeated: bool,
    fallback_next: usize,
    previous: Option<usize>,
}

impl ModelSelector {
    pub fn new(select_fn: SelectorFunc) -> Self {
        Self {
            select_fn,
            allow_repeated: false,
            fallback_next: 0,
            previous: None,
        }
    }

    pub fn allow_repeated(mut self, allow: bool) -> Self {
        self.allow_repeated = allow;
        self
    }

    fn is_eligible(&self, index: usize, len: usize) -> bool {
        self.allow_repeated || len <= 1 || Some(index) != self.previous
    }
}

#[async_trait]
impl SpeakerSelector for ModelSelector {
    async fn select(&mut self, roster: &[Participant], history: &[ChatMessage]) -> Result<usize> {
        let len = roster.len();
        let candidates: Vec<Participant> = roster
            .iter()
            .enumerate()
            .filter(|(i, _)| self.is_eligible(*i, len))
            .map(|(_, p)| p.clone())
            .collect();

        // One initial ask plus one re-prompt before falling back.
        for attempt in 0..2 {
            let context = SelectorContext {
                candidates: candidates.clone(),
                history: history.to_vec(),
            };
            let name = (self.select_fn)(context).await?;
            if let Some(index) = roster
                .iter()
                .position(|p| p.name == name)
                .filter(|i| self.is_eligible(*i, len))
            {
                return Ok(index);
            }
            tracing::debug!(%name, attempt, "selector returned unknown speaker");
        }

        let mut index = self.fallback_next % len;
        for _ in 0..len {
            if self.is_eligible(index, len) {
                self.fallback_next = index + 1;
                tracing::debug!(index, "selector fell back to cyclic order");
                return Ok(index);
            }
            index = (index + 1) % len;
        }
        Err(EnsembleError::UnknownParticipant(
            "no eligible speaker".into(),
        ))
    }

    fn note_speaker(&mut self, index: usize) {
        self.previous = Some(index);
    }

    fn reset(&mut self) {
        self.fallback_next = 0;
        self.previous = None;
    }

    fn save_state(&self) -> serde_json::Value {
        serde_json::json!(CursorState {
            next: self.fallback_next,
            previous: self.previous,
        })
    }

    fn load_state(&mut self, state: &serde_json::Value) -> Result<()> {
        let state: CursorState = serde_json::from_value(state.clone())?;
        self.fallback_next = state.next;
        self.previous = state.previous;
        Ok(())
    }
}
