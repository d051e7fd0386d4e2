//! The turn-scheduling state machine.
//!
//! A [`Team`] owns the canonical message history for the life of a run,
//! advances the conversation turn by turn under a [`SpeakerSelector`] policy,
//! evaluates its termination condition after every turn, and forwards every
//! produced item to the run stream in exact emission order.

mod selector;

pub use selector::{
    ModelSelector, Participant, RoundRobinSelector, SelectorContext, SelectorFunc, SpeakerSelector,
};

use std::collections::BTreeMap;

use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, trace};

use crate::agent::{Agent, AgentTurnItem};
use crate::error::{EnsembleError, Result};
use crate::run_control::CancellationToken;
use crate::state::TeamState;
use crate::termination::TerminationCondition;
use crate::types::{ChatMessage, MessageContent, StopMessage, TaskResult, TeamItem};

/// Reserved name of the external-user pseudo-participant. A handoff to this
/// target pauses the conversation and returns control to the caller.
pub const USER_PARTICIPANT: &str = "user";

/// One item of a team's run stream: trace items in emission order, then
/// exactly one terminal [`TaskResult`].
#[derive(Debug, Clone, PartialEq)]
pub enum TeamRunItem {
    Item(TeamItem),
    Result(TaskResult),
}

/// Builder for [`Team`].
pub struct TeamBuilder {
    participants: Vec<Box<dyn Agent>>,
    selector: Box<dyn SpeakerSelector>,
    termination: Option<Box<dyn TerminationCondition>>,
    max_turns: Option<usize>,
}

impl TeamBuilder {
    fn new() -> Self {
        Self {
            participants: Vec::new(),
            selector: Box::new(RoundRobinSelector::new()),
            termination: None,
            max_turns: None,
        }
    }

    /// Add a participant. Names must be unique within the team.
    pub fn participant(mut self, agent: Box<dyn Agent>) -> Self {
        self.participants.push(agent);
        self
    }

    /// Set the turn-selection policy. Defaults to round-robin.
    pub fn selector(mut self, selector: Box<dyn SpeakerSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Set the termination condition evaluated after every turn.
    pub fn termination(mut self, condition: Box<dyn TerminationCondition>) -> Self {
        self.termination = Some(condition);
        self
    }

    /// Cap the number of turns per run.
    pub fn max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    pub fn build(self) -> Result<Team> {
        if self.participants.is_empty() {
            return Err(EnsembleError::Configuration(
                "a team needs at least one participant".into(),
            ));
        }
        let mut roster = Vec::with_capacity(self.participants.len());
        for agent in &self.participants {
            let name = agent.name();
            if name.is_empty() {
                return Err(EnsembleError::Configuration(
                    "participant names must be non-empty".into(),
                ));
            }
            if name == USER_PARTICIPANT {
                return Err(EnsembleError::Configuration(format!(
                    "'{USER_PARTICIPANT}' is reserved for the external user"
                )));
            }
            if agent.produced_message_kinds().is_empty() {
                return Err(EnsembleError::Configuration(format!(
                    "participant '{name}' declares no producible message kinds"
                )));
            }
            if roster.iter().any(|p: &Participant| p.name == name) {
                return Err(EnsembleError::Configuration(format!(
                    "duplicate participant name '{name}'"
                )));
            }
            roster.push(Participant {
                name: name.to_string(),
                description: agent.description().to_string(),
            });
        }
        Ok(Team {
            participants: self.participants,
            roster,
            selector: self.selector,
            termination: self.termination,
            max_turns: self.max_turns,
            history: Vec::new(),
            delivered: BTreeMap::new(),
            turn_count: 0,
            pending_handoff: None,
            running: false,
        })
    }
}

/// A group of agents taking turns under a selection policy.
///
/// A completed or cancelled run returns the team to idle; it can be invoked
/// again and preserves message history and participant state unless
/// explicitly reset. The termination condition re-arms when a run completes,
/// so a follow-up invocation gets a fresh stop budget.
pub struct Team {
    participants: Vec<Box<dyn Agent>>,
    roster: Vec<Participant>,
    selector: Box<dyn SpeakerSelector>,
    termination: Option<Box<dyn TerminationCondition>>,
    max_turns: Option<usize>,
    history: Vec<ChatMessage>,
    delivered: BTreeMap<String, usize>,
    turn_count: usize,
    pending_handoff: Option<String>,
    running: bool,
}

impl Team {
    pub fn builder() -> TeamBuilder {
        TeamBuilder::new()
    }

    /// The canonical message history.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Total turns taken across the team's lifetime.
    pub fn turn_count(&self) -> usize {
        self.turn_count
    }

    /// Participant roster in turn order.
    pub fn roster(&self) -> &[Participant] {
        &self.roster
    }

    /// Streaming run: forwards every produced message and event in emission
    /// order, ending with exactly one [`TeamRunItem::Result`].
    ///
    /// With `task = None` the run resumes from existing history
    /// ([`EnsembleError::NoTaskAndNoHistory`] if there is none). A token set
    /// before the first suspension point cancels the run with zero appended
    /// messages; set mid-run, the already-yielded items form the partial
    /// trace of fully completed turns.
    pub fn run_stream(
        &mut self,
        task: Option<Vec<ChatMessage>>,
        cancel: CancellationToken,
    ) -> BoxStream<'_, Result<TeamRunItem>> {
        Box::pin(try_stream! {
            if self.running {
                Err(EnsembleError::RunInProgress)?;
            }
            if cancel.is_cancelled() {
                Err(EnsembleError::Cancelled)?;
            }
            let task_messages = task.unwrap_or_default();
            if task_messages.is_empty() && self.history.is_empty() {
                Err(EnsembleError::NoTaskAndNoHistory)?;
            }
            self.running = true;
            debug!(
                participants = self.participants.len(),
                task_messages = task_messages.len(),
                "run started"
            );

            let mut collected: Vec<TeamItem> = Vec::new();
            let mut pending_delta: Vec<TeamItem> = Vec::new();
            let mut pause_reason: Option<String> = None;
            let stop_reason: Option<String>;
            let mut turns_this_run = 0usize;

            // Task messages enter the history and the stream before the first
            // turn, and count toward termination.
            for msg in task_messages {
                self.history.push(msg.clone());
                let item = TeamItem::Message(msg);
                collected.push(item.clone());
                pending_delta.push(item.clone());
                yield TeamRunItem::Item(item);
            }

            loop {
                // Termination sees the incremental items since its previous
                // evaluation, never the full history.
                if !pending_delta.is_empty() {
                    let fired = match &mut self.termination {
                        Some(condition) => match condition.evaluate(&pending_delta).await {
                            Ok(fired) => fired,
                            Err(err) => {
                                self.running = false;
                                Err(err)?
                            }
                        },
                        None => None,
                    };
                    pending_delta.clear();
                    if let Some(StopMessage { content, source }) = fired {
                        debug!(%source, %content, "termination fired");
                        stop_reason = Some(content);
                        break;
                    }
                }

                // A handoff to the external user pauses the run and returns
                // control to the caller.
                if let Some(reason) = pause_reason.take() {
                    stop_reason = Some(reason);
                    break;
                }

                if let Some(max) = self.max_turns {
                    if turns_this_run >= max {
                        stop_reason = Some(format!("Maximum number of turns {max} reached"));
                        break;
                    }
                }

                if cancel.is_cancelled() {
                    self.running = false;
                    Err(EnsembleError::Cancelled)?;
                }

                // A handoff overrides the policy for exactly one turn. The
                // target is resolved when the handoff is recorded, so this
                // only misses on a snapshot naming a departed participant.
                let speaker_index = match self.pending_handoff.take() {
                    Some(target) => match self.roster.iter().position(|p| p.name == target) {
                        Some(index) => {
                            debug!(%target, "handoff overrides speaker selection");
                            index
                        }
                        None => {
                            stop_reason = Some(format!(
                                "Handoff target '{target}' is not a team participant; awaiting external input"
                            ));
                            break;
                        }
                    },
                    None => match self.selector.select(&self.roster, &self.history).await {
                        Ok(index) => index,
                        Err(err) => {
                            self.running = false;
                            Err(err)?
                        }
                    },
                };

                let speaker_name = self.roster[speaker_index].name.clone();
                let already_seen = self.delivered.get(&speaker_name).copied().unwrap_or(0);
                let delta: Vec<ChatMessage> = self.history[already_seen..].to_vec();
                debug!(speaker = %speaker_name, new_messages = delta.len(), "turn started");

                let mut response = None;
                let mut turn_err = None;
                {
                    let agent = &mut self.participants[speaker_index];
                    let mut stream = agent.on_messages_stream(&delta, &cancel);
                    while let Some(item) = stream.next().await {
                        match item {
                            Ok(AgentTurnItem::Item(inner)) => {
                                trace!(speaker = %speaker_name, "inner item");
                                collected.push(inner.clone());
                                pending_delta.push(inner.clone());
                                yield TeamRunItem::Item(inner);
                            }
                            Ok(AgentTurnItem::Response(r)) => response = Some(r),
                            Err(err) => {
                                turn_err = Some(err);
                                break;
                            }
                        }
                    }
                }
                if let Some(err) = turn_err {
                    self.running = false;
                    let err = match err {
                        EnsembleError::Cancelled => EnsembleError::Cancelled,
                        failure @ EnsembleError::AgentFailure { .. } => failure,
                        other => EnsembleError::agent_failure(speaker_name.clone(), other),
                    };
                    Err(err)?;
                }
                let response = match response {
                    Some(r) => r,
                    None => {
                        self.running = false;
                        Err(EnsembleError::agent_failure(
                            speaker_name.clone(),
                            "turn stream ended without a terminal response",
                        ))?
                    }
                };

                let message = response.chat_message;
                self.history.push(message.clone());
                // The speaker has seen everything up to and including its own
                // reply; others will receive it as part of their next delta.
                self.delivered.insert(speaker_name.clone(), self.history.len());
                if let MessageContent::Handoff { target, .. } = &message.content {
                    if self.roster.iter().any(|p| p.name == *target) {
                        self.pending_handoff = Some(target.clone());
                    } else {
                        // External target: pause after this turn's bookkeeping
                        // and route the caller's eventual reply back to the
                        // participant that handed off.
                        debug!(%target, speaker = %speaker_name, "handoff to external target pauses the run");
                        self.pending_handoff = Some(speaker_name.clone());
                        pause_reason = Some(format!(
                            "Handoff target '{target}' is not a team participant; awaiting external input"
                        ));
                    }
                }
                let item = TeamItem::Message(message);
                collected.push(item.clone());
                pending_delta.push(item.clone());
                yield TeamRunItem::Item(item);

                self.selector.note_speaker(speaker_index);
                self.turn_count += 1;
                turns_this_run += 1;
                debug!(speaker = %speaker_name, turn = self.turn_count, "turn completed");
            }

            // Conditions re-arm automatically when a run completes; only
            // Team::reset wipes the conversation itself.
            if let Some(condition) = &mut self.termination {
                if let Err(err) = condition.reset().await {
                    self.running = false;
                    Err(err)?;
                }
            }

            self.running = false;
            let result = TaskResult {
                messages: collected,
                stop_reason,
            };
            debug!(
                stop_reason = ?result.stop_reason,
                items = result.messages.len(),
                "run finished"
            );
            yield TeamRunItem::Result(result);
        })
    }

    /// Blocking run: drain [`run_stream`](Self::run_stream) and keep the
    /// final [`TaskResult`].
    pub async fn run(
        &mut self,
        task: Option<Vec<ChatMessage>>,
        cancel: CancellationToken,
    ) -> Result<TaskResult> {
        let mut stream = self.run_stream(task, cancel);
        let mut result = None;
        while let Some(item) = stream.next().await {
            if let TeamRunItem::Result(r) = item? {
                result = Some(r);
            }
        }
        drop(stream);
        // The stream ends without a terminal result only when it stopped at a
        // cancellation suspension point.
        result.ok_or(EnsembleError::Cancelled)
    }

    /// Clear the history, reset every participant, the selector, and the
    /// termination condition. Also clears a stale run-in-progress flag left
    /// behind by a run stream that was dropped mid-run.
    pub async fn reset(&mut self, cancel: &CancellationToken) -> Result<()> {
        for (index, agent) in self.participants.iter_mut().enumerate() {
            if cancel.is_cancelled() {
                return Err(EnsembleError::Cancelled);
            }
            agent.reset().await.map_err(|err| {
                EnsembleError::agent_failure(self.roster[index].name.clone(), err)
            })?;
        }
        if let Some(condition) = &mut self.termination {
            condition.reset().await?;
        }
        self.selector.reset();
        self.history.clear();
        self.delivered.clear();
        self.turn_count = 0;
        self.pending_handoff = None;
        self.running = false;
        Ok(())
    }

    /// Snapshot the team's entire conversational state.
    ///
    /// # Errors
    ///
    /// Fails with [`EnsembleError::RunInProgress`] while a run is active.
    pub fn save_state(&self) -> Result<TeamState> {
        if self.running {
            return Err(EnsembleError::RunInProgress);
        }
        let mut agent_states = BTreeMap::new();
        for (index, agent) in self.participants.iter().enumerate() {
            agent_states.insert(self.roster[index].name.clone(), agent.save_state()?);
        }
        Ok(TeamState {
            agent_states,
            history: self.history.clone(),
            turn_count: self.turn_count,
            delivered: self.delivered.clone(),
            pending_handoff: self.pending_handoff.clone(),
            selector_state: self.selector.save_state(),
            termination_state: match &self.termination {
                Some(condition) => condition.save_state(),
                None => serde_json::Value::Null,
            },
        })
    }

    /// Restore a snapshot produced by [`save_state`](Self::save_state) on an
    /// equivalently configured team. All-or-nothing: on any failure the
    /// previous state is rolled back and the error reported.
    pub fn load_state(&mut self, state: &TeamState) -> Result<()> {
        if self.running {
            return Err(EnsembleError::RunInProgress);
        }
        // Structural validation up front: the snapshot must cover exactly
        // this team's roster.
        for name in state.agent_states.keys() {
            if !self.roster.iter().any(|p| p.name == *name) {
                return Err(EnsembleError::InvalidSnapshot(format!(
                    "snapshot references unknown participant '{name}'"
                )));
            }
        }
        for participant in &self.roster {
            if !state.agent_states.contains_key(&participant.name) {
                return Err(EnsembleError::InvalidSnapshot(format!(
                    "snapshot is missing state for participant '{}'",
                    participant.name
                )));
            }
        }
        for name in state.delivered.keys() {
            if !self.roster.iter().any(|p| p.name == *name) {
                return Err(EnsembleError::InvalidSnapshot(format!(
                    "snapshot delivery bookkeeping references unknown participant '{name}'"
                )));
            }
        }

        let backup = self.save_state()?;
        if let Err(err) = self.apply_state(state) {
            // Roll back to the pre-load state; validation above makes a
            // second failure here unexpected.
            let _ = self.apply_state(&backup);
            return Err(err);
        }
        Ok(())
    }

    fn apply_state(&mut self, state: &TeamState) -> Result<()> {
        for (index, agent) in self.participants.iter_mut().enumerate() {
            let name = &self.roster[index].name;
            if let Some(agent_state) = state.agent_states.get(name) {
                agent.load_state(agent_state)?;
            }
        }
        self.selector.load_state(&state.selector_state)?;
        if let Some(condition) = &mut self.termination {
            if !state.termination_state.is_null() {
                condition.load_state(&state.termination_state)?;
            }
        }
        self.history = state.history.clone();
        self.delivered = state.delivered.clone();
        self.turn_count = state.turn_count;
        self.pending_handoff = state.pending_handoff.clone();
        Ok(())
    }
}
