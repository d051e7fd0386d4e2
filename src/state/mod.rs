//! Serializable snapshot envelope for teams.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::ChatMessage;

/// Capture of a team's entire conversational state: the shared message
/// history, every participant's opaque snapshot, and orchestrator
/// bookkeeping. Produced by `save_state`, consumed by `load_state` on an
/// equivalently configured team; never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamState {
    /// Per-participant opaque snapshots, keyed by participant name.
    pub agent_states: BTreeMap<String, serde_json::Value>,
    /// The canonical message history.
    pub history: Vec<ChatMessage>,
    /// Total turns taken across the team's lifetime.
    pub turn_count: usize,
    /// How far into the history each participant has been delivered.
    pub delivered: BTreeMap<String, usize>,
    /// Speaker override carried across runs: an unconsumed handoff target,
    /// or the participant that handed off to the external user when the run
    /// paused awaiting input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_handoff: Option<String>,
    /// Speaker-selection policy bookkeeping (e.g., next-speaker cursor).
    #[serde(default)]
    pub selector_state: serde_json::Value,
    /// Termination condition state, if a condition is configured.
    #[serde(default)]
    pub termination_state: serde_json::Value,
}

impl TeamState {
    /// Serialize for file storage.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from file storage. Round-trips exactly through
    /// [`to_json_string`](Self::to_json_string).
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
