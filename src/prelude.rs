//! Common imports for working with ensemble.

pub use crate::agent::{Agent, AgentTurnItem, AssistantAgent, UserProxyAgent};
pub use crate::client::{ChatClient, Completion};
pub use crate::error::{EnsembleError, Result};
pub use crate::run_control::{CancellationToken, ExternalTerminationHandle};
pub use crate::state::TeamState;
pub use crate::team::{
    ModelSelector, Participant, RoundRobinSelector, SpeakerSelector, Team, TeamRunItem,
    USER_PARTICIPANT,
};
pub use crate::termination::{
    all_of, any_of, ExternalTermination, FunctionCallTermination, HandoffTermination,
    MaxMessageTermination, SourceMatchTermination, StopMessageTermination,
    TerminationCondition, TextMentionTermination, TextMessageTermination,
};
pub use crate::types::{
    AgentEvent, ChatMessage, MessageContent, MessageKind, Response, StopMessage, TaskResult,
    TeamItem,
};
