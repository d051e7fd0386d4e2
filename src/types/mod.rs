//! Typed vocabulary exchanged between agents and the orchestrator.

pub mod events;
pub mod message;
pub mod results;

pub use events::{AgentEvent, FunctionCall, FunctionExecutionResult, TeamItem};
pub use message::{ChatMessage, ContentPart, ImageContent, MessageContent, MessageKind};
pub use results::{Response, StopMessage, TaskResult};
