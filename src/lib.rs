//! Ensemble — multi-agent conversation orchestration.
//!
//! Teams of agents exchange messages turn by turn under a pluggable speaker
//! policy, with composable termination conditions, live event streaming,
//! cooperative cancellation, and snapshot/restore of the whole conversation.
//!
//! # Quick Start
//!
//! ```no_run
//! use ensemble::prelude::*;
//!
//! # async fn example(writer: Box<dyn ensemble::agent::Agent>, critic: Box<dyn ensemble::agent::Agent>) -> ensemble::error::Result<()> {
//! let mut team = Team::builder()
//!     .participant(writer)
//!     .participant(critic)
//!     .termination(Box::new(TextMentionTermination::new("APPROVE")))
//!     .build()?;
//!
//! let task = vec![ChatMessage::text("user", "Write a haiku about the sea.")];
//! let result = team.run(Some(task), CancellationToken::new()).await?;
//! println!("{:?}", result.stop_reason);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod client;
pub mod error;
pub mod prelude;
pub mod run_control;
pub mod state;
pub mod team;
pub mod termination;
pub mod types;
