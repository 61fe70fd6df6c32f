//! Orchestration
//!
//! Turns one command into actions by driving a model backend through a
//! bounded tool-calling loop.
//!
//! - [`conversation`]: turns and history trimming
//! - [`prompt`]: per-bucket system prompt with the board listing
//! - [`results`]: synthetic tool results and the fallback summary
//! - [`tool_loop`]: the bounded loop itself

pub mod conversation;
pub mod prompt;
pub mod results;
pub mod tool_loop;

pub use conversation::{Conversation, ConversationTurn, Role, MAX_HISTORY_TURNS};
pub use prompt::build_system_prompt;
pub use results::{fallback_summary, BoardView};
pub use tool_loop::{LoopOutcome, StopReason, ToolLoop};
