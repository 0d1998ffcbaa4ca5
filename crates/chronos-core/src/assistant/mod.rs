//! Assistant orchestration
//!
//! Glue between retrieval, the model and content extraction:
//! - System prompt assembly from retrieved knowledge
//! - Conversation state with one request in flight at a time
//! - Bounded correction requests for visuals that fail to render

mod prompt;
mod session;

pub use prompt::{NO_CONTEXT_FALLBACK, build_system_prompt, render_context_node};
pub use session::{Assistant, AssistantReply, CONNECTION_FAILURE, ChatTurn};
