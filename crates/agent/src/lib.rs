//! # webhound-agent
//!
//! The session orchestrator: per-conversation state machines that drive
//! repeated model/tool turns in the background, the append-only message
//! log they produce, and the store that guarantees at most one active run
//! per session.
//!
//! One run follows the cycle:
//!
//! 1. **Accept** a user message (`SessionStore::start_run`)
//! 2. **Call the model** with the session's context and tool schemas
//! 3. **If tool calls**: execute them, record each as a `tool_activity`
//!    message, loop back to step 2
//! 4. **If text only**: append it as the final answer and finish
//!
//! A hard tool budget bounds the worst case; when it is hit the model gets
//! one last turn without tool access to summarize.

pub mod loop_runner;
pub mod prompts;
pub mod session;

pub use loop_runner::AgentLoop;
pub use session::{LogSnapshot, Session, SessionStore};
