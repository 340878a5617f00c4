//! Agent module - the tool-using oracle session and role prompts.
//!
//! A session follows a "tools in a loop" pattern:
//! 1. Build context with system prompt and user task
//! 2. Call the LLM with available tools
//! 3. If the LLM requests tool calls, execute them and feed the results back
//! 4. Repeat until the LLM produces a final response or the iteration cap is hit

mod agent_loop;
pub mod prompt;

pub use agent_loop::{SessionEnd, SessionOutcome, ToolSession};
pub(crate) use agent_loop::truncate_for_log;
