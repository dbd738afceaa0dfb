//! LLM tool-calling runtime for DeskPilot.
//!
//! This crate drives the "LLM planner": a conversation with an OpenAI-style
//! Chat Completions endpoint in which the model requests desktop tools, the
//! runtime executes them through [`ToolAdapter`] implementations, and the
//! results are fed back until the model answers in plain text.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  tool calls  ┌──────────────┐
//! │  LlmClient  │────────────> │ ToolAdapter  │
//! │  (OpenAI)   │ <────────────│ (dispatch)   │
//! └──────┬──────┘  tool turns  └──────────────┘
//!        │
//!   run_tool_loop (bounded by AgentConfig::max_turns)
//! ```
//!
//! ## Modules
//!
//! - [`llm`] -- Chat Completions client and wire types.
//! - [`runtime`] -- The tool-calling loop and tool adapter trait.
//! - [`error`] -- Agent error types.

pub mod error;
pub mod llm;
pub mod runtime;

pub use error::{AgentError, Result};
pub use llm::{
    ChatRequest, LlmClient, LlmClientConfig, LlmResponse, Message, Role, ToolCall, ToolDefinition,
    ToolResult,
};
pub use runtime::{
    AgentConfig, AgentContext, AgentResponse, LoopPhase, ToolAdapter, run_tool_loop,
};
