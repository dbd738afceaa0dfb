//! LLM integration layer.
//!
//! - [`types`] -- Core data types (messages, tool calls, requests).
//! - [`client`] -- HTTP client for the OpenAI Chat Completions API and
//!   compatible endpoints.

pub mod client;
pub mod types;

pub use client::{LlmClient, LlmClientConfig};
pub use types::{ChatRequest, LlmResponse, Message, Role, ToolCall, ToolDefinition, ToolResult};
