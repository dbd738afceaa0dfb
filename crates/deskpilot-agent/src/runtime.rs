//! Tool-calling loop runtime.
//!
//! The loop sends the conversation to the model.  When the model answers with
//! tool calls, each call is executed in order through the registered
//! [`ToolAdapter`]s and its result is appended as a tool turn carrying the
//! call's id.  The loop ends when the model answers without tool calls, or
//! fails when the endpoint errors or the turn cap is reached.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::llm::LlmClient;
use crate::llm::types::{ChatRequest, LlmResponse, Message, ToolCall, ToolDefinition, ToolResult};

/// Text returned when the model finishes with empty content.
pub const EMPTY_ANSWER: &str = "(ok)";

// ---------------------------------------------------------------------------
// Tool adapter trait
// ---------------------------------------------------------------------------

/// Trait for components that can execute tool calls on behalf of the agent.
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    /// The unique identifier for this adapter.
    fn adapter_id(&self) -> &str;

    /// Returns the tool definitions this adapter exposes to the LLM.
    fn tool_definitions(&self) -> Vec<ToolDefinition>;

    /// Execute a named tool with the given arguments.
    ///
    /// Returns the result serialized as a JSON object with at least `ok`.
    async fn execute(&self, tool_name: &str, arguments: Value) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Agent context
// ---------------------------------------------------------------------------

/// Configuration for the tool loop.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum number of model calls in one run.
    ///
    /// The loop has no natural bound (a model may keep requesting tools), so
    /// a cap is enforced as a policy choice.  Reaching it fails the run.
    pub max_turns: u32,

    /// Model identifier.  Empty means the client default.
    pub model: String,

    /// Sampling temperature.
    pub temperature: Option<f32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: 16,
            model: String::new(),
            temperature: Some(0.2),
        }
    }
}

/// Holds the state for a single agent invocation.
pub struct AgentContext {
    /// Unique identifier for this run, used in log lines.
    pub task_id: Uuid,

    /// Conversation history.  Append-only during a run.
    pub messages: Vec<Message>,

    /// Tool adapters available for this run.
    pub adapters: Vec<Arc<dyn ToolAdapter>>,

    /// The LLM client to use.
    pub llm: Arc<LlmClient>,

    /// Runtime configuration.
    pub config: AgentConfig,
}

impl AgentContext {
    /// Create a new agent context.
    pub fn new(
        llm: Arc<LlmClient>,
        adapters: Vec<Arc<dyn ToolAdapter>>,
        config: AgentConfig,
    ) -> Self {
        Self {
            task_id: Uuid::now_v7(),
            messages: Vec::new(),
            adapters,
            llm,
            config,
        }
    }

    /// Put a system prompt at the head of the conversation.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.messages.insert(0, Message::system(prompt));
        self
    }

    /// Add a user message to the conversation.
    pub fn with_user_message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(Message::user(message));
        self
    }

    /// Collect all tool definitions from registered adapters.
    fn all_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.adapters
            .iter()
            .flat_map(|a| a.tool_definitions())
            .collect()
    }

    /// Find the adapter that owns a given tool name.
    fn find_adapter_for_tool(&self, tool_name: &str) -> Option<&Arc<dyn ToolAdapter>> {
        self.adapters
            .iter()
            .find(|a| a.tool_definitions().iter().any(|td| td.name == tool_name))
    }
}

// ---------------------------------------------------------------------------
// Loop phases
// ---------------------------------------------------------------------------

/// Where a run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    /// A request to the model is in flight.
    AwaitingModel,
    /// Tool calls from the last model turn are being executed.
    ExecutingTools,
    /// The model answered without tool calls.
    Done,
    /// The endpoint errored or the turn cap was reached.
    Failed,
}

impl fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AwaitingModel => "awaiting_model",
            Self::ExecutingTools => "executing_tools",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Agent response
// ---------------------------------------------------------------------------

/// The final response from an agent invocation.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// The model's final text, or [`EMPTY_ANSWER`] when it was empty.
    pub text: String,

    /// Number of model calls that were made.
    pub turns_used: u32,

    /// Number of tool calls executed across all turns.
    pub tool_calls: usize,

    /// The task ID for this invocation.
    pub task_id: Uuid,
}

// ---------------------------------------------------------------------------
// Tool loop
// ---------------------------------------------------------------------------

/// Run the tool-calling loop until the model answers in text.
///
/// # Errors
///
/// - [`AgentError::MaxTurnsExceeded`] when `max_turns` model calls produced
///   no final answer.
/// - Errors from [`LlmClient::chat`] (upstream status, transport, parse).
///
/// Tool failures never abort the loop; they are fed back to the model as
/// `{"ok": false, "error": ...}` tool turns.
pub async fn run_tool_loop(ctx: &mut AgentContext) -> Result<AgentResponse> {
    let tools = ctx.all_tool_definitions();
    let task_id = ctx.task_id;
    let max_turns = ctx.config.max_turns;
    let mut tool_call_count = 0usize;

    tracing::info!(
        task_id = %task_id,
        max_turns,
        tool_count = tools.len(),
        "starting tool loop"
    );

    for turn in 0..max_turns {
        log_phase(task_id, turn, LoopPhase::AwaitingModel);

        let request = ChatRequest {
            model: ctx.config.model.clone(),
            messages: ctx.messages.clone(),
            tools: tools.clone(),
            temperature: ctx.config.temperature,
        };

        let response = match ctx.llm.chat(&request).await {
            Ok(r) => r,
            Err(e) => {
                log_phase(task_id, turn, LoopPhase::Failed);
                tracing::warn!(task_id = %task_id, error = %e, "model call failed");
                return Err(e);
            }
        };

        match response {
            LlmResponse::Text(text) => {
                log_phase(task_id, turn, LoopPhase::Done);
                ctx.messages.push(Message::assistant(&text));

                let text = if text.trim().is_empty() {
                    EMPTY_ANSWER.to_owned()
                } else {
                    text
                };

                return Ok(AgentResponse {
                    text,
                    turns_used: turn + 1,
                    tool_calls: tool_call_count,
                    task_id,
                });
            }

            LlmResponse::ToolCalls { content, calls } => {
                log_phase(task_id, turn, LoopPhase::ExecutingTools);
                tracing::info!(
                    task_id = %task_id,
                    turn,
                    tools = ?calls.iter().map(|c| &c.name).collect::<Vec<_>>(),
                    "LLM requested tool calls"
                );

                ctx.messages
                    .push(Message::assistant_tool_calls(content, calls.clone()));

                for call in &calls {
                    let result = execute_tool_call(call, ctx).await;
                    tracing::debug!(
                        task_id = %task_id,
                        tool = %call.name,
                        is_error = result.is_error,
                        "tool turn recorded"
                    );
                    ctx.messages
                        .push(Message::tool_result(&result.tool_call_id, &result.content));
                }
                tool_call_count += calls.len();
            }
        }
    }

    log_phase(task_id, max_turns, LoopPhase::Failed);
    Err(AgentError::MaxTurnsExceeded { max_turns })
}

fn log_phase(task_id: Uuid, turn: u32, phase: LoopPhase) {
    tracing::debug!(task_id = %task_id, turn, phase = %phase, "tool loop phase");
}

/// Execute one tool call, turning every failure into an error result.
async fn execute_tool_call(call: &ToolCall, ctx: &AgentContext) -> ToolResult {
    let Some(adapter) = ctx.find_adapter_for_tool(&call.name) else {
        tracing::warn!(tool = %call.name, "model requested an unknown tool");
        let err = AgentError::UnknownTool {
            tool_name: call.name.clone(),
        };
        return error_result(&call.id, &err);
    };

    tracing::debug!(tool = %call.name, id = %call.id, "executing tool");

    match adapter.execute(&call.name, call.arguments.clone()).await {
        Ok(content) => ToolResult {
            tool_call_id: call.id.clone(),
            content,
            is_error: false,
        },
        Err(e) => {
            tracing::warn!(tool = %call.name, error = %e, "tool execution failed");
            error_result(&call.id, &e)
        }
    }
}

fn error_result(tool_call_id: &str, err: &AgentError) -> ToolResult {
    ToolResult {
        tool_call_id: tool_call_id.to_owned(),
        content: json!({"ok": false, "error": err.to_string()}).to_string(),
        is_error: true,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmClientConfig;

    struct MockAdapter {
        id: String,
        tools: Vec<ToolDefinition>,
    }

    #[async_trait]
    impl ToolAdapter for MockAdapter {
        fn adapter_id(&self) -> &str {
            &self.id
        }

        fn tool_definitions(&self) -> Vec<ToolDefinition> {
            self.tools.clone()
        }

        async fn execute(&self, tool_name: &str, _arguments: Value) -> Result<String> {
            if tool_name == "broken" {
                return Err(AgentError::ToolExecutionFailed {
                    tool_name: tool_name.into(),
                    reason: "boom".into(),
                });
            }
            Ok(json!({"ok": true, "tool": tool_name}).to_string())
        }
    }

    fn tool(name: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.into(),
            description: format!("Tool {name}"),
            input_schema: json!({"type": "object"}),
        }
    }

    fn context(adapter: Arc<dyn ToolAdapter>) -> AgentContext {
        let llm = Arc::new(LlmClient::new(LlmClientConfig::openai("test-key", "gpt-4o-mini")).unwrap());
        AgentContext::new(llm, vec![adapter], AgentConfig::default())
    }

    #[test]
    fn agent_context_collects_tools() {
        let ctx = context(Arc::new(MockAdapter {
            id: "desktop".into(),
            tools: vec![tool("open_url"), tool("sleep")],
        }));
        let tools = ctx.all_tool_definitions();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "open_url");
        assert_eq!(tools[1].name, "sleep");
        assert!(ctx.find_adapter_for_tool("sleep").is_some());
        assert!(ctx.find_adapter_for_tool("nonexistent").is_none());
    }

    #[test]
    fn agent_context_builder_pattern() {
        let ctx = context(Arc::new(MockAdapter {
            id: "desktop".into(),
            tools: vec![],
        }))
        .with_user_message("ouvre gmail")
        .with_system_prompt("You drive a desktop.");

        assert_eq!(ctx.messages.len(), 2);
        assert_eq!(ctx.messages[0].role, crate::llm::Role::System);
        assert_eq!(ctx.messages[1].role, crate::llm::Role::User);
    }

    #[tokio::test]
    async fn unknown_tool_becomes_error_result() {
        let ctx = context(Arc::new(MockAdapter {
            id: "desktop".into(),
            tools: vec![tool("open_url")],
        }));
        let call = ToolCall {
            id: "call_1".into(),
            name: "format_disk".into(),
            arguments: json!({}),
        };

        let result = execute_tool_call(&call, &ctx).await;
        assert!(result.is_error);
        assert_eq!(result.tool_call_id, "call_1");
        let content: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(content["ok"], false);
        assert_eq!(content["error"], "unknown tool format_disk");
    }

    #[tokio::test]
    async fn adapter_error_becomes_error_result() {
        let ctx = context(Arc::new(MockAdapter {
            id: "desktop".into(),
            tools: vec![tool("broken")],
        }));
        let call = ToolCall {
            id: "call_2".into(),
            name: "broken".into(),
            arguments: json!({}),
        };

        let result = execute_tool_call(&call, &ctx).await;
        assert!(result.is_error);
        let content: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(content["ok"], false);
        assert!(content["error"].as_str().unwrap().contains("boom"));
    }

    #[test]
    fn loop_phase_display() {
        assert_eq!(LoopPhase::AwaitingModel.to_string(), "awaiting_model");
        assert_eq!(LoopPhase::Failed.to_string(), "failed");
    }
}
