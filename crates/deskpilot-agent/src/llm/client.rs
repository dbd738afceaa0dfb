//! OpenAI Chat Completions client.
//!
//! Speaks the non-streaming Chat Completions contract, which OpenAI and the
//! usual compatible endpoints (Ollama, vLLM, Together) all implement.  A
//! single response schema is accepted: `choices[0].message` with optional
//! `tool_calls`.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use crate::error::{AgentError, Result};
use crate::llm::types::{ChatRequest, LlmResponse, Message, Role, ToolCall, ToolDefinition};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Per-request timeout for model calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// Client configuration
// ---------------------------------------------------------------------------

/// Configuration for connecting to a Chat Completions endpoint.
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Base URL without the trailing `/chat/completions`.
    pub base_url: String,
    /// Model used when a request leaves `model` empty.
    pub default_model: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl LlmClientConfig {
    /// Create a configuration for the OpenAI API.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_owned(),
            default_model: model.into(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// Point the configuration at another compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A client for the Chat Completions API.
#[derive(Debug, Clone)]
pub struct LlmClient {
    config: LlmClientConfig,
    http: reqwest::Client,
}

impl LlmClient {
    /// Create a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::MissingApiKey`] when the key is empty.
    pub fn new(config: LlmClientConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AgentError::MissingApiKey {
                env_var: API_KEY_ENV.into(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { config, http })
    }

    /// The model used when a request does not name one.
    pub fn default_model(&self) -> &str {
        &self.config.default_model
    }

    /// Send one chat turn and parse the model's reply.
    ///
    /// # Errors
    ///
    /// - [`AgentError::Upstream`] when the endpoint answers with a status
    ///   of 400 or above.
    /// - [`AgentError::LlmTimeout`] when the call exceeds the client timeout.
    /// - [`AgentError::LlmRequestFailed`] on other transport failures.
    /// - [`AgentError::LlmParseFailed`] when the body is not a valid
    ///   Chat Completions response.
    pub async fn chat(&self, request: &ChatRequest) -> Result<LlmResponse> {
        let body = self.build_request_body(request);
        let resp = self.send_request(&body).await?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| self.transport_error(e, "failed to read response body"))?;

        if !status.is_success() {
            let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
            tracing::warn!(status = status.as_u16(), "LLM endpoint returned an error status");
            return Err(AgentError::Upstream {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("error").to_owned(),
                body,
            });
        }

        let v: Value = serde_json::from_str(&text).map_err(|e| AgentError::LlmParseFailed {
            reason: format!("invalid JSON response: {e}"),
        })?;

        parse_openai_response(&v)
    }

    // -- Request building ----------------------------------------------------

    /// Build the JSON body for the Chat Completions API.
    fn build_request_body(&self, request: &ChatRequest) -> Value {
        let model = if request.model.is_empty() {
            self.config.default_model.as_str()
        } else {
            request.model.as_str()
        };

        let mut body = json!({
            "model": model,
            "messages": messages_to_openai(&request.messages),
        });

        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }

        if !request.tools.is_empty() {
            body["tools"] = tools_to_openai(&request.tools);
            body["tool_choice"] = json!("auto");
        }

        body
    }

    /// Send the HTTP request to the `/chat/completions` endpoint.
    async fn send_request(&self, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", self.config.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).map_err(|e| AgentError::LlmRequestFailed {
                reason: format!("invalid authorization header: {e}"),
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        tracing::debug!(url = %url, model = %body["model"], "sending LLM request");

        self.http
            .post(&url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e, "request failed"))
    }

    fn transport_error(&self, err: reqwest::Error, context: &str) -> AgentError {
        if err.is_timeout() {
            tracing::warn!(timeout = ?self.config.timeout, "LLM request timed out");
            AgentError::LlmTimeout {
                millis: self.config.timeout.as_millis() as u64,
            }
        } else {
            AgentError::LlmRequestFailed {
                reason: format!("{context}: {err}"),
            }
        }
    }
}

// ===========================================================================
// Wire format conversion (free functions)
// ===========================================================================

/// Convert internal messages to the Chat Completions wire format.
///
/// System messages stay in the `messages` array, tool calls go in
/// `assistant.tool_calls` with stringified arguments, and tool results use
/// `role: "tool"` with a `tool_call_id`.
pub fn messages_to_openai(messages: &[Message]) -> Vec<Value> {
    let mut wire_messages: Vec<Value> = Vec::with_capacity(messages.len());

    for msg in messages {
        match msg.role {
            Role::System => {
                wire_messages.push(json!({
                    "role": "system",
                    "content": msg.content,
                }));
            }
            Role::User => {
                wire_messages.push(json!({
                    "role": "user",
                    "content": msg.content,
                }));
            }
            Role::Assistant if msg.tool_calls.is_empty() => {
                wire_messages.push(json!({
                    "role": "assistant",
                    "content": msg.content,
                }));
            }
            Role::Assistant => {
                let tool_calls: Vec<Value> = msg
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {
                                "name": tc.name,
                                "arguments": tc.arguments.to_string(),
                            }
                        })
                    })
                    .collect();

                let content = if msg.content.is_empty() {
                    Value::Null
                } else {
                    json!(msg.content)
                };

                wire_messages.push(json!({
                    "role": "assistant",
                    "content": content,
                    "tool_calls": tool_calls,
                }));
            }
            Role::Tool => {
                wire_messages.push(json!({
                    "role": "tool",
                    "tool_call_id": msg.tool_call_id,
                    "content": msg.content,
                }));
            }
        }
    }

    wire_messages
}

/// Convert tool definitions into the Chat Completions `tools` array.
///
/// Each tool is wrapped in `{"type": "function", "function": {...}}`.
pub fn tools_to_openai(tools: &[ToolDefinition]) -> Value {
    let tool_values: Vec<Value> = tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.input_schema,
                }
            })
        })
        .collect();
    json!(tool_values)
}

/// Parse a Chat Completions response into an [`LlmResponse`].
///
/// Tool call arguments arrive as a JSON string; a string that does not decode
/// to an object is replaced by `{}` so the tool can report the missing
/// argument itself.
pub fn parse_openai_response(v: &Value) -> Result<LlmResponse> {
    let message = &v["choices"][0]["message"];

    if !message.is_object() {
        return Err(AgentError::LlmParseFailed {
            reason: "missing `choices[0].message` in response".into(),
        });
    }

    let content = message["content"].as_str().unwrap_or_default().to_owned();

    if let Some(tool_calls_arr) = message["tool_calls"].as_array()
        && !tool_calls_arr.is_empty()
    {
        let calls = tool_calls_arr
            .iter()
            .map(|tc| {
                let func = &tc["function"];
                let name = func["name"].as_str().unwrap_or_default().to_owned();
                ToolCall {
                    id: tc["id"].as_str().unwrap_or_default().to_owned(),
                    arguments: decode_arguments(&name, &func["arguments"]),
                    name,
                }
            })
            .collect();

        return Ok(LlmResponse::ToolCalls { content, calls });
    }

    Ok(LlmResponse::Text(content))
}

/// Decode a tool call's `arguments` field, degrading to `{}`.
fn decode_arguments(name: &str, raw: &Value) -> Value {
    let decoded = match raw {
        Value::String(s) if s.trim().is_empty() => Value::Object(Default::default()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "undecodable tool arguments, using {{}}");
                Value::Object(Default::default())
            }
        },
        Value::Object(_) => raw.clone(),
        _ => Value::Object(Default::default()),
    };

    if decoded.is_object() {
        decoded
    } else {
        tracing::warn!(tool = %name, "tool arguments are not an object, using {{}}");
        Value::Object(Default::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
