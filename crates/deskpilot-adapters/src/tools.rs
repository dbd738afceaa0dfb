//! Tool dispatch table for the LLM loop.
//!
//! [`ActionTools`] exposes the desktop as eight tools and realizes each call
//! by requesting the service's own HTTP action endpoints.  Going through HTTP
//! means every model-requested action passes the same token, panic and
//! allowlist checks as a direct client.
//!
//! Tool arguments are decoded into a typed [`ToolRequest`] before anything
//! is sent; a missing argument becomes a `400` result fed back to the model.

use std::time::Duration;

use async_trait::async_trait;
use deskpilot_agent::{AgentError, ToolAdapter, ToolDefinition};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::apps::resolve_app;

/// Timeout for each local action request.
const LOCAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Texts longer than this many characters go through the clipboard.
pub const MAX_TYPED_CHARS: usize = 300;

/// Upper bound of the `sleep` tool, in seconds.
pub const MAX_SLEEP_SECS: f64 = 5.0;

/// Default of the `sleep` tool, in seconds.
pub const DEFAULT_SLEEP_SECS: f64 = 0.5;

/// Whether `text` should be pasted rather than typed.
///
/// Keystroke synthesis is unreliable for line breaks, long input and
/// anything outside ASCII.
pub fn needs_clipboard(text: &str) -> bool {
    text.contains(['\n', '\r']) || text.chars().count() > MAX_TYPED_CHARS || !text.is_ascii()
}

// ---------------------------------------------------------------------------
// Typed requests
// ---------------------------------------------------------------------------

/// A decoded tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolRequest {
    RunApp { name: String },
    FocusWindow { title: String },
    OpenUrl { url: String },
    TypeText { text: String },
    PasteText { text: String },
    Hotkey { keys: String },
    Screenshot,
    Sleep { sec: f64 },
}

/// Why a tool call could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    UnknownTool(String),
    MissingArgument(&'static str),
}

impl RequestError {
    fn to_result(&self) -> Value {
        match self {
            Self::UnknownTool(name) => json!({"ok": false, "error": format!("unknown tool {name}")}),
            Self::MissingArgument(field) => json!({
                "ok": false,
                "status": 400,
                "error": format!("missing_{field}_argument"),
            }),
        }
    }
}

impl ToolRequest {
    /// Decode a tool call.  String arguments must be present and not blank.
    pub fn parse(tool: &str, args: &Value) -> Result<Self, RequestError> {
        let request = match tool {
            "run_app" => Self::RunApp {
                name: text_arg(args, "name")?,
            },
            "focus_window" => Self::FocusWindow {
                title: text_arg(args, "title")?,
            },
            "open_url" => Self::OpenUrl {
                url: text_arg(args, "url")?,
            },
            "type_text" => Self::TypeText {
                text: text_arg(args, "text")?,
            },
            "paste_text" => Self::PasteText {
                text: text_arg(args, "text")?,
            },
            "hotkey" => Self::Hotkey {
                keys: text_arg(args, "keys")?,
            },
            "screenshot" => Self::Screenshot,
            "sleep" => Self::Sleep {
                sec: sleep_secs(args.get("sec")),
            },
            other => return Err(RequestError::UnknownTool(other.to_owned())),
        };
        Ok(request)
    }
}

fn text_arg(args: &Value, field: &'static str) -> Result<String, RequestError> {
    args.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_owned)
        .ok_or(RequestError::MissingArgument(field))
}

fn sleep_secs(value: Option<&Value>) -> f64 {
    let sec = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    match sec {
        Some(sec) if sec.is_finite() => sec.clamp(0.0, MAX_SLEEP_SECS),
        _ => DEFAULT_SLEEP_SECS,
    }
}

// ---------------------------------------------------------------------------
// Local calls
// ---------------------------------------------------------------------------

/// Outcome of one request to a local action endpoint.
#[derive(Debug, Clone)]
struct LocalReply {
    ok: bool,
    status: u16,
    data: Value,
}

impl LocalReply {
    fn transport_failure(reason: String) -> Self {
        Self {
            ok: false,
            status: 0,
            data: Value::String(reason),
        }
    }

    /// The value fed back to the model.
    fn into_result(self) -> Value {
        if self.ok {
            let mut data = match self.data {
                Value::Object(map) => map,
                other => {
                    let mut map = Map::new();
                    map.insert("result".into(), other);
                    map
                }
            };
            data.insert("ok".into(), Value::Bool(true));
            Value::Object(data)
        } else if self.status == 0 {
            json!({"ok": false, "error": self.data})
        } else {
            json!({"ok": false, "status": self.status, "error": self.data})
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch table
// ---------------------------------------------------------------------------

/// HTTP-backed tool adapter over the action endpoints.
#[derive(Debug, Clone)]
pub struct ActionTools {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ActionTools {
    /// Tools calling the service at `base_url` (e.g. `http://127.0.0.1:8730`).
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(LOCAL_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token: None,
        }
    }

    /// Send `token` with every request.  An empty token is ignored.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = (!token.is_empty()).then_some(token);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call_local(&self, path: &str, params: &[(&str, &str)]) -> LocalReply {
        let mut query: Vec<(&str, &str)> = params.to_vec();
        if let Some(token) = &self.token {
            query.push(("token", token.as_str()));
        }

        let url = format!("{}{path}", self.base_url);
        debug!(path, "calling local action");

        let response = match self.client.get(&url).query(&query).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(path, error = %e, "local action request failed");
                return LocalReply::transport_failure(format!("request failed: {e}"));
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(t) => t,
            Err(e) => return LocalReply::transport_failure(format!("read failed: {e}")),
        };
        let data = serde_json::from_str(&text).unwrap_or_else(|_| json!({ "raw": text }));

        LocalReply {
            ok: status.is_success(),
            status: status.as_u16(),
            data,
        }
    }

    /// Realize one decoded request.  Never fails: every outcome is a JSON
    /// object with an `ok` field.
    pub async fn dispatch(&self, request: ToolRequest) -> Value {
        match request {
            ToolRequest::RunApp { name } => {
                let key = resolve_app(&name);
                let reply = self.call_local("/app/run", &[("name", &key)]).await;
                let mut result = reply.into_result();
                if result["ok"] == Value::Bool(false) {
                    result["tried_name"] = json!(name);
                    result["normalized_key"] = json!(key);
                }
                result
            }
            ToolRequest::FocusWindow { title } => self
                .call_local("/window/activate", &[("title", &title)])
                .await
                .into_result(),
            ToolRequest::OpenUrl { url } => self
                .call_local("/browser/open", &[("url", &url)])
                .await
                .into_result(),
            ToolRequest::TypeText { text } => {
                if needs_clipboard(&text) {
                    debug!(chars = text.chars().count(), "routing text through the clipboard");
                    self.paste_text(&text).await
                } else {
                    self.call_local("/os/keyboard/type", &[("text", &text)])
                        .await
                        .into_result()
                }
            }
            ToolRequest::PasteText { text } => self.paste_text(&text).await,
            ToolRequest::Hotkey { keys } => self
                .call_local("/os/keyboard/hotkey", &[("keys", &keys)])
                .await
                .into_result(),
            ToolRequest::Screenshot => self
                .call_local("/screen/screenshot", &[])
                .await
                .into_result(),
            ToolRequest::Sleep { sec } => {
                tokio::time::sleep(Duration::from_secs_f64(sec)).await;
                json!({"ok": true, "slept": sec})
            }
        }
    }

    /// Set the clipboard, then paste.  No paste is issued when the
    /// clipboard could not be set.
    async fn paste_text(&self, text: &str) -> Value {
        let clipboard = self
            .call_local("/os/clipboard/set", &[("text", text)])
            .await
            .into_result();
        if clipboard["ok"] != Value::Bool(true) {
            return json!({"ok": false, "clipboard": clipboard});
        }

        let paste = self
            .call_local("/os/keyboard/paste", &[])
            .await
            .into_result();
        let ok = paste["ok"] == Value::Bool(true);
        json!({"ok": ok, "clipboard": clipboard, "paste": paste})
    }
}

fn tool(name: &str, description: &str, properties: Value, required: &[&str]) -> ToolDefinition {
    ToolDefinition {
        name: name.to_owned(),
        description: description.to_owned(),
        input_schema: json!({
            "type": "object",
            "properties": properties,
            "required": required,
        }),
    }
}

#[async_trait]
impl ToolAdapter for ActionTools {
    fn adapter_id(&self) -> &str {
        "desktop"
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        vec![
            tool(
                "run_app",
                "Launch an application from the allowlist ([run.allowlist] in config.toml).",
                json!({"name": {"type": "string", "description": "Application name or allowlist key"}}),
                &["name"],
            ),
            tool(
                "focus_window",
                "Focus the first window whose title contains `title` (case-insensitive).",
                json!({"title": {"type": "string"}}),
                &["title"],
            ),
            tool(
                "open_url",
                "Open a URL in the default browser. Prefer this for websites.",
                json!({"url": {"type": "string"}}),
                &["url"],
            ),
            tool(
                "type_text",
                "Type text into the active window. Multi-line, long or non-ASCII text is pasted instead.",
                json!({"text": {"type": "string"}}),
                &["text"],
            ),
            tool(
                "paste_text",
                "Paste text (UTF-8, multi-line) into the active window through the clipboard.",
                json!({"text": {"type": "string"}}),
                &["text"],
            ),
            tool(
                "hotkey",
                "Send a key combination such as 'ctrl+l' or 'ctrl+enter'.",
                json!({"keys": {"type": "string"}}),
                &["keys"],
            ),
            tool(
                "screenshot",
                "Capture the screen and return the local URL of the image.",
                json!({}),
                &[],
            ),
            tool(
                "sleep",
                "Wait a number of seconds (0 to 5) so the previous action can settle.",
                json!({"sec": {"type": "number", "minimum": 0, "maximum": MAX_SLEEP_SECS}}),
                &[],
            ),
        ]
    }

    async fn execute(&self, tool_name: &str, arguments: Value) -> deskpilot_agent::Result<String> {
        let result = match ToolRequest::parse(tool_name, &arguments) {
            Ok(request) => self.dispatch(request).await,
            Err(RequestError::UnknownTool(name)) => {
                return Err(AgentError::UnknownTool { tool_name: name });
            }
            Err(rejection) => rejection.to_result(),
        };
        Ok(result.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clipboard_routing() {
        assert!(needs_clipboard("line1\nline2"));
        assert!(needs_clipboard("a\rb"));
        assert!(needs_clipboard(&"a".repeat(301)));
        assert!(needs_clipboard("café"));
        assert!(!needs_clipboard(&"a".repeat(300)));
        assert!(!needs_clipboard("simple"));
    }

    #[test]
    fn blank_text_is_rejected_before_dispatch() {
        for args in [json!({}), json!({"text": ""}), json!({"text": "   "}), json!({"text": 3})] {
            let err = ToolRequest::parse("type_text", &args).unwrap_err();
            assert_eq!(err, RequestError::MissingArgument("text"));
            assert_eq!(err.to_result()["error"], "missing_text_argument");
            assert_eq!(err.to_result()["status"], 400);
        }
    }

    #[test]
    fn sleep_is_clamped() {
        let sec = |v: Value| match ToolRequest::parse("sleep", &v).unwrap() {
            ToolRequest::Sleep { sec } => sec,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(sec(json!({})), 0.5);
        assert_eq!(sec(json!({"sec": 12})), 5.0);
        assert_eq!(sec(json!({"sec": -1})), 0.0);
        assert_eq!(sec(json!({"sec": "1.5"})), 1.5);
        assert_eq!(sec(json!({"sec": "soon"})), 0.5);
    }

    #[test]
    fn unknown_tool_result() {
        let err = ToolRequest::parse("format_disk", &json!({})).unwrap_err();
        assert_eq!(err.to_result()["error"], "unknown tool format_disk");
    }

    #[test]
    fn schema_exposes_every_tool() {
        let tools = ActionTools::new("http://localhost");
        let names: Vec<String> = tools
            .tool_definitions()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(
            names,
            [
                "run_app",
                "focus_window",
                "open_url",
                "type_text",
                "paste_text",
                "hotkey",
                "screenshot",
                "sleep"
            ]
        );
    }

    #[test]
    fn failed_reply_carries_status() {
        let reply = LocalReply {
            ok: false,
            status: 403,
            data: json!({"ok": false, "error": "notepad not in allowlist"}),
        };
        let result = reply.into_result();
        assert_eq!(result["status"], 403);
        assert_eq!(result["error"]["error"], "notepad not in allowlist");
    }
}
