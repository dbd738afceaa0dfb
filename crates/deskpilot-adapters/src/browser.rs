//! Browser sub-scripts over the Chrome DevTools Protocol.
//!
//! A script is an ordered list of [`BrowserStep`]s posted to
//! `/browser/script`.  Each step is validated into a typed
//! [`BrowserAction`] when it is reached; a step missing its required field
//! aborts the script before anything else runs.
//!
//! # Transport
//!
//! 1. `GET http://localhost:{port}/json` lists targets; the first `page`
//!    target is used.
//! 2. Each CDP command opens a WebSocket to that page, sends one message,
//!    waits for the response with the matching id and closes.
//!
//! When the DevTools endpoint is unreachable the driver launches Chrome with
//! `--remote-debugging-port` and waits for it to come up.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

use crate::desktop::which_exists;
use crate::error::{AdapterError, Result};

/// Default Chrome DevTools Protocol debug port.
pub const DEFAULT_DEBUG_PORT: u16 = 9222;

/// Per-step timeout when the step does not set `timeout_ms`.
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 10_000;

/// Timeout for HTTP requests to the DevTools endpoint.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout waiting for a launched Chrome to expose DevTools.
const CHROME_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between selector / load-state polls.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Maximum CDP response size in bytes (screenshots included).
const MAX_CDP_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

/// File name used for browser screenshots inside the shots directory.
pub const BROWSER_SHOT_NAME: &str = "browser.png";

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

fn default_timeout_ms() -> u64 {
    DEFAULT_STEP_TIMEOUT_MS
}

/// One step of a browser sub-script, as received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserStep {
    /// `goto`, `click`, `fill`, `type`, `press`, `wait`, `eval` or `screenshot`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl BrowserStep {
    /// A step of the given kind with every field unset.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            url: None,
            selector: None,
            text: None,
            key: None,
            expression: None,
            timeout_ms: DEFAULT_STEP_TIMEOUT_MS,
        }
    }

    /// Check required fields and convert into a typed action.
    pub fn validate(&self) -> Result<BrowserAction> {
        let action = match self.kind.as_str() {
            "goto" => BrowserAction::Goto {
                url: required(&self.url, "url")?,
            },
            "click" => BrowserAction::Click {
                selector: required(&self.selector, "selector")?,
            },
            "fill" => BrowserAction::Fill {
                selector: required(&self.selector, "selector")?,
                text: self.text.clone().unwrap_or_default(),
            },
            "type" => BrowserAction::Type {
                text: self.text.clone().unwrap_or_default(),
            },
            "press" => BrowserAction::Press {
                key: required(&self.key, "key")?,
            },
            "wait" => BrowserAction::Wait {
                selector: required(&self.selector, "selector")?,
            },
            "eval" => BrowserAction::Eval {
                expression: self
                    .expression
                    .clone()
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| "document.title".to_owned()),
            },
            "screenshot" => BrowserAction::Screenshot,
            other => {
                return Err(AdapterError::validation(format!("Unknown action: {other}")));
            }
        };
        Ok(action)
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn required(field: &Option<String>, name: &str) -> Result<String> {
    field
        .as_deref()
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| AdapterError::validation(format!("{name} required")))
}

/// A validated browser primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserAction {
    Goto { url: String },
    Click { selector: String },
    Fill { selector: String, text: String },
    Type { text: String },
    Press { key: String },
    Wait { selector: String },
    Eval { expression: String },
    Screenshot,
}

impl BrowserAction {
    fn name(&self) -> &'static str {
        match self {
            Self::Goto { .. } => "goto",
            Self::Click { .. } => "click",
            Self::Fill { .. } => "fill",
            Self::Type { .. } => "type",
            Self::Press { .. } => "press",
            Self::Wait { .. } => "wait",
            Self::Eval { .. } => "eval",
            Self::Screenshot => "screenshot",
        }
    }
}

/// Wrap a user expression so a thrown exception becomes its string form.
pub fn guarded_expression(expression: &str) -> String {
    format!("(function(){{ try{{ return {expression}; }}catch(e){{ return String(e); }} }})()")
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Drives a Chromium-based browser through its remote debugging port.
#[derive(Debug)]
pub struct BrowserDriver {
    debug_port: u16,
    chrome_path: Option<String>,
    next_message_id: AtomicU64,
    client: reqwest::Client,
}

impl Default for BrowserDriver {
    fn default() -> Self {
        Self::new(DEFAULT_DEBUG_PORT)
    }
}

impl BrowserDriver {
    /// Create a driver for the given debug port.
    pub fn new(debug_port: u16) -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent("DeskPilot/0.1")
            .build()
            .unwrap_or_default();

        Self {
            debug_port,
            chrome_path: None,
            next_message_id: AtomicU64::new(1),
            client,
        }
    }

    /// Set a custom Chrome/Chromium executable path.
    pub fn with_chrome_path(mut self, path: impl Into<String>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    /// Run a sub-script, returning one result object per step.
    ///
    /// Stops at the first step that fails validation or execution.
    pub async fn run_script(&self, steps: &[BrowserStep], shots_dir: &Path) -> Result<Vec<Value>> {
        // Validate the first step before touching the browser so a malformed
        // script never launches Chrome.
        if let Some(first) = steps.first() {
            first.validate()?;
        }
        if !steps.is_empty() {
            self.ensure_browser().await?;
        }

        let mut results = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            let action = step.validate()?;
            let timeout = step.timeout();
            debug!(index, action = action.name(), timeout_ms = step.timeout_ms, "browser step");

            let result = tokio::time::timeout(timeout, self.perform(&action, timeout, shots_dir))
                .await
                .map_err(|_| AdapterError::Timeout {
                    millis: step.timeout_ms,
                    reason: format!("browser step `{}`", action.name()),
                })??;
            results.push(result);
        }

        info!(steps = results.len(), "browser script finished");
        Ok(results)
    }

    async fn perform(
        &self,
        action: &BrowserAction,
        timeout: Duration,
        shots_dir: &Path,
    ) -> Result<Value> {
        match action {
            BrowserAction::Goto { url } => {
                self.send_cdp_command("Page.navigate", json!({ "url": url }))
                    .await?;
                self.wait_until("document.readyState === 'complete'", timeout)
                    .await?;
                Ok(json!({"ok": true}))
            }
            BrowserAction::Click { selector } => {
                self.wait_for_selector(selector, timeout).await?;
                let js = format!(
                    "(() => {{ const el = document.querySelector({sel}); el.scrollIntoView(); el.click(); return true; }})()",
                    sel = serde_json::to_string(selector)?
                );
                self.evaluate(&js).await?;
                Ok(json!({"ok": true}))
            }
            BrowserAction::Fill { selector, text } => {
                self.wait_for_selector(selector, timeout).await?;
                let js = format!(
                    r#"(() => {{
                        const el = document.querySelector({sel});
                        el.focus();
                        if ('value' in el) {{ el.value = {text}; }} else {{ el.textContent = {text}; }}
                        el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                        el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                        return true;
                    }})()"#,
                    sel = serde_json::to_string(selector)?,
                    text = serde_json::to_string(text)?
                );
                self.evaluate(&js).await?;
                Ok(json!({"ok": true}))
            }
            BrowserAction::Type { text } => {
                self.send_cdp_command("Input.insertText", json!({ "text": text }))
                    .await?;
                Ok(json!({"ok": true}))
            }
            BrowserAction::Press { key } => {
                let mut down = json!({ "type": "keyDown", "key": key });
                if key.eq_ignore_ascii_case("enter") {
                    down["text"] = json!("\r");
                }
                self.send_cdp_command("Input.dispatchKeyEvent", down).await?;
                self.send_cdp_command(
                    "Input.dispatchKeyEvent",
                    json!({ "type": "keyUp", "key": key }),
                )
                .await?;
                Ok(json!({"ok": true}))
            }
            BrowserAction::Wait { selector } => {
                self.wait_for_selector(selector, timeout).await?;
                Ok(json!({"ok": true}))
            }
            BrowserAction::Eval { expression } => {
                let value = self.evaluate(&guarded_expression(expression)).await?;
                Ok(json!({"ok": true, "result": value}))
            }
            BrowserAction::Screenshot => {
                let result = self
                    .send_cdp_command(
                        "Page.captureScreenshot",
                        json!({ "format": "png", "captureBeyondViewport": true }),
                    )
                    .await?;
                let data = result.get("data").and_then(Value::as_str).unwrap_or("");
                let bytes = STANDARD
                    .decode(data)
                    .map_err(|e| AdapterError::failed("browser screenshot", e.to_string()))?;
                tokio::fs::create_dir_all(shots_dir).await?;
                let path: PathBuf = shots_dir.join(BROWSER_SHOT_NAME);
                tokio::fs::write(&path, bytes).await?;
                Ok(json!({"ok": true, "path": path.to_string_lossy()}))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Browser lifecycle
    // -----------------------------------------------------------------------

    fn devtools_base_url(&self) -> String {
        format!("http://localhost:{}", self.debug_port)
    }

    async fn is_devtools_reachable(&self) -> bool {
        let url = format!("{}/json/version", self.devtools_base_url());
        self.client.get(&url).send().await.is_ok()
    }

    /// Make sure a debuggable browser is listening, launching one if needed.
    async fn ensure_browser(&self) -> Result<()> {
        if self.is_devtools_reachable().await {
            return Ok(());
        }

        let chrome_path = self.find_chrome_path()?;
        info!(chrome_path = %chrome_path, port = self.debug_port, "launching Chrome with remote debugging");

        let profile_dir = std::env::temp_dir().join("deskpilot-chrome-profile");
        tokio::process::Command::new(&chrome_path)
            .arg(format!("--remote-debugging-port={}", self.debug_port))
            .arg(format!("--user-data-dir={}", profile_dir.display()))
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--start-maximized")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| AdapterError::failed("browser launch", format!("`{chrome_path}`: {e}")))?;

        let deadline = tokio::time::Instant::now() + CHROME_STARTUP_TIMEOUT;
        loop {
            if self.is_devtools_reachable().await {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(AdapterError::Timeout {
                    millis: CHROME_STARTUP_TIMEOUT.as_millis() as u64,
                    reason: "Chrome did not expose DevTools in time".into(),
                });
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    fn find_chrome_path(&self) -> Result<String> {
        if let Some(path) = &self.chrome_path {
            return Ok(path.clone());
        }

        [
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ]
        .into_iter()
        .find(|c| which_exists(c))
        .map(str::to_owned)
        .ok_or_else(|| {
            AdapterError::failed(
                "browser launch",
                "no Chrome/Chromium executable found; set [browser] chrome_path",
            )
        })
    }

    // -----------------------------------------------------------------------
    // CDP transport
    // -----------------------------------------------------------------------

    /// WebSocket debugger URL of the first page target.
    async fn page_ws_url(&self) -> Result<String> {
        let url = format!("{}/json", self.devtools_base_url());
        let targets: Vec<Value> = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AdapterError::failed("browser", format!("failed to list targets: {e}")))?
            .json()
            .await
            .map_err(|e| AdapterError::failed("browser", format!("bad target list: {e}")))?;

        targets
            .iter()
            .filter(|t| t.get("type").and_then(Value::as_str) == Some("page"))
            .find_map(|t| t.get("webSocketDebuggerUrl").and_then(Value::as_str))
            .map(str::to_owned)
            .ok_or_else(|| AdapterError::failed("browser", "no page target available"))
    }

    /// Send one CDP command and return its `result` object.
    async fn send_cdp_command(&self, method: &str, params: Value) -> Result<Value> {
        let ws_url = self.page_ws_url().await?;
        let msg_id = self.next_message_id.fetch_add(1, Ordering::Relaxed);
        debug!(method, msg_id, "sending CDP command");

        let (ws_stream, _) = connect_async(ws_url.as_str())
            .await
            .map_err(|e| AdapterError::failed("browser", format!("WebSocket connect: {e}")))?;
        let (mut sink, mut stream) = ws_stream.split();

        let message = json!({ "id": msg_id, "method": method, "params": params });
        sink.send(Message::Text(message.to_string().into()))
            .await
            .map_err(|e| AdapterError::failed("browser", format!("WebSocket send: {e}")))?;

        let mut outcome = Err(AdapterError::failed(
            "browser",
            "WebSocket closed before the CDP response",
        ));
        while let Some(frame) = stream.next().await {
            let frame =
                frame.map_err(|e| AdapterError::failed("browser", format!("WebSocket receive: {e}")))?;
            let Message::Text(text) = frame else {
                if matches!(frame, Message::Close(_)) {
                    break;
                }
                continue;
            };
            if text.len() > MAX_CDP_RESPONSE_BYTES {
                outcome = Err(AdapterError::failed("browser", "CDP response too large"));
                break;
            }

            let response: Value = serde_json::from_str(&text)?;
            if response.get("id").and_then(Value::as_u64) != Some(msg_id) {
                continue;
            }
            outcome = match response.get("error") {
                Some(error) => Err(AdapterError::failed(
                    method,
                    error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown CDP error"),
                )),
                None => Ok(response.get("result").cloned().unwrap_or(json!({}))),
            };
            break;
        }

        let _ = sink.send(Message::Close(None)).await;
        outcome
    }

    /// Evaluate JavaScript and return its value.
    async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result = self
            .send_cdp_command(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        extract_runtime_value(&result)
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let check = format!(
            "document.querySelector({}) !== null",
            serde_json::to_string(selector)?
        );
        self.wait_until(&check, timeout).await.map_err(|e| match e {
            AdapterError::Timeout { millis, .. } => AdapterError::Timeout {
                millis,
                reason: format!("selector `{selector}` not found"),
            },
            other => other,
        })
    }

    /// Poll a boolean expression until it is true or `timeout` elapses.
    async fn wait_until(&self, condition: &str, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.evaluate(condition).await? == Value::Bool(true) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(AdapterError::Timeout {
                    millis: timeout.as_millis() as u64,
                    reason: format!("condition `{condition}`"),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

/// Extract the value of a `Runtime.evaluate` result.
///
/// Shape: `{ "result": { "type": "string", "value": "..." } }`.  Results
/// without a `value` (e.g. `undefined`) yield `null`.
fn extract_runtime_value(cdp_result: &Value) -> Result<Value> {
    if let Some(exception) = cdp_result.get("exceptionDetails") {
        let text = exception
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or("unknown exception");
        return Err(AdapterError::failed(
            "browser eval",
            format!("JavaScript exception: {text}"),
        ));
    }

    let result = cdp_result
        .get("result")
        .ok_or_else(|| AdapterError::failed("browser eval", "CDP response missing `result`"))?;
    Ok(result.get("value").cloned().unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(json: Value) -> BrowserStep {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn step_defaults_timeout() {
        let s = step(json!({"type": "click", "selector": "#go"}));
        assert_eq!(s.timeout_ms, 10_000);
        assert_eq!(
            s.validate().unwrap(),
            BrowserAction::Click {
                selector: "#go".into()
            }
        );
    }

    #[test]
    fn missing_required_fields_are_named() {
        let cases = [
            (json!({"type": "goto"}), "url required"),
            (json!({"type": "click", "selector": ""}), "selector required"),
            (json!({"type": "fill", "text": "x"}), "selector required"),
            (json!({"type": "wait"}), "selector required"),
            (json!({"type": "press"}), "key required"),
            (json!({"type": "scroll"}), "Unknown action: scroll"),
        ];
        for (input, message) in cases {
            let err = step(input).validate().unwrap_err();
            assert_eq!(err.to_string(), message);
        }
    }

    #[test]
    fn eval_defaults_to_document_title() {
        let action = step(json!({"type": "eval"})).validate().unwrap();
        assert_eq!(
            action,
            BrowserAction::Eval {
                expression: "document.title".into()
            }
        );
    }

    #[test]
    fn guarded_expression_catches() {
        let js = guarded_expression("document.title");
        assert!(js.contains("try{ return document.title; }"));
        assert!(js.contains("return String(e)"));
    }

    #[test]
    fn runtime_value_extraction() {
        let ok = json!({"result": {"type": "string", "value": "Inbox"}});
        assert_eq!(extract_runtime_value(&ok).unwrap(), json!("Inbox"));

        let undefined = json!({"result": {"type": "undefined"}});
        assert_eq!(extract_runtime_value(&undefined).unwrap(), Value::Null);

        let thrown = json!({"result": {}, "exceptionDetails": {"text": "Uncaught"}});
        assert!(extract_runtime_value(&thrown).is_err());
    }

    #[tokio::test]
    async fn invalid_first_step_fails_before_touching_the_browser() {
        // Port 9 (discard) has no DevTools endpoint; validation must fail first.
        let driver = BrowserDriver::new(9);
        let dir = tempfile::tempdir().unwrap();
        let err = driver
            .run_script(&[BrowserStep::new("goto")], dir.path())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "url required");
    }

    #[tokio::test]
    async fn empty_script_is_a_no_op() {
        let driver = BrowserDriver::new(9);
        let dir = tempfile::tempdir().unwrap();
        let results = driver.run_script(&[], dir.path()).await.unwrap();
        assert!(results.is_empty());
    }
}
