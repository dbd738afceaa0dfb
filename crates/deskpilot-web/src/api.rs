//! Action and control endpoints.
//!
//! Action endpoints answer `{"status": "ok", "ok": true, ...}` on success.
//! Failures are [`ApiError`]s rendered as `{"ok": false, "error", "detail"}`.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use deskpilot_adapters::{AdapterError, BrowserStep, MouseButton};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::ApiError;
use crate::state::AppState;

type ApiResult = Result<Json<Value>, ApiError>;

/// `{"status":"ok","ok":true}` merged with `extra`.
fn ok(extra: Value) -> Json<Value> {
    let mut body = json!({"status": "ok", "ok": true});
    if let (Some(body), Value::Object(extra)) = (body.as_object_mut(), extra) {
        body.extend(extra);
    }
    Json(body)
}

fn required(value: Option<String>, name: &str) -> Result<String, AdapterError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AdapterError::validation(format!("{name} required")))
}

fn parse_int<T: std::str::FromStr>(value: Option<String>, name: &str) -> Result<T, AdapterError> {
    let raw = required(value, name)?;
    raw.trim()
        .parse()
        .map_err(|_| AdapterError::validation(format!("{name} must be an integer")))
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TextQuery {
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct KeysQuery {
    pub keys: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TitleQuery {
    pub title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NameQuery {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UrlQuery {
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MoveQuery {
    pub x: Option<String>,
    pub y: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ClickQuery {
    pub button: Option<String>,
    pub clicks: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScriptBody {
    #[serde(default)]
    pub steps: Vec<BrowserStep>,
}

// ---------------------------------------------------------------------------
// Control
// ---------------------------------------------------------------------------

/// `GET /panic` -- disable every action.  Never requires the token.
pub async fn panic(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.panic_switch().engage();
    Json(json!({"status": "ok", "disabled": true}))
}

/// `GET /enable` -- re-enable actions.
pub async fn enable(State(state): State<Arc<AppState>>) -> Json<Value> {
    state.panic_switch().release();
    Json(json!({"status": "ok", "disabled": false}))
}

/// `GET /status` -- effective configuration.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "backend": state.surface.backend_id(),
        "config_path": state.config_path.to_string_lossy(),
        "features": state.surface.features().effective(),
        "allowlist": state.surface.allowlist().keys(),
        "disabled": state.panic_switch().is_engaged(),
    }))
}

// ---------------------------------------------------------------------------
// Mouse, keyboard, clipboard
// ---------------------------------------------------------------------------

pub async fn mouse_move(
    State(state): State<Arc<AppState>>,
    Query(q): Query<MoveQuery>,
) -> ApiResult {
    let x = parse_int(q.x, "x")?;
    let y = parse_int(q.y, "y")?;
    state.surface.mouse_move(x, y).await?;
    Ok(ok(json!({})))
}

pub async fn mouse_click(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ClickQuery>,
) -> ApiResult {
    let button: MouseButton = q.button.as_deref().unwrap_or("left").parse()?;
    let clicks = match q.clicks {
        Some(c) if !c.trim().is_empty() => parse_int(Some(c), "clicks")?,
        _ => 1,
    };
    state.surface.mouse_click(button, clicks).await?;
    Ok(ok(json!({})))
}

pub async fn clipboard_set(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TextQuery>,
) -> ApiResult {
    let len = state
        .surface
        .set_clipboard(q.text.as_deref().unwrap_or_default())
        .await?;
    Ok(ok(json!({ "len": len })))
}

pub async fn keyboard_paste(State(state): State<Arc<AppState>>) -> ApiResult {
    state.surface.paste().await?;
    Ok(ok(json!({"action": "paste"})))
}

pub async fn keyboard_type(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TextQuery>,
) -> ApiResult {
    state
        .surface
        .type_text(q.text.as_deref().unwrap_or_default())
        .await?;
    Ok(ok(json!({})))
}

pub async fn keyboard_hotkey(
    State(state): State<Arc<AppState>>,
    Query(q): Query<KeysQuery>,
) -> ApiResult {
    let keys = state
        .surface
        .hotkey(q.keys.as_deref().unwrap_or_default())
        .await?;
    Ok(ok(json!({ "keys": keys })))
}

// ---------------------------------------------------------------------------
// Windows, screen, apps, browser
// ---------------------------------------------------------------------------

pub async fn window_activate(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TitleQuery>,
) -> ApiResult {
    let title = required(q.title, "title")?;
    let window = state.surface.activate_window(&title).await?;
    Ok(ok(json!({ "window": window })))
}

pub async fn window_click_center(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TitleQuery>,
) -> ApiResult {
    let title = required(q.title, "title")?;
    let click = state.surface.click_center(&title).await?;
    Ok(ok(json!({ "window": click.window, "x": click.x, "y": click.y })))
}

pub async fn screenshot(State(state): State<Arc<AppState>>) -> ApiResult {
    let shot = state.surface.screenshot().await?;
    Ok(ok(json!({ "path": shot.path, "url": shot.url })))
}

pub async fn app_run(
    State(state): State<Arc<AppState>>,
    Query(q): Query<NameQuery>,
) -> ApiResult {
    let name = required(q.name, "name")?;
    let launched = state.surface.run_app(&name).await?;
    Ok(ok(json!({ "launched": launched })))
}

pub async fn browser_open(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UrlQuery>,
) -> ApiResult {
    let url = required(q.url, "url")?;
    let opened = state.surface.open_url(&url).await?;
    Ok(ok(json!({ "opened": opened })))
}

pub async fn browser_script(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ScriptBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let results = state.surface.browser_script(&body.steps).await?;
    Ok(ok(json!({ "results": results })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_merges_fields() {
        let Json(body) = ok(json!({"len": 3}));
        assert_eq!(body, json!({"status": "ok", "ok": true, "len": 3}));
    }

    #[test]
    fn integers_are_validated() {
        assert_eq!(parse_int::<i32>(Some(" 12 ".into()), "x").unwrap(), 12);
        assert_eq!(
            parse_int::<i32>(Some("abc".into()), "x").unwrap_err().to_string(),
            "x must be an integer"
        );
        assert_eq!(
            parse_int::<i32>(None, "y").unwrap_err().to_string(),
            "y required"
        );
    }
}
