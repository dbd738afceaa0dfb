//! Command endpoints: the deterministic planner and the LLM loop.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use deskpilot_adapters::ActionTools;
use deskpilot_adapters::prompt::{system_prompt, with_site_hint};
use deskpilot_agent::{
    AgentConfig, AgentContext, LlmClient, LlmClientConfig, ToolAdapter, run_tool_loop,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::ApiError;
use crate::state::AppState;

/// Temperature used for the tool loop.
const LLM_TEMPERATURE: f32 = 0.2;

/// Body of `/agent/command` and `/agent/llm`.
#[derive(Debug, Deserialize)]
pub struct CommandBody {
    pub text: String,
}

/// `POST /agent/command` -- interpret the text and run the resulting plan.
pub async fn command(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CommandBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    state.panic_switch().ensure_released()?;
    let Json(body) = body?;
    tracing::info!(text = %body.text, "agent_command");

    let plan = state.interpreter.interpret(&body.text);
    if plan.is_empty() {
        tracing::info!(text = %body.text, "no_intent_detected");
        return Ok(Json(json!({"ok": false, "reason": "no_intent_detected"})));
    }

    let outcome = state.executor.execute(&plan).await;
    tracing::info!(
        steps = plan.len(),
        executed = outcome.results.len(),
        failed_step = ?outcome.failed_step,
        "plan_executed"
    );

    Ok(Json(json!({
        "ok": outcome.ok(),
        "plan": plan,
        "results": outcome.results,
    })))
}

/// `POST /agent/llm` -- hand the text to the tool-calling loop.
pub async fn llm(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CommandBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    state.panic_switch().ensure_released()?;
    let Json(body) = body?;
    tracing::info!(text = %body.text, "agent_llm_request");

    let settings = &state.config.llm;
    let client = LlmClient::new(
        LlmClientConfig::openai(settings.api_key.as_str(), settings.model.as_str())
            .with_base_url(settings.base_url.as_str()),
    )?;

    let mut tools = ActionTools::new(state.local_url());
    if let Some(token) = state.token() {
        tools = tools.with_token(token);
    }
    let adapters: Vec<Arc<dyn ToolAdapter>> = vec![Arc::new(tools)];

    let config = AgentConfig {
        max_turns: settings.max_turns,
        model: settings.model.clone(),
        temperature: Some(LLM_TEMPERATURE),
    };
    let mut ctx = AgentContext::new(Arc::new(client), adapters, config)
        .with_system_prompt(system_prompt(&state.surface.allowlist().keys()))
        .with_user_message(with_site_hint(&body.text));

    let response = match run_tool_loop(&mut ctx).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(task_id = %ctx.task_id, error = %e, "agent_llm_result");
            return Err(e.into());
        }
    };

    tracing::info!(
        task_id = %response.task_id,
        turns = response.turns_used,
        tool_calls = response.tool_calls,
        "agent_llm_result"
    );

    Ok(Json(json!({
        "ok": true,
        "final": response.text,
        "turns": response.turns_used,
        "tool_calls": response.tool_calls,
        "task_id": response.task_id.to_string(),
    })))
}
