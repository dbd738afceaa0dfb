//! Plan executor.
//!
//! Runs a [`Plan`] one step at a time against the [`ActionSurface`].  Each
//! step produces one result record; the first failure appends
//! `{ok: false, error, step}` and stops the run.

use std::sync::Arc;
use std::time::Duration;

use deskpilot_adapters::{ActionSurface, AdapterError};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::plan::ActionStep;

/// Longest pause a plan step may request, in seconds.
pub const MAX_STEP_SLEEP_SECS: f64 = 5.0;

/// Result of running a plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlanOutcome {
    /// One record per attempted step, in order.
    pub results: Vec<Value>,
    /// Index of the step that failed, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<usize>,
}

impl PlanOutcome {
    /// Whether every step succeeded.
    pub fn ok(&self) -> bool {
        self.failed_step.is_none()
    }

    /// The error of the failed step, if any.
    pub fn error(&self) -> Option<&str> {
        self.failed_step
            .and_then(|i| self.results.get(i))
            .and_then(|r| r.get("error"))
            .and_then(Value::as_str)
    }
}

/// Sequential executor over the action surface.
#[derive(Debug, Clone)]
pub struct PlanExecutor {
    surface: Arc<ActionSurface>,
}

impl PlanExecutor {
    pub fn new(surface: Arc<ActionSurface>) -> Self {
        Self { surface }
    }

    /// Run `plan` in order, halting at the first failing step.
    pub async fn execute(&self, plan: &[ActionStep]) -> PlanOutcome {
        let mut results = Vec::with_capacity(plan.len());

        for (index, step) in plan.iter().enumerate() {
            match self.run_step(step).await {
                Ok(record) => {
                    info!(step = index, kind = step.kind(), status = "ok", "run_step_done");
                    results.push(record);
                }
                Err(e) => {
                    warn!(step = index, kind = step.kind(), error = %e, "run_step_error");
                    results.push(json!({
                        "ok": false,
                        "error": e.to_string(),
                        "step": step,
                    }));
                    return PlanOutcome {
                        results,
                        failed_step: Some(index),
                    };
                }
            }
        }

        PlanOutcome {
            results,
            failed_step: None,
        }
    }

    async fn run_step(&self, step: &ActionStep) -> Result<Value, AdapterError> {
        let surface = &self.surface;
        let record = match step {
            ActionStep::Open { url } => {
                let opened = surface.open_url(url).await?;
                json!({"ok": true, "opened": opened})
            }
            ActionStep::Focus { title } => {
                let window = surface.activate_window(title).await?;
                json!({"ok": true, "window": window})
            }
            ActionStep::FocusBest { app, fallback } => {
                let window = surface.focus_best(app, fallback).await?;
                json!({"ok": true, "window": window})
            }
            ActionStep::Type { text } => {
                surface.type_text(text).await?;
                json!({"ok": true})
            }
            ActionStep::Hotkey { keys } => {
                let keys = surface.hotkey(keys).await?;
                json!({"ok": true, "keys": keys})
            }
            ActionStep::Sleep { sec } => {
                let sec = if sec.is_finite() {
                    sec.clamp(0.0, MAX_STEP_SLEEP_SECS)
                } else {
                    0.0
                };
                surface.panic_switch().ensure_released()?;
                tokio::time::sleep(Duration::from_secs_f64(sec)).await;
                json!({"ok": true, "slept": sec})
            }
            ActionStep::Screenshot => {
                let shot = surface.screenshot().await?;
                json!({"ok": true, "status": "ok", "path": shot.path, "url": shot.url})
            }
            ActionStep::RunApp { name } => {
                let launched = surface.run_app(name).await?;
                json!({"ok": true, "launched": launched})
            }
            ActionStep::BrowserScript { steps } => {
                let results = surface.browser_script(steps).await?;
                json!({"ok": true, "results": results})
            }
        };
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskpilot_adapters::{Allowlist, DesktopEvent, DryRunDesktop};

    fn executor(desktop: Arc<DryRunDesktop>) -> PlanExecutor {
        let surface = ActionSurface::new(desktop)
            .with_allowlist(Allowlist::new([("notepad", vec!["gedit".to_owned()])]));
        PlanExecutor::new(Arc::new(surface))
    }

    #[tokio::test(start_paused = true)]
    async fn runs_every_step_in_order() {
        let desktop = Arc::new(DryRunDesktop::new().with_windows(["Untitled - gedit"]));
        let plan = vec![
            ActionStep::RunApp {
                name: "notepad".into(),
            },
            ActionStep::sleep(0.8),
            ActionStep::FocusBest {
                app: "notepad".into(),
                fallback: "notepad".into(),
            },
            ActionStep::Hotkey {
                keys: "ctrl+a".into(),
            },
        ];

        let outcome = executor(desktop.clone()).execute(&plan).await;
        assert!(outcome.ok());
        assert_eq!(outcome.results.len(), 4);
        assert_eq!(outcome.results[0]["launched"], json!(["gedit"]));
        assert_eq!(outcome.results[2]["window"], "Untitled - gedit");
        assert_eq!(
            desktop.events(),
            vec![
                DesktopEvent::Spawned(vec!["gedit".into()]),
                DesktopEvent::Activated("Untitled - gedit".into()),
                DesktopEvent::Hotkey(vec!["ctrl".into(), "a".into()]),
            ]
        );
    }

    #[tokio::test]
    async fn stops_at_first_failure() {
        let desktop = Arc::new(DryRunDesktop::new());
        let plan = vec![
            ActionStep::type_text("a"),
            ActionStep::focus("Nowhere"),
            ActionStep::type_text("b"),
        ];

        let outcome = executor(desktop.clone()).execute(&plan).await;
        assert!(!outcome.ok());
        assert_eq!(outcome.failed_step, Some(1));
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.error(), Some("window not found"));
        assert_eq!(
            outcome.results[1]["step"],
            json!({"type": "focus", "title": "Nowhere"})
        );
        assert_eq!(desktop.events(), vec![DesktopEvent::Typed("a".into())]);
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_is_clamped() {
        let desktop = Arc::new(DryRunDesktop::new());
        let outcome = executor(desktop)
            .execute(&[ActionStep::sleep(-1.0), ActionStep::sleep(60.0)])
            .await;
        assert_eq!(outcome.results[0]["slept"], 0.0);
        assert_eq!(outcome.results[1]["slept"], 5.0);
    }
}
