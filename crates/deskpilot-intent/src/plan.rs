//! Plan data model.

use deskpilot_adapters::BrowserStep;
use serde::{Deserialize, Serialize};

/// Pause inserted between consecutive clauses.
pub const CLAUSE_PAUSE_SECS: f64 = 0.4;

/// Pause after launching an application, before focusing it.
pub const LAUNCH_PAUSE_SECS: f64 = 0.8;

/// Pause after opening a known site.
pub const SITE_PAUSE_SECS: f64 = 1.0;

/// One primitive action.  Serialized with a `type` tag, e.g.
/// `{"type":"open","url":"https://example.com"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionStep {
    Open { url: String },
    Focus { title: String },
    /// Best-effort focus of an application's window.
    FocusBest { app: String, fallback: String },
    Type { text: String },
    /// `+`-separated key combination.
    Hotkey { keys: String },
    Sleep { sec: f64 },
    Screenshot,
    RunApp { name: String },
    BrowserScript { steps: Vec<BrowserStep> },
}

impl ActionStep {
    /// The `type` tag of this step.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::Focus { .. } => "focus",
            Self::FocusBest { .. } => "focus_best",
            Self::Type { .. } => "type",
            Self::Hotkey { .. } => "hotkey",
            Self::Sleep { .. } => "sleep",
            Self::Screenshot => "screenshot",
            Self::RunApp { .. } => "run_app",
            Self::BrowserScript { .. } => "browser_script",
        }
    }

    pub fn open(url: impl Into<String>) -> Self {
        Self::Open { url: url.into() }
    }

    pub fn focus(title: impl Into<String>) -> Self {
        Self::Focus {
            title: title.into(),
        }
    }

    pub fn type_text(text: impl Into<String>) -> Self {
        Self::Type { text: text.into() }
    }

    pub fn sleep(sec: f64) -> Self {
        Self::Sleep { sec }
    }
}

/// Ordered steps; insertion order is execution order.  Empty means no
/// intent was detected.
pub type Plan = Vec<ActionStep>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn steps_serialize_with_type_tag() {
        let plan: Plan = vec![
            ActionStep::FocusBest {
                app: "notepad".into(),
                fallback: "Notepad".into(),
            },
            ActionStep::Screenshot,
            ActionStep::sleep(0.4),
        ];
        assert_eq!(
            serde_json::to_value(&plan).unwrap(),
            json!([
                {"type": "focus_best", "app": "notepad", "fallback": "Notepad"},
                {"type": "screenshot"},
                {"type": "sleep", "sec": 0.4},
            ])
        );
    }

    #[test]
    fn browser_script_step_parses() {
        let step: ActionStep = serde_json::from_value(json!({
            "type": "browser_script",
            "steps": [{"type": "goto", "url": "https://example.com"}]
        }))
        .unwrap();
        let ActionStep::BrowserScript { steps } = &step else {
            panic!("wrong variant: {step:?}");
        };
        assert_eq!(steps[0].timeout_ms, 10_000);
        assert_eq!(step.kind(), "browser_script");
    }
}
