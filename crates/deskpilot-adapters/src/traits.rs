//! The desktop backend seam.
//!
//! Every OS-level primitive DeskPilot needs goes through the [`Desktop`]
//! trait, so the action layer can run against a real X11 session or against
//! a recording backend in tests and `--dry-run` mode.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AdapterError, Result};

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// A top-level window as reported by the window manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    /// Backend-specific window identifier.
    pub id: String,
    /// Full window title.
    pub title: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl WindowInfo {
    /// Centre of the window in screen coordinates.
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Case-insensitive substring match on the title.
    pub fn title_contains(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(&needle.to_lowercase())
    }
}

/// A mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Middle,
    Right,
}

impl std::str::FromStr for MouseButton {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "left" => Ok(Self::Left),
            "middle" => Ok(Self::Middle),
            "right" => Ok(Self::Right),
            other => Err(AdapterError::validation(format!("unknown mouse button: {other}"))),
        }
    }
}

impl std::fmt::Display for MouseButton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Middle => write!(f, "middle"),
            Self::Right => write!(f, "right"),
        }
    }
}

// ---------------------------------------------------------------------------
// Core trait
// ---------------------------------------------------------------------------

/// OS primitives used by the action layer.
///
/// Implementations perform the side effect and nothing else: feature flags,
/// the panic switch and the allowlist are enforced by
/// [`crate::actions::ActionSurface`] before any of these is called.
#[async_trait]
pub trait Desktop: Send + Sync {
    /// Short backend name for logs (`x11`, `dry-run`).
    fn backend_id(&self) -> &str;

    /// Inject literal keystrokes into the focused window.
    async fn type_text(&self, text: &str) -> Result<()>;

    /// Press a key combination, e.g. `["ctrl", "v"]`.
    async fn hotkey(&self, keys: &[String]) -> Result<()>;

    /// Replace the clipboard content.
    async fn set_clipboard(&self, text: &str) -> Result<()>;

    /// Issue the paste keystroke.
    async fn paste(&self) -> Result<()> {
        self.hotkey(&["ctrl".to_owned(), "v".to_owned()]).await
    }

    /// Move the pointer to absolute screen coordinates.
    async fn mouse_move(&self, x: i32, y: i32) -> Result<()>;

    /// Click `clicks` times with `button` at the current pointer position.
    async fn mouse_click(&self, button: MouseButton, clicks: u32) -> Result<()>;

    /// List top-level windows.
    async fn list_windows(&self) -> Result<Vec<WindowInfo>>;

    /// Raise and focus a window.
    async fn activate_window(&self, window: &WindowInfo) -> Result<()>;

    /// Capture the full screen as a PNG at `path`.
    async fn capture_screen(&self, path: &Path) -> Result<()>;

    /// Open a URL in the default browser.
    async fn open_url(&self, url: &str) -> Result<()>;

    /// Whether `exe` resolves to an executable.
    fn executable_exists(&self, exe: &str) -> bool;

    /// Start a detached process.  Does not wait for it to exit.
    async fn spawn(&self, command: &[String]) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(title: &str) -> WindowInfo {
        WindowInfo {
            id: "0x1".into(),
            title: title.into(),
            x: 100,
            y: 50,
            width: 800,
            height: 600,
        }
    }

    #[test]
    fn center_is_midpoint() {
        assert_eq!(window("x").center(), (500, 350));
    }

    #[test]
    fn title_match_ignores_case() {
        let w = window("Sans titre - Bloc-notes");
        assert!(w.title_contains("bloc-NOTES"));
        assert!(!w.title_contains("Chrome"));
    }

    #[test]
    fn mouse_button_parsing() {
        assert_eq!("".parse::<MouseButton>().unwrap(), MouseButton::Left);
        assert_eq!("Right".parse::<MouseButton>().unwrap(), MouseButton::Right);
        assert!("fourth".parse::<MouseButton>().is_err());
    }
}
