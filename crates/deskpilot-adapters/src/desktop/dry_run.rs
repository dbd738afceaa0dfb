//! Recording backend.
//!
//! Performs no OS side effects.  Every primitive is logged and appended to an
//! in-memory event list, which tests inspect and `deskpilot serve --dry-run`
//! prints through `tracing`.  Screen captures write a 1x1 placeholder PNG so
//! the capture path is real and servable.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::info;

use crate::error::{AdapterError, Result};
use crate::traits::{Desktop, MouseButton, WindowInfo};

/// Base64 of a transparent 1x1 PNG.
const PLACEHOLDER_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// One recorded side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesktopEvent {
    Typed(String),
    Hotkey(Vec<String>),
    Clipboard(String),
    Paste,
    MouseMove { x: i32, y: i32 },
    Click { button: MouseButton, clicks: u32 },
    Activated(String),
    Captured(PathBuf),
    Opened(String),
    Spawned(Vec<String>),
}

/// A [`Desktop`] that records instead of acting.
#[derive(Debug, Default)]
pub struct DryRunDesktop {
    windows: Mutex<Vec<WindowInfo>>,
    /// `None` means every executable is considered installed.
    executables: Option<BTreeSet<String>>,
    events: Mutex<Vec<DesktopEvent>>,
}

impl DryRunDesktop {
    /// Create a backend with no windows where every executable exists.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add windows with the given titles, laid out side by side.
    pub fn with_windows<I, S>(self, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut windows = lock(&self.windows);
            for title in titles {
                let n = windows.len() as i32;
                windows.push(WindowInfo {
                    id: format!("0x{:08x}", n + 1),
                    title: title.into(),
                    x: n * 400,
                    y: 0,
                    width: 400,
                    height: 300,
                });
            }
        }
        self
    }

    /// Restrict which executables are considered installed.
    pub fn with_executables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.executables = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Snapshot of every recorded event, oldest first.
    pub fn events(&self) -> Vec<DesktopEvent> {
        lock(&self.events).clone()
    }

    /// Number of recorded events.
    pub fn event_count(&self) -> usize {
        lock(&self.events).len()
    }

    fn record(&self, event: DesktopEvent) {
        info!(backend = "dry-run", ?event, "desktop action");
        lock(&self.events).push(event);
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Desktop for DryRunDesktop {
    fn backend_id(&self) -> &str {
        "dry-run"
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        self.record(DesktopEvent::Typed(text.to_owned()));
        Ok(())
    }

    async fn hotkey(&self, keys: &[String]) -> Result<()> {
        self.record(DesktopEvent::Hotkey(keys.to_vec()));
        Ok(())
    }

    async fn set_clipboard(&self, text: &str) -> Result<()> {
        self.record(DesktopEvent::Clipboard(text.to_owned()));
        Ok(())
    }

    async fn paste(&self) -> Result<()> {
        self.record(DesktopEvent::Paste);
        Ok(())
    }

    async fn mouse_move(&self, x: i32, y: i32) -> Result<()> {
        self.record(DesktopEvent::MouseMove { x, y });
        Ok(())
    }

    async fn mouse_click(&self, button: MouseButton, clicks: u32) -> Result<()> {
        self.record(DesktopEvent::Click { button, clicks });
        Ok(())
    }

    async fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        Ok(lock(&self.windows).clone())
    }

    async fn activate_window(&self, window: &WindowInfo) -> Result<()> {
        self.record(DesktopEvent::Activated(window.title.clone()));
        Ok(())
    }

    async fn capture_screen(&self, path: &Path) -> Result<()> {
        let bytes = STANDARD
            .decode(PLACEHOLDER_PNG)
            .map_err(|e| AdapterError::failed("capture", e.to_string()))?;
        tokio::fs::write(path, bytes).await?;
        self.record(DesktopEvent::Captured(path.to_path_buf()));
        Ok(())
    }

    async fn open_url(&self, url: &str) -> Result<()> {
        self.record(DesktopEvent::Opened(url.to_owned()));
        Ok(())
    }

    fn executable_exists(&self, exe: &str) -> bool {
        self.executables
            .as_ref()
            .is_none_or(|known| known.contains(exe))
    }

    async fn spawn(&self, command: &[String]) -> Result<()> {
        if command.is_empty() {
            return Err(AdapterError::validation("empty command"));
        }
        self.record(DesktopEvent::Spawned(command.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_events_in_order() {
        let desktop = DryRunDesktop::new();
        desktop.type_text("Bonjour").await.unwrap();
        desktop.paste().await.unwrap();
        desktop.open_url("https://mail.google.com/").await.unwrap();

        assert_eq!(
            desktop.events(),
            vec![
                DesktopEvent::Typed("Bonjour".into()),
                DesktopEvent::Paste,
                DesktopEvent::Opened("https://mail.google.com/".into()),
            ]
        );
    }

    #[tokio::test]
    async fn windows_are_listed_with_distinct_ids() {
        let desktop = DryRunDesktop::new().with_windows(["Notepad", "Google Chrome"]);
        let windows = desktop.list_windows().await.unwrap();
        assert_eq!(windows.len(), 2);
        assert_ne!(windows[0].id, windows[1].id);
        assert_eq!(windows[1].x, 400);
    }

    #[test]
    fn executables_default_to_present() {
        let open = DryRunDesktop::new();
        assert!(open.executable_exists("anything"));

        let restricted = DryRunDesktop::new().with_executables(["gedit"]);
        assert!(restricted.executable_exists("gedit"));
        assert!(!restricted.executable_exists("notepad.exe"));
    }

    #[tokio::test]
    async fn capture_writes_a_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        DryRunDesktop::new().capture_screen(&path).await.unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
    }
}
