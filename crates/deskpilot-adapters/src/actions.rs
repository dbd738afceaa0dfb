//! The checked action surface.
//!
//! [`ActionSurface`] is the one entry point to the desktop.  Every method
//! checks the panic switch first, then its feature flag, then validates its
//! arguments, and only then touches the [`Desktop`] backend.  The HTTP
//! endpoints and the plan executor both go through it, so neither can skip a
//! check.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::apps::{Allowlist, DEFAULT_FOCUS, Feature, FeatureFlags, window_titles};
use crate::browser::{BrowserDriver, BrowserStep};
use crate::error::{AdapterError, Result};
use crate::killswitch::PanicSwitch;
use crate::traits::{Desktop, MouseButton, WindowInfo};

/// File name of full-screen captures inside the shots directory.
pub const SCREENSHOT_NAME: &str = "shot.png";

/// A capture written by [`ActionSurface::screenshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Screenshot {
    pub path: String,
    /// Route that serves the file, e.g. `/shots/shot.png`.
    pub url: String,
}

/// Result of [`ActionSurface::click_center`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowClick {
    pub window: String,
    pub x: i32,
    pub y: i32,
}

pub struct ActionSurface {
    desktop: Arc<dyn Desktop>,
    browser: BrowserDriver,
    features: FeatureFlags,
    allowlist: Allowlist,
    panic: Arc<PanicSwitch>,
    shots_dir: PathBuf,
}

impl std::fmt::Debug for ActionSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionSurface")
            .field("backend", &self.desktop.backend_id())
            .field("features", &self.features)
            .field("allowlist", &self.allowlist.keys())
            .field("disabled", &self.panic.is_engaged())
            .field("shots_dir", &self.shots_dir)
            .finish()
    }
}

impl ActionSurface {
    /// A surface over `desktop` with default features, an empty allowlist
    /// and captures written to `./shots`.
    pub fn new(desktop: Arc<dyn Desktop>) -> Self {
        Self {
            desktop,
            browser: BrowserDriver::default(),
            features: FeatureFlags::default(),
            allowlist: Allowlist::default(),
            panic: Arc::new(PanicSwitch::default()),
            shots_dir: PathBuf::from("shots"),
        }
    }

    pub fn with_features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    pub fn with_allowlist(mut self, allowlist: Allowlist) -> Self {
        self.allowlist = allowlist;
        self
    }

    /// Share a panic switch with other holders (the HTTP control endpoints).
    pub fn with_panic_switch(mut self, panic: Arc<PanicSwitch>) -> Self {
        self.panic = panic;
        self
    }

    pub fn with_browser(mut self, browser: BrowserDriver) -> Self {
        self.browser = browser;
        self
    }

    pub fn with_shots_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shots_dir = dir.into();
        self
    }

    pub fn features(&self) -> &FeatureFlags {
        &self.features
    }

    pub fn allowlist(&self) -> &Allowlist {
        &self.allowlist
    }

    pub fn panic_switch(&self) -> &Arc<PanicSwitch> {
        &self.panic
    }

    pub fn shots_dir(&self) -> &Path {
        &self.shots_dir
    }

    pub fn backend_id(&self) -> &str {
        self.desktop.backend_id()
    }

    // -----------------------------------------------------------------------
    // Checks
    // -----------------------------------------------------------------------

    fn guard(&self, feature: Option<Feature>) -> Result<()> {
        self.panic.ensure_released()?;
        match feature {
            Some(feature) if !self.features.is_enabled(feature) => {
                Err(AdapterError::FeatureDisabled {
                    feature: feature.as_str().to_owned(),
                })
            }
            _ => Ok(()),
        }
    }

    async fn find_window(&self, title: &str) -> Result<WindowInfo> {
        self.desktop
            .list_windows()
            .await?
            .into_iter()
            .find(|w| w.title_contains(title))
            .ok_or_else(|| AdapterError::WindowNotFound {
                title: title.to_owned(),
            })
    }

    // -----------------------------------------------------------------------
    // Mouse
    // -----------------------------------------------------------------------

    pub async fn mouse_move(&self, x: i32, y: i32) -> Result<()> {
        self.guard(Some(Feature::Mouse))?;
        self.desktop.mouse_move(x, y).await
    }

    pub async fn mouse_click(&self, button: MouseButton, clicks: u32) -> Result<()> {
        self.guard(Some(Feature::Mouse))?;
        self.desktop.mouse_click(button, clicks.max(1)).await
    }

    // -----------------------------------------------------------------------
    // Keyboard and clipboard
    // -----------------------------------------------------------------------

    /// Put `text` on the clipboard; returns its length in characters.
    pub async fn set_clipboard(&self, text: &str) -> Result<usize> {
        self.guard(None)?;
        self.desktop.set_clipboard(text).await?;
        Ok(text.chars().count())
    }

    /// Issue the platform paste keystroke.
    pub async fn paste(&self) -> Result<()> {
        self.guard(Some(Feature::Keyboard))?;
        self.desktop.paste().await
    }

    pub async fn type_text(&self, text: &str) -> Result<()> {
        self.guard(Some(Feature::Keyboard))?;
        self.desktop.type_text(text).await
    }

    /// Press a `+`-separated key combination; returns the keys pressed.
    pub async fn hotkey(&self, combo: &str) -> Result<Vec<String>> {
        self.guard(Some(Feature::Keyboard))?;
        let keys = split_hotkey(combo);
        if keys.is_empty() {
            return Err(AdapterError::validation("keys required"));
        }
        self.desktop.hotkey(&keys).await?;
        Ok(keys)
    }

    // -----------------------------------------------------------------------
    // Windows
    // -----------------------------------------------------------------------

    /// Activate the first window whose title contains `title`
    /// (case-insensitive) and return its full title.
    pub async fn activate_window(&self, title: &str) -> Result<String> {
        self.guard(Some(Feature::Window))?;
        let window = self.find_window(title).await?;
        self.desktop.activate_window(&window).await?;
        debug!(window = %window.title, "window activated");
        Ok(window.title)
    }

    /// Activate a window and click its centre.
    pub async fn click_center(&self, title: &str) -> Result<WindowClick> {
        self.guard(Some(Feature::Window))?;
        self.guard(Some(Feature::Mouse))?;
        let window = self.find_window(title).await?;
        self.desktop.activate_window(&window).await?;
        let (x, y) = window.center();
        self.desktop.mouse_move(x, y).await?;
        self.desktop.mouse_click(MouseButton::Left, 1).await?;
        Ok(WindowClick {
            window: window.title,
            x,
            y,
        })
    }

    /// Best-effort activation of an application's window.
    ///
    /// Tries the curated titles for `app`, then `fallback`, then
    /// [`DEFAULT_FOCUS`].  Blank titles and titles already tried
    /// (case-insensitive) are skipped.  Window titles are listed once.
    pub async fn focus_best(&self, app: &str, fallback: &str) -> Result<String> {
        self.guard(Some(Feature::Window))?;
        let windows = self.desktop.list_windows().await?;

        let mut tried: Vec<String> = Vec::new();
        let candidates = window_titles(app)
            .iter()
            .copied()
            .chain([fallback, DEFAULT_FOCUS]);
        for candidate in candidates {
            let candidate = candidate.trim();
            let key = candidate.to_lowercase();
            if candidate.is_empty() || tried.contains(&key) {
                continue;
            }
            tried.push(key);

            if let Some(window) = windows.iter().find(|w| w.title_contains(candidate)) {
                self.desktop.activate_window(window).await?;
                debug!(app, candidate, window = %window.title, "focus_best matched");
                return Ok(window.title.clone());
            }
        }

        Err(AdapterError::WindowNotFound {
            title: DEFAULT_FOCUS.to_owned(),
        })
    }

    // -----------------------------------------------------------------------
    // Screen
    // -----------------------------------------------------------------------

    /// Capture the full screen to `<shots_dir>/shot.png`.
    pub async fn screenshot(&self) -> Result<Screenshot> {
        self.guard(Some(Feature::Screenshot))?;
        tokio::fs::create_dir_all(&self.shots_dir).await?;
        let path = self.shots_dir.join(SCREENSHOT_NAME);
        self.desktop.capture_screen(&path).await?;
        Ok(Screenshot {
            path: path.to_string_lossy().into_owned(),
            url: format!("/shots/{SCREENSHOT_NAME}"),
        })
    }

    // -----------------------------------------------------------------------
    // Apps and browser
    // -----------------------------------------------------------------------

    /// Launch an allowlisted application by key; returns the argv launched.
    ///
    /// The key is matched exactly.  Alias resolution belongs to the callers
    /// that accept spoken names.
    pub async fn run_app(&self, name: &str) -> Result<Vec<String>> {
        self.guard(Some(Feature::RunApps))?;
        let command = self
            .allowlist
            .get(name)
            .ok_or_else(|| AdapterError::NotAllowed {
                name: name.to_owned(),
            })?;
        let exe = &command[0];
        if !self.desktop.executable_exists(exe) {
            return Err(AdapterError::ExecutableNotFound { exe: exe.clone() });
        }
        self.desktop.spawn(command).await?;
        info!(app = name, command = ?command, "application launched");
        Ok(command.to_vec())
    }

    /// Open a URL in the default browser; `https://` is added when the URL
    /// does not start with `http`.  Returns the URL opened.
    pub async fn open_url(&self, url: &str) -> Result<String> {
        self.guard(Some(Feature::BrowserOpen))?;
        let url = url.trim();
        if url.is_empty() {
            return Err(AdapterError::validation("url required"));
        }
        let url = normalize_url(url);
        self.desktop.open_url(&url).await?;
        Ok(url)
    }

    /// Run a CDP browser sub-script.
    pub async fn browser_script(&self, steps: &[BrowserStep]) -> Result<Vec<Value>> {
        self.guard(Some(Feature::BrowserScript))?;
        self.browser.run_script(steps, &self.shots_dir).await
    }
}

/// Split a `ctrl+shift+t` combination into trimmed, non-empty keys.
pub fn split_hotkey(combo: &str) -> Vec<String> {
    combo
        .split('+')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Prefix `https://` unless the URL already starts with `http`.
pub fn normalize_url(url: &str) -> String {
    if url.starts_with("http") {
        url.to_owned()
    } else {
        format!("https://{url}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::{DesktopEvent, DryRunDesktop};

    fn surface(desktop: Arc<DryRunDesktop>) -> ActionSurface {
        ActionSurface::new(desktop)
    }

    #[test]
    fn hotkey_split_drops_blanks() {
        assert_eq!(split_hotkey(" ctrl + + s "), vec!["ctrl", "s"]);
        assert!(split_hotkey("+").is_empty());
    }

    #[test]
    fn url_scheme_is_added_once() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url("http://x.test"), "http://x.test");
    }

    #[tokio::test]
    async fn clipboard_length_counts_chars() {
        let desktop = Arc::new(DryRunDesktop::new());
        let len = surface(desktop.clone()).set_clipboard("héllo").await.unwrap();
        assert_eq!(len, 5);
        assert_eq!(desktop.events(), vec![DesktopEvent::Clipboard("héllo".into())]);
    }

    #[tokio::test]
    async fn disabled_feature_is_named() {
        let desktop = Arc::new(DryRunDesktop::new());
        let mut features = FeatureFlags::default();
        features.set("keyboard", false);
        let err = surface(desktop.clone())
            .with_features(features)
            .type_text("x")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "keyboard disabled");
        assert_eq!(desktop.event_count(), 0);
    }

    #[tokio::test]
    async fn focus_best_prefers_curated_titles() {
        let desktop =
            Arc::new(DryRunDesktop::new().with_windows(["Google Chrome", "Sans titre - Bloc-notes"]));
        let title = surface(desktop.clone())
            .focus_best("notepad", "notepad")
            .await
            .unwrap();
        assert_eq!(title, "Sans titre - Bloc-notes");
    }

    #[tokio::test]
    async fn focus_best_falls_back_to_chrome() {
        let desktop = Arc::new(DryRunDesktop::new().with_windows(["Google Chrome"]));
        let title = surface(desktop.clone())
            .focus_best("unknown", "whatever")
            .await
            .unwrap();
        assert_eq!(title, "Google Chrome");
    }

    #[tokio::test]
    async fn focus_best_without_any_window_fails() {
        let desktop = Arc::new(DryRunDesktop::new().with_windows(["Terminal"]));
        let err = surface(desktop).focus_best("notepad", "").await.unwrap_err();
        assert!(matches!(err, AdapterError::WindowNotFound { .. }));
    }

    #[tokio::test]
    async fn run_app_requires_executable() {
        let desktop = Arc::new(DryRunDesktop::new().with_executables(["gedit"]));
        let allowlist = Allowlist::new([("vscode", vec!["code".to_owned()])]);
        let err = surface(desktop.clone())
            .with_allowlist(allowlist)
            .run_app("vscode")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "not found: code");
        assert_eq!(desktop.event_count(), 0);
    }
}
