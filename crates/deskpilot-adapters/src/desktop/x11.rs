//! X11 backend driven through the usual command-line tools.
//!
//! | primitive | tool |
//! |-----------|------|
//! | keystrokes, hotkeys, mouse | `xdotool` |
//! | window list / activation | `wmctrl` |
//! | clipboard | `xclip -selection clipboard` |
//! | screenshot | `scrot` |
//! | open URL | `xdg-open` |
//!
//! Each call runs under a timeout; a tool that hangs surfaces as
//! [`AdapterError::Timeout`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{AdapterError, Result};
use crate::traits::{Desktop, MouseButton, WindowInfo};

/// Default timeout for one external tool invocation.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Delay between injected keystrokes, in milliseconds.
const TYPE_DELAY_MS: u64 = 12;

/// X11 desktop backend.
#[derive(Debug, Clone)]
pub struct X11Desktop {
    timeout: Duration,
}

impl Default for X11Desktop {
    fn default() -> Self {
        Self::new()
    }
}

impl X11Desktop {
    /// Create a backend bound to the inherited `DISPLAY`.
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Run a tool to completion and return its stdout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        debug!(program, ?args, "running desktop tool");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AdapterError::failed(program, format!("failed to spawn: {e}")))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                warn!(program, "desktop tool timed out");
                AdapterError::Timeout {
                    millis: self.timeout.as_millis() as u64,
                    reason: format!("`{program}` did not finish"),
                }
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AdapterError::failed(
                program,
                format!(
                    "exit code {}: {}",
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                ),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Feed `input` to a tool and wait for its own exit only.
    ///
    /// `xclip` forks a child that keeps serving the selection; with piped
    /// output that child would hold the pipes open past the parent's exit.
    async fn run_feeding(&self, program: &str, args: &[&str], input: &str) -> Result<()> {
        debug!(program, ?args, "running desktop tool");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AdapterError::failed(program, format!("failed to spawn: {e}")))?;

        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(input.as_bytes()).await?;
            pipe.shutdown().await?;
        }

        let status = tokio::time::timeout(self.timeout, child.wait())
            .await
            .map_err(|_| {
                warn!(program, "desktop tool timed out");
                AdapterError::Timeout {
                    millis: self.timeout.as_millis() as u64,
                    reason: format!("`{program}` did not finish"),
                }
            })??;

        if !status.success() {
            return Err(AdapterError::failed(
                program,
                format!("exit code {}", status.code().unwrap_or(-1)),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Desktop for X11Desktop {
    fn backend_id(&self) -> &str {
        "x11"
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        let delay = TYPE_DELAY_MS.to_string();
        self.run("xdotool", &["type", "--delay", &delay, "--", text])
            .await
            .map(drop)
    }

    async fn hotkey(&self, keys: &[String]) -> Result<()> {
        let combo = keys
            .iter()
            .map(|k| xdotool_key(k))
            .collect::<Vec<_>>()
            .join("+");
        self.run("xdotool", &["key", "--clearmodifiers", &combo])
            .await
            .map(drop)
    }

    async fn set_clipboard(&self, text: &str) -> Result<()> {
        self.run_feeding("xclip", &["-selection", "clipboard", "-i"], text)
            .await
    }

    async fn mouse_move(&self, x: i32, y: i32) -> Result<()> {
        let (x, y) = (x.to_string(), y.to_string());
        self.run("xdotool", &["mousemove", &x, &y])
            .await
            .map(drop)
    }

    async fn mouse_click(&self, button: MouseButton, clicks: u32) -> Result<()> {
        let button = match button {
            MouseButton::Left => "1",
            MouseButton::Middle => "2",
            MouseButton::Right => "3",
        };
        let repeat = clicks.max(1).to_string();
        self.run("xdotool", &["click", "--repeat", &repeat, button])
            .await
            .map(drop)
    }

    async fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        let out = self.run("wmctrl", &["-l", "-G"]).await?;
        Ok(out.lines().filter_map(parse_wmctrl_line).collect())
    }

    async fn activate_window(&self, window: &WindowInfo) -> Result<()> {
        self.run("wmctrl", &["-i", "-a", &window.id])
            .await
            .map(drop)
    }

    async fn capture_screen(&self, path: &Path) -> Result<()> {
        let target = path.to_string_lossy();
        self.run("scrot", &["-o", &target]).await.map(drop)
    }

    async fn open_url(&self, url: &str) -> Result<()> {
        // xdg-open may block until the browser exits; spawn it detached.
        self.spawn(&["xdg-open".to_owned(), url.to_owned()]).await
    }

    fn executable_exists(&self, exe: &str) -> bool {
        which_exists(exe)
    }

    async fn spawn(&self, command: &[String]) -> Result<()> {
        let Some((program, args)) = command.split_first() else {
            return Err(AdapterError::validation("empty command"));
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = cmd
            .spawn()
            .map_err(|e| AdapterError::failed(program.as_str(), format!("failed to spawn: {e}")))?;
        info!(program = %program, pid = ?child.id(), "process launched");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse one line of `wmctrl -l -G` output.
///
/// Format: `<id> <desktop> <x> <y> <w> <h> <host> <title...>`.  The title may
/// contain any whitespace and is kept verbatim.
pub fn parse_wmctrl_line(line: &str) -> Option<WindowInfo> {
    let mut rest = line;
    let mut fields = Vec::with_capacity(7);
    for _ in 0..7 {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        if end == 0 {
            return None;
        }
        fields.push(&rest[..end]);
        rest = &rest[end..];
    }

    Some(WindowInfo {
        id: fields[0].to_owned(),
        x: fields[2].parse().ok()?,
        y: fields[3].parse().ok()?,
        width: fields[4].parse().ok()?,
        height: fields[5].parse().ok()?,
        title: rest.trim().to_owned(),
    })
}

/// Translate a key token into an X keysym understood by `xdotool`.
pub fn xdotool_key(key: &str) -> String {
    match key.trim().to_lowercase().as_str() {
        "enter" | "return" => "Return".into(),
        "tab" => "Tab".into(),
        "esc" | "escape" => "Escape".into(),
        "backspace" => "BackSpace".into(),
        "del" | "delete" => "Delete".into(),
        "space" => "space".into(),
        "up" => "Up".into(),
        "down" => "Down".into(),
        "left" => "Left".into(),
        "right" => "Right".into(),
        "home" => "Home".into(),
        "end" => "End".into(),
        "pageup" | "pgup" => "Prior".into(),
        "pagedown" | "pgdn" => "Next".into(),
        "win" | "super" | "cmd" | "meta" => "super".into(),
        "ctrl" | "control" => "ctrl".into(),
        "alt" => "alt".into(),
        "shift" => "shift".into(),
        other if other.len() > 1 && other.starts_with('f') && other[1..].parse::<u8>().is_ok() => {
            other.to_uppercase()
        }
        _ => key.trim().to_owned(),
    }
}

/// Check whether a command resolves to a file, either as a path or via `PATH`.
pub fn which_exists(name: &str) -> bool {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return candidate.is_file();
    }

    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths)
                .map(|dir| dir.join(name))
                .any(|p: PathBuf| p.is_file())
        })
        .unwrap_or(false)
}
