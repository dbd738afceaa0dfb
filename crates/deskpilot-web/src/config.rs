//! Service configuration.
//!
//! Loaded from a TOML file, then overridden from the environment:
//!
//! | variable | effect |
//! |----------|--------|
//! | `DESKPILOT_CONFIG` | config file path (falls back to `./config.toml`) |
//! | `DESKPILOT_TOKEN` | shared-secret token |
//! | `DESKPILOT_FEATURE_<NAME>` | feature flag, `1/true/yes/on` or `0/false/no/off` |
//! | `OPENAI_API_KEY` | model provider key |
//! | `OPENAI_BASE` | model provider base URL |
//! | `OPENAI_MODEL` | model name |

use std::path::{Path, PathBuf};

use deskpilot_adapters::browser::DEFAULT_DEBUG_PORT;
use deskpilot_adapters::{Allowlist, FeatureFlags};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, WebError};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8730;
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_MAX_TURNS: u32 = 16;

pub const CONFIG_ENV: &str = "DESKPILOT_CONFIG";
pub const TOKEN_ENV: &str = "DESKPILOT_TOKEN";
pub const FEATURE_ENV_PREFIX: &str = "DESKPILOT_FEATURE_";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    /// Required as `?token=` on protected routes when non-empty.
    #[serde(skip_serializing)]
    pub token: String,
    /// Start with the panic switch engaged.
    pub disabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSection {
    pub allowlist: Allowlist,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSection {
    pub debug_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<String>,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            debug_port: DEFAULT_DEBUG_PORT,
            chrome_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// Only ever read from `OPENAI_API_KEY`.
    #[serde(skip)]
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_turns: u32,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: deskpilot_agent::llm::client::DEFAULT_MODEL.into(),
            base_url: deskpilot_agent::llm::client::OPENAI_BASE_URL.into(),
            max_turns: DEFAULT_MAX_TURNS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub shots_dir: PathBuf,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            shots_dir: PathBuf::from("shots"),
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskPilotConfig {
    pub server: ServerSection,
    pub security: SecuritySection,
    pub features: FeatureFlags,
    pub run: RunSection,
    pub browser: BrowserSection,
    pub llm: LlmSection,
    pub paths: PathsSection,
}

impl DeskPilotConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str, path: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|e| WebError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| WebError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text, path)
    }

    /// The token, if one is configured.
    pub fn token(&self) -> Option<&str> {
        let token = self.security.token.trim();
        (!token.is_empty()).then_some(token)
    }

    /// Apply environment overrides from `vars`.
    ///
    /// Feature values that are not a recognized boolean are ignored with a
    /// warning.  Feature names not known to the service are kept.
    pub fn apply_env<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let (key, value) = (key.as_ref(), value.as_ref().trim());
            match key {
                TOKEN_ENV if !value.is_empty() => self.security.token = value.to_owned(),
                "OPENAI_API_KEY" => self.llm.api_key = value.to_owned(),
                "OPENAI_BASE" if !value.is_empty() => self.llm.base_url = value.to_owned(),
                "OPENAI_MODEL" if !value.is_empty() => self.llm.model = value.to_owned(),
                _ => {
                    let Some(name) = key.strip_prefix(FEATURE_ENV_PREFIX) else {
                        continue;
                    };
                    if name.is_empty() {
                        continue;
                    }
                    match parse_flag(value) {
                        Some(enabled) => self.features.set(name.to_lowercase(), enabled),
                        None => warn!(variable = key, value, "ignoring unrecognized feature value"),
                    }
                }
            }
        }
    }
}

/// `1/true/yes/on` or `0/false/no/off`, case-insensitive.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Pick the config path from the `DESKPILOT_CONFIG` value.
///
/// Returns the path and, when the variable points at a missing file, a
/// warning to report.
pub fn resolve_config_path(env_value: Option<&str>, default: &Path) -> (PathBuf, Option<String>) {
    match env_value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(candidate) if Path::new(candidate).is_file() => (PathBuf::from(candidate), None),
        Some(candidate) => (
            default.to_path_buf(),
            Some(format!(
                "{CONFIG_ENV}={candidate} does not exist, using {}",
                default.display()
            )),
        ),
        None => (default.to_path_buf(), None),
    }
}

/// A configuration together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: DeskPilotConfig,
    pub path: PathBuf,
}

/// Load the configuration for this process.
///
/// An explicit path must exist.  Otherwise the path is resolved from
/// `DESKPILOT_CONFIG` and `./config.toml`; when neither exists the defaults
/// are used.  Environment overrides are applied last.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let env_value = std::env::var(CONFIG_ENV).ok();
            let (path, warning) =
                resolve_config_path(env_value.as_deref(), Path::new(DEFAULT_CONFIG_FILE));
            if let Some(warning) = warning {
                warn!("{warning}");
            }
            path
        }
    };

    let mut config = if explicit.is_some() || path.is_file() {
        DeskPilotConfig::load(&path)?
    } else {
        warn!(path = %path.display(), "config file not found, using defaults");
        DeskPilotConfig::default()
    };
    config.apply_env(std::env::vars());

    info!(
        path = %path.display(),
        apps = config.run.allowlist.keys().len(),
        token = config.token().is_some(),
        "configuration loaded"
    );
    Ok(LoadedConfig { config, path })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_document_parses() {
        let text = r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [security]
            token = "s3cret"
            disabled = true

            [features]
            mouse = false
            browser_script = true

            [run.allowlist]
            notepad = "gedit"
            vscode = ["code", "--new-window"]

            [browser]
            debug_port = 9333
            chrome_path = "/usr/bin/chromium"

            [llm]
            model = "gpt-4.1-mini"
            max_turns = 4

            [paths]
            shots_dir = "/tmp/shots"
        "#;
        let config = DeskPilotConfig::from_toml_str(text, Path::new("t.toml")).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.token(), Some("s3cret"));
        assert!(config.security.disabled);
        assert_eq!(config.run.allowlist.get("notepad"), Some(&["gedit".to_owned()][..]));
        assert_eq!(config.run.allowlist.keys(), vec!["notepad", "vscode"]);
        assert_eq!(config.browser.debug_port, 9333);
        assert_eq!(config.llm.max_turns, 4);
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
        assert_eq!(config.paths.shots_dir, PathBuf::from("/tmp/shots"));
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = DeskPilotConfig::from_toml_str("", Path::new("t.toml")).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8730);
        assert_eq!(config.token(), None);
        assert_eq!(config.llm.max_turns, 16);
        assert!(config.run.allowlist.is_empty());
    }

    #[test]
    fn invalid_document_names_the_file() {
        let err = DeskPilotConfig::from_toml_str("[server\n", Path::new("bad.toml")).unwrap_err();
        assert!(err.to_string().starts_with("config bad.toml:"));
    }

    #[test]
    fn env_overrides() {
        let mut config = DeskPilotConfig::default();
        config.features.set("mouse", true);
        config.apply_env([
            ("DESKPILOT_FEATURE_MOUSE", "0"),
            ("DESKPILOT_FEATURE_CUSTOM", "yes"),
            ("DESKPILOT_FEATURE_KEYBOARD", "maybe"),
            ("DESKPILOT_TOKEN", " tok "),
            ("OPENAI_MODEL", "gpt-x"),
            ("OPENAI_BASE", ""),
            ("PATH", "/usr/bin"),
        ]);

        let features = config.features.effective();
        assert_eq!(features["mouse"], false);
        assert_eq!(features["custom"], true);
        assert_eq!(features["keyboard"], true);
        assert_eq!(config.token(), Some("tok"));
        assert_eq!(config.llm.model, "gpt-x");
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn config_path_prefers_existing_env_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("custom.toml");
        std::fs::write(&file, "").unwrap();
        let default = Path::new("config.toml");

        let (path, warning) = resolve_config_path(file.to_str(), default);
        assert_eq!(path, file);
        assert!(warning.is_none());

        let (path, warning) = resolve_config_path(Some("missing.toml"), default);
        assert_eq!(path, default);
        assert!(warning.unwrap().contains("missing.toml"));

        let (path, warning) = resolve_config_path(None, default);
        assert_eq!(path, default);
        assert!(warning.is_none());
    }

    #[test]
    fn flag_parsing() {
        assert_eq!(parse_flag("ON"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("2"), None);
    }
}
