//! Application and site tables shared by both planners.
//!
//! - aliases that map spoken application names onto allowlist keys,
//! - window-title variants tried when focusing an application,
//! - curated sites that both planners open by URL,
//! - the [`Allowlist`] and [`FeatureFlags`] loaded from configuration.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Window title tried last when focusing, and focused before opening URLs.
pub const DEFAULT_FOCUS: &str = "Chrome";

// ---------------------------------------------------------------------------
// Aliases and titles
// ---------------------------------------------------------------------------

const APP_ALIASES: &[(&str, &str)] = &[
    ("notepad", "notepad"),
    ("bloc-notes", "notepad"),
    ("bloc notes", "notepad"),
    ("chrome", "chrome"),
    ("google chrome", "chrome"),
    ("vscode", "vscode"),
    ("vs code", "vscode"),
    ("code", "vscode"),
    ("word", "word"),
    ("microsoft word", "word"),
    ("excel", "excel"),
    ("microsoft excel", "excel"),
];

const WINDOW_TITLES: &[(&str, &[&str])] = &[
    ("notepad", &["Bloc-notes", "Notepad", "Sans titre", "Untitled"]),
    ("chrome", &["Google Chrome", "Chromium"]),
    ("vscode", &["Visual Studio Code"]),
    ("word", &["Word", "LibreOffice Writer"]),
    ("excel", &["Excel", "LibreOffice Calc"]),
];

const KNOWN_SITES: &[(&str, &str)] = &[
    ("coinbase", "https://www.coinbase.com/signin"),
    ("gmail", "https://mail.google.com/"),
    ("youtube", "https://www.youtube.com/"),
    ("linkedin", "https://www.linkedin.com/login"),
    ("tradingview", "https://www.tradingview.com/"),
];

/// Normalize an application name and map it through the alias table.
///
/// The name is trimmed, lower-cased and its inner whitespace collapsed.
/// Unknown names pass through in normalized form; the allowlist decides
/// later whether they may run.
pub fn resolve_app(name: &str) -> String {
    let key = name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    APP_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, canonical)| (*canonical).to_owned())
        .unwrap_or(key)
}

/// Known window-title variants for an application key.
pub fn window_titles(app_key: &str) -> &'static [&'static str] {
    let key = app_key.to_lowercase();
    WINDOW_TITLES
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, titles)| *titles)
        .unwrap_or(&[])
}

/// URL of a curated site keyword, if it is one.
pub fn known_site(keyword: &str) -> Option<&'static str> {
    let key = keyword.trim().to_lowercase();
    KNOWN_SITES
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, url)| *url)
}

/// All curated site keywords.
pub fn known_site_keywords() -> impl Iterator<Item = &'static str> {
    KNOWN_SITES.iter().map(|(k, _)| *k)
}

// ---------------------------------------------------------------------------
// Allowlist
// ---------------------------------------------------------------------------

/// Applications that may be launched, keyed by allowlist key.
///
/// In TOML each entry is either a command string or an argv array:
///
/// ```toml
/// [run.allowlist]
/// notepad = "gedit"
/// vscode = ["code", "--new-window"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Allowlist(BTreeMap<String, Vec<String>>);

impl Allowlist {
    /// Build an allowlist from `(key, argv)` pairs.
    pub fn new<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<String>)>,
        K: Into<String>,
    {
        Self(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .filter(|(_, v)| !v.is_empty())
                .collect(),
        )
    }

    /// The launch command for `key`.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    /// Sorted allowlist keys.
    pub fn keys(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LaunchCommand {
    One(String),
    Many(Vec<String>),
}

impl<'de> Deserialize<'de> for Allowlist {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, LaunchCommand>::deserialize(deserializer)?;
        let mut entries = BTreeMap::new();
        for (key, command) in raw {
            let argv = match command {
                LaunchCommand::One(cmd) => vec![cmd],
                LaunchCommand::Many(argv) => argv,
            };
            if argv.first().is_none_or(|exe| exe.trim().is_empty()) {
                return Err(serde::de::Error::custom(format!(
                    "allowlist entry `{key}` has an empty command"
                )));
            }
            entries.insert(key, argv);
        }
        Ok(Self(entries))
    }
}

// ---------------------------------------------------------------------------
// Feature flags
// ---------------------------------------------------------------------------

/// A capability that can be switched off in `[features]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Mouse,
    Keyboard,
    Window,
    Screenshot,
    RunApps,
    BrowserOpen,
    BrowserScript,
}

impl Feature {
    pub const ALL: [Feature; 7] = [
        Feature::Mouse,
        Feature::Keyboard,
        Feature::Window,
        Feature::Screenshot,
        Feature::RunApps,
        Feature::BrowserOpen,
        Feature::BrowserScript,
    ];

    /// Key in the `[features]` table.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mouse => "mouse",
            Self::Keyboard => "keyboard",
            Self::Window => "window",
            Self::Screenshot => "screenshot",
            Self::RunApps => "run_apps",
            Self::BrowserOpen => "browser_open",
            Self::BrowserScript => "browser_script",
        }
    }

    /// Older configuration key accepted for the same flag.
    fn legacy_key(self) -> Option<&'static str> {
        match self {
            Self::BrowserScript => Some("browser_playwright"),
            _ => None,
        }
    }

    /// Browser scripting drives a debug-enabled browser and is opt-in.
    pub fn default_enabled(self) -> bool {
        !matches!(self, Self::BrowserScript)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feature toggles.  Unknown keys are preserved so `/status` can echo them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureFlags(BTreeMap<String, bool>);

impl FeatureFlags {
    /// Whether a feature is on, falling back to its default when unset.
    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.0
            .get(feature.as_str())
            .or_else(|| feature.legacy_key().and_then(|k| self.0.get(k)))
            .copied()
            .unwrap_or_else(|| feature.default_enabled())
    }

    /// Set a flag by its table key.
    pub fn set(&mut self, key: impl Into<String>, enabled: bool) {
        self.0.insert(key.into(), enabled);
    }

    /// Every known feature with its effective value, plus any unknown keys.
    pub fn effective(&self) -> BTreeMap<String, bool> {
        let mut all = self.0.clone();
        for feature in Feature::ALL {
            all.insert(feature.as_str().to_owned(), self.is_enabled(feature));
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_app_collapses_and_aliases() {
        assert_eq!(resolve_app("  Bloc   Notes "), "notepad");
        assert_eq!(resolve_app("VS Code"), "vscode");
        assert_eq!(resolve_app("Microsoft Excel"), "excel");
        assert_eq!(resolve_app("GIMP"), "gimp");
    }

    #[test]
    fn notepad_titles_are_ordered() {
        assert_eq!(
            window_titles("Notepad"),
            &["Bloc-notes", "Notepad", "Sans titre", "Untitled"]
        );
        assert!(window_titles("gimp").is_empty());
    }

    #[test]
    fn known_sites_lookup() {
        assert_eq!(known_site("Gmail"), Some("https://mail.google.com/"));
        assert_eq!(known_site("coinbase"), Some("https://www.coinbase.com/signin"));
        assert_eq!(known_site("example"), None);
        assert_eq!(known_site_keywords().count(), 5);
    }

    #[derive(Debug, Deserialize)]
    struct RunTable {
        allowlist: Allowlist,
    }

    #[test]
    fn allowlist_scalar_normalizes_to_argv() {
        let table: RunTable = toml::from_str(
            r#"
            [allowlist]
            notepad = "gedit"
            vscode = ["code", "--new-window"]
            "#,
        )
        .unwrap();

        assert_eq!(table.allowlist.get("notepad").unwrap(), ["gedit"]);
        assert_eq!(table.allowlist.get("vscode").unwrap(), ["code", "--new-window"]);
        assert_eq!(table.allowlist.keys(), vec!["notepad", "vscode"]);
        assert!(table.allowlist.get("word").is_none());
    }

    #[test]
    fn allowlist_rejects_empty_command() {
        let err = toml::from_str::<RunTable>("[allowlist]\nbroken = []\n").unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn feature_defaults_and_overrides() {
        let mut flags = FeatureFlags::default();
        assert!(flags.is_enabled(Feature::Mouse));
        assert!(!flags.is_enabled(Feature::BrowserScript));

        flags.set("mouse", false);
        flags.set("browser_playwright", true);
        flags.set("telepathy", true);
        assert!(!flags.is_enabled(Feature::Mouse));
        assert!(flags.is_enabled(Feature::BrowserScript));

        let effective = flags.effective();
        assert_eq!(effective.get("telepathy"), Some(&true));
        assert_eq!(effective.get("keyboard"), Some(&true));
        assert_eq!(effective.get("browser_script"), Some(&true));
    }
}
