//! Deterministic command interpreter.
//!
//! A command is split into clauses on French conjunctions (`et`, `puis`,
//! `ensuite`, `après`) and on `,` / `;`.  Each clause is matched against a
//! fixed-priority list of intent patterns; the first pattern that matches
//! and accepts its captures decides the clause's steps.  A short pause is
//! inserted between consecutive clauses.
//!
//! Matching is case-insensitive.  Markers inside quotes do not split, so
//! `tape "a, b" puis entrée` and `tape 'a, b' puis entrée` both type `a, b`.

use std::fmt;
use std::ops::Range;

use deskpilot_adapters::apps::known_site_keywords;
use deskpilot_adapters::{DEFAULT_FOCUS, known_site, resolve_app};
use regex::{Captures, Regex};
use tracing::debug;

use crate::error::{IntentError, Result};
use crate::plan::{ActionStep, CLAUSE_PAUSE_SECS, LAUNCH_PAUSE_SECS, Plan, SITE_PAUSE_SECS};

const CLAUSE_SPLIT: &str = r"(?i)\s*(?:\bet\b|\bpuis\b|\bensuite\b|\baprès\b|,|;)\s+";

const TYPE_FALLBACK: &str = r"(?i)\b(écrit|écris|ecris|tape|saisis)\b\s*:?\s*(.+)";

/// Recognized clause intents, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    OpenApp,
    OpenKnownSite,
    OpenUrl,
    Focus,
    Enter,
    Tab,
    TypeText,
    Screenshot,
}

impl IntentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenApp => "open_app",
            Self::OpenKnownSite => "open_known_site",
            Self::OpenUrl => "open_url",
            Self::Focus => "focus",
            Self::Enter => "enter",
            Self::Tab => "tab",
            Self::TypeText => "type_text",
            Self::Screenshot => "screenshot",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct IntentPattern {
    kind: IntentKind,
    regex: Regex,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| IntentError::InvalidPattern {
        pattern: pattern.to_owned(),
        reason: e.to_string(),
    })
}

/// Rule-based planner for French commands.
#[derive(Debug)]
pub struct CommandInterpreter {
    patterns: Vec<IntentPattern>,
    clause_split: Regex,
    type_fallback: Regex,
}

impl CommandInterpreter {
    /// Compile the intent table.
    pub fn new() -> Result<Self> {
        let sites = known_site_keywords().collect::<Vec<_>>().join("|");
        let table = [
            (
                IntentKind::OpenApp,
                r"(?i)\b(ouvre|ouvrir|lance|d[ée]marre)\b\s+([a-z0-9 .+-]+)".to_owned(),
            ),
            (
                IntentKind::OpenKnownSite,
                format!(r"(?i)\b(ouvre|ouvrir|lance|d[ée]marre|va(?:s)? sur)\b.*\b({sites})\b"),
            ),
            (
                IntentKind::OpenUrl,
                r"(?i)\b(ouvre|ouvrir|va(?:s)? sur)\b\s+(https?://\S+|\S+\.\S+)".to_owned(),
            ),
            (
                IntentKind::Focus,
                r"(?i)\b(focus|active|mets au premier plan|donne le focus)\b\s+(?:(?:à|a|sur)\s+)?(.+)"
                    .to_owned(),
            ),
            (IntentKind::Enter, r"(?i)\b(appuie|valide|enter|entr(é|e)e)\b".to_owned()),
            (
                IntentKind::Tab,
                r"(?i)\b(tab|onglet suivant|passe au champ suivant)\b".to_owned(),
            ),
            (
                IntentKind::TypeText,
                r#"(?i)\b(tape|écrit|écris|ecris|saisis)\b\s+(?:"([^"]+)"|'([^']+)'|(.+))"#.to_owned(),
            ),
            (
                IntentKind::Screenshot,
                r"(?i)\b(capture|screenshot|photo d'?écran)\b".to_owned(),
            ),
        ];

        let patterns = table
            .into_iter()
            .map(|(kind, pattern)| {
                Ok(IntentPattern {
                    kind,
                    regex: compile(&pattern)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            patterns,
            clause_split: compile(CLAUSE_SPLIT)?,
            type_fallback: compile(TYPE_FALLBACK)?,
        })
    }

    /// Split a command into trimmed, non-empty clauses.
    ///
    /// Markers inside a quoted span (see [`quoted_spans`]) do not split.
    pub fn split_clauses<'a>(&self, command: &'a str) -> Vec<&'a str> {
        let quoted = quoted_spans(command);
        let mut pieces = Vec::new();
        let mut start = 0;
        for marker in self.clause_split.find_iter(command) {
            if quoted.iter().any(|span| span.contains(&marker.start())) {
                continue;
            }
            pieces.push(&command[start..marker.start()]);
            start = marker.end();
        }
        pieces.push(&command[start..]);

        pieces
            .into_iter()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect()
    }

    /// Translate a whole command into a plan.
    ///
    /// Returns an empty plan when no clause produced a step.
    pub fn interpret(&self, command: &str) -> Plan {
        let clauses = self.split_clauses(command);
        let mut plan = Vec::new();
        let mut detected = false;

        for (index, clause) in clauses.iter().enumerate() {
            let steps = self.interpret_clause(clause);
            detected |= !steps.is_empty();
            plan.extend(steps);
            if index + 1 < clauses.len() {
                plan.push(ActionStep::sleep(CLAUSE_PAUSE_SECS));
            }
        }

        if !detected {
            plan.clear();
        }
        plan
    }

    /// The intent that decides `clause`, if any pattern accepts it.
    pub fn classify(&self, clause: &str) -> Option<IntentKind> {
        self.resolve(clause.trim()).map(|(kind, _)| kind)
    }

    /// Steps for one clause.  Empty when nothing matched.
    pub fn interpret_clause(&self, clause: &str) -> Vec<ActionStep> {
        let clause = clause.trim();
        if let Some((kind, steps)) = self.resolve(clause) {
            debug!(clause, intent = %kind, steps = steps.len(), "clause matched");
            return steps;
        }
        self.fallback(clause)
    }

    fn resolve(&self, clause: &str) -> Option<(IntentKind, Vec<ActionStep>)> {
        self.patterns.iter().find_map(|pattern| {
            let caps = pattern.regex.captures(clause)?;
            expand(pattern.kind, &caps, clause).map(|steps| (pattern.kind, steps))
        })
    }

    fn fallback(&self, clause: &str) -> Vec<ActionStep> {
        if let Some(rest) = strip_prefix_ignore_case(clause, "ouvre ") {
            let target = rest.trim();
            if !target.is_empty() {
                return vec![ActionStep::focus(DEFAULT_FOCUS), ActionStep::open(target)];
            }
        }

        if let Some(text) = self.type_fallback.captures(clause).and_then(|c| c.get(2)) {
            return vec![ActionStep::type_text(text.as_str())];
        }

        debug!(clause, "clause produced no steps");
        Vec::new()
    }
}

/// Steps for a matched pattern, or `None` when the captures belong to a
/// later pattern.
fn expand(kind: IntentKind, caps: &Captures<'_>, clause: &str) -> Option<Vec<ActionStep>> {
    let steps = match kind {
        IntentKind::OpenApp => {
            let name = caps.get(2)?;
            let raw = name.as_str().trim();
            let first_token = clause[name.start()..].split_whitespace().next()?;
            if raw.is_empty()
                || looks_like_url(first_token)
                || raw.split_whitespace().any(|w| known_site(w).is_some())
            {
                return None;
            }
            let app = resolve_app(raw);
            vec![
                ActionStep::RunApp { name: app.clone() },
                ActionStep::sleep(LAUNCH_PAUSE_SECS),
                ActionStep::FocusBest {
                    app,
                    fallback: raw.to_owned(),
                },
            ]
        }
        IntentKind::OpenKnownSite => {
            let url = known_site(caps.get(2)?.as_str())?;
            vec![
                ActionStep::focus(DEFAULT_FOCUS),
                ActionStep::open(url),
                ActionStep::sleep(SITE_PAUSE_SECS),
            ]
        }
        IntentKind::OpenUrl => vec![
            ActionStep::focus(DEFAULT_FOCUS),
            ActionStep::open(caps.get(2)?.as_str()),
        ],
        IntentKind::Focus => {
            let title = caps.get(2)?.as_str().trim();
            if title.is_empty() {
                return None;
            }
            vec![ActionStep::focus(title)]
        }
        IntentKind::Enter => vec![ActionStep::type_text("\r")],
        IntentKind::Tab => vec![ActionStep::type_text("\t")],
        IntentKind::TypeText => {
            let text = caps.get(2).or_else(|| caps.get(3)).or_else(|| caps.get(4))?;
            vec![ActionStep::type_text(text.as_str())]
        }
        IntentKind::Screenshot => vec![ActionStep::Screenshot],
    };
    Some(steps)
}

/// Byte ranges of quoted text.
///
/// Double quotes always pair.  A single quote opens a span only at the start
/// of a word and closes it only before whitespace, punctuation or the end, so
/// apostrophes such as `l'adresse` are left alone.  An unclosed quote runs to
/// the end of the command.
fn quoted_spans(command: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut open: Option<(char, usize)> = None;
    let mut prev: Option<char> = None;
    let mut chars = command.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let next = chars.peek().map(|&(_, n)| n);
        match (open, c) {
            (None, '"') => open = Some(('"', i)),
            (None, '\'') if prev.is_none_or(char::is_whitespace) => open = Some(('\'', i)),
            (Some(('"', start)), '"') => {
                spans.push(start..i + 1);
                open = None;
            }
            (Some(('\'', start)), '\'')
                if next.is_none_or(|n| n.is_whitespace() || ",;.!?".contains(n)) =>
            {
                spans.push(start..i + 1);
                open = None;
            }
            _ => {}
        }
        prev = Some(c);
    }

    if let Some((_, start)) = open {
        spans.push(start..command.len());
    }
    spans
}

/// Scheme-prefixed, `www.`-prefixed or dotted like `example.com`.
fn looks_like_url(token: &str) -> bool {
    if token.contains("://") || token.to_lowercase().starts_with("www.") {
        return true;
    }
    match token.split_once('.') {
        Some((host, rest)) => !host.is_empty() && !rest.is_empty(),
        None => false,
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpreter() -> CommandInterpreter {
        CommandInterpreter::new().unwrap()
    }

    #[test]
    fn open_app_expands_to_launch_and_focus() {
        assert_eq!(
            interpreter().interpret("ouvre notepad"),
            vec![
                ActionStep::RunApp {
                    name: "notepad".into()
                },
                ActionStep::sleep(0.8),
                ActionStep::FocusBest {
                    app: "notepad".into(),
                    fallback: "notepad".into()
                },
            ]
        );
    }

    #[test]
    fn app_aliases_resolve_but_keep_raw_fallback() {
        let plan = interpreter().interpret("Lance Bloc-Notes");
        assert_eq!(
            plan[0],
            ActionStep::RunApp {
                name: "notepad".into()
            }
        );
        assert_eq!(
            plan[2],
            ActionStep::FocusBest {
                app: "notepad".into(),
                fallback: "Bloc-Notes".into()
            }
        );
    }

    #[test]
    fn known_site_wins_over_app_launch() {
        assert_eq!(
            interpreter().interpret("ouvre youtube"),
            vec![
                ActionStep::focus("Chrome"),
                ActionStep::open("https://www.youtube.com/"),
                ActionStep::sleep(1.0),
            ]
        );
        assert_eq!(
            interpreter().classify("va sur gmail"),
            Some(IntentKind::OpenKnownSite)
        );
    }

    #[test]
    fn url_is_opened_not_launched() {
        for (command, url) in [
            ("ouvre https://example.com/a?b=1", "https://example.com/a?b=1"),
            ("ouvre example.org", "example.org"),
            ("vas sur www.rust-lang.org", "www.rust-lang.org"),
        ] {
            assert_eq!(
                interpreter().interpret(command),
                vec![ActionStep::focus("Chrome"), ActionStep::open(url)],
                "{command}"
            );
        }
    }

    #[test]
    fn focus_strips_preposition() {
        assert_eq!(
            interpreter().interpret("donne le focus à Visual Studio Code"),
            vec![ActionStep::focus("Visual Studio Code")]
        );
        assert_eq!(
            interpreter().interpret("active Firefox"),
            vec![ActionStep::focus("Firefox")]
        );
    }

    #[test]
    fn enter_and_tab_are_keystrokes() {
        assert_eq!(interpreter().interpret("valide"), vec![ActionStep::type_text("\r")]);
        assert_eq!(interpreter().interpret("appuie sur entrée"), vec![ActionStep::type_text("\r")]);
        assert_eq!(
            interpreter().interpret("passe au champ suivant"),
            vec![ActionStep::type_text("\t")]
        );
    }

    #[test]
    fn typed_text_honours_quotes() {
        let i = interpreter();
        assert_eq!(i.interpret(r#"tape "Bonjour""#), vec![ActionStep::type_text("Bonjour")]);
        assert_eq!(i.interpret("écris 'salut'"), vec![ActionStep::type_text("salut")]);
        assert_eq!(i.interpret("saisis mon texte"), vec![ActionStep::type_text("mon texte")]);
    }

    #[test]
    fn type_then_screenshot() {
        assert_eq!(
            interpreter().interpret(r#"tape "Bonjour" et screenshot"#),
            vec![
                ActionStep::type_text("Bonjour"),
                ActionStep::sleep(0.4),
                ActionStep::Screenshot,
            ]
        );
    }

    #[test]
    fn one_pause_between_two_clauses() {
        let plan = interpreter().interpret("ouvre notepad puis tape bonjour");
        let pauses: Vec<usize> = plan
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == ActionStep::sleep(0.4))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(pauses, vec![3]);
        assert_eq!(plan.last(), Some(&ActionStep::type_text("bonjour")));
    }

    #[test]
    fn markers_inside_quotes_do_not_split() {
        let i = interpreter();
        assert_eq!(
            i.split_clauses(r#"tape "pain, beurre et confiture" puis valide"#),
            vec![r#"tape "pain, beurre et confiture""#, "valide"]
        );
        assert_eq!(
            i.split_clauses("capture ; ensuite  tab"),
            vec!["capture", "tab"]
        );
    }

    #[test]
    fn single_quotes_protect_markers_but_apostrophes_do_not() {
        let i = interpreter();
        assert_eq!(
            i.split_clauses("tape 'pain, beurre' puis valide"),
            vec!["tape 'pain, beurre'", "valide"]
        );
        assert_eq!(
            i.interpret("tape 'pain, beurre' puis valide"),
            vec![
                ActionStep::type_text("pain, beurre"),
                ActionStep::sleep(0.4),
                ActionStep::type_text("\r"),
            ]
        );
        assert_eq!(
            i.split_clauses("tape l'adresse, puis valide"),
            vec!["tape l'adresse", "valide"]
        );
    }

    #[test]
    fn quoted_span_ranges() {
        assert_eq!(quoted_spans(r#"a "b, c" d"#), vec![2..8]);
        assert_eq!(quoted_spans("l'adresse et 'x'"), vec![13..16]);
        assert_eq!(quoted_spans("tape \"ouvert, et"), vec![5..16]);
        assert!(quoted_spans("aujourd'hui").is_empty());
    }

    #[test]
    fn unknown_name_falls_back_to_opening_it() {
        assert_eq!(
            interpreter().interpret("ouvre Éditeur"),
            vec![ActionStep::focus("Chrome"), ActionStep::open("Éditeur")]
        );
    }

    #[test]
    fn unknown_command_yields_empty_plan() {
        assert!(interpreter().interpret("bonjour à tous").is_empty());
        assert!(interpreter().interpret("bonjour et merci").is_empty());
        assert!(interpreter().interpret("   ").is_empty());
    }

    #[test]
    fn colon_form_falls_back_to_typing() {
        assert_eq!(
            interpreter().interpret("tape: hello"),
            vec![ActionStep::type_text("hello")]
        );
    }

    #[test]
    fn url_detection() {
        assert!(looks_like_url("https://x"));
        assert!(looks_like_url("example.com"));
        assert!(looks_like_url("WWW.example"));
        assert!(!looks_like_url("notepad"));
        assert!(!looks_like_url("notepad."));
    }
}
