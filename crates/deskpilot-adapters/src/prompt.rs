//! Prompt material for the LLM loop.

use std::sync::LazyLock;

use regex::Regex;

use crate::apps::known_site;

static OPEN_WORD: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\bouvre(?:r)?\s+([a-z0-9\-_.]+)\b").ok());

/// System prompt listing the launchable applications.
///
/// `allowlist` is expected sorted; an empty list is shown as `(none)`.
pub fn system_prompt(allowlist: &[String]) -> String {
    let apps = if allowlist.is_empty() {
        "(none)".to_owned()
    } else {
        allowlist.join(", ")
    };
    format!(
        "You plan and execute actions on a local PC by calling the provided tools.\n\
         - To visit a website, prefer open_url.\n\
         - Use run_app only for applications in the allowlist: {apps}.\n\
         - To write into an application: run_app, then sleep(0.8), then focus_window, \
         then type_text (or paste_text for long, multi-line or accented text).\n\
         - If a tool fails, try a reasonable alternative (for example open_url instead of run_app).\n\
         - Follow the requested steps in order. Do not propose code; act through the tools.\n\
         - When finished, reply with a short final answer."
    )
}

/// Prefix a known-site hint when the command says `ouvre <site>`.
pub fn with_site_hint(text: &str) -> String {
    let hint = OPEN_WORD
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|c| c.get(1))
        .and_then(|m| {
            let key = m.as_str().to_lowercase();
            known_site(&key).map(|url| format!("(Hint: {key} \u{2192} {url}) "))
        });
    match hint {
        Some(hint) => format!("{hint}{text}"),
        None => text.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_lists_allowlist() {
        let prompt = system_prompt(&["notepad".into(), "vscode".into()]);
        assert!(prompt.contains("allowlist: notepad, vscode."));
        assert!(prompt.contains("prefer open_url"));
        assert!(system_prompt(&[]).contains("allowlist: (none)."));
    }

    #[test]
    fn hint_for_known_site() {
        let hinted = with_site_hint("Ouvre YouTube et cherche des chats");
        assert!(hinted.starts_with("(Hint: youtube \u{2192} https://www.youtube.com/) Ouvre YouTube"));
    }

    #[test]
    fn no_hint_for_other_words() {
        assert_eq!(with_site_hint("ouvre notepad"), "ouvre notepad");
        assert_eq!(with_site_hint("tape bonjour"), "tape bonjour");
    }
}
