use regex_lite::Regex;
use std::sync::OnceLock;

/// Placeholder replaced by the staged diff
pub const CHANGES_PLACEHOLDER: &str = "{changes}";

/// Fixed instruction sent with every diff
pub const COMMIT_MESSAGE_TEMPLATE: &str = "You are an expert senior programmer, your task now is to \
read these changes {changes} made to the repository files and write a descriptive commit message \
for them, the commit message should as concise as possible and only return the commit message";

/// Substitute the diff into the template
pub fn format_prompt(changes: &str) -> String {
    COMMIT_MESSAGE_TEMPLATE.replacen(CHANGES_PLACEHOLDER, changes, 1)
}

fn lead_in() -> &'static Regex {
    static LEAD_IN: OnceLock<Regex> = OnceLock::new();
    LEAD_IN.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)^(?:sure[,.!]?[ \t]*)?(?:here(?:'s| is)|the|a|my|suggested|proposed)\b",
            r"[^\n:]{0,40}?commit message",
            r"(?:[ \t]+(?:would|could|should|might)[ \t]+be|[ \t]+is|[ \t]+for[^\n:]{0,60})?",
            r"[ \t]*:[ \t]*\r?\n",
        ))
            .expect("lead-in pattern is valid")
    })
}

fn code_fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)\r?\n?```$").expect("fence pattern is valid")
    })
}

/// Reduce a model reply to the bare commit message.
///
/// Drops one lead-in line such as "The commit message would be:" or "Here is a
/// commit message for these changes:", an enclosing code fence, and one layer
/// of matching quotes, trimming whitespace around each step. A subject line that
/// merely mentions "commit message" is kept.
pub fn normalize_response(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(found) = lead_in().find(text) {
        let rest = text[found.end()..].trim();
        if !rest.is_empty() {
            text = rest;
        }
    }

    if let Some(caps) = code_fence().captures(text) {
        if let Some(body) = caps.get(1) {
            text = body.as_str().trim();
        }
    }

    strip_matching_quotes(text).trim().to_string()
}

fn strip_matching_quotes(text: &str) -> &str {
    for (open, close) in [('"', '"'), ('\'', '\''), ('`', '`'), ('\u{201C}', '\u{201D}')] {
        let Some(inner) = text
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        else {
            continue;
        };
        // `"a" and "b"` is two quoted parts, not one quoted message
        if !inner.contains(open) && !inner.contains(close) {
            return inner;
        }
    }
    text
}
