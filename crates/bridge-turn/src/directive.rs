//! `DirectiveProcessor` — §4.10. A closed grammar matched against literal
//! tokens in a model's own text output, never evaluated or treated as a
//! path/command: `[[silent]]`, `[[reply_to:<id>]]`, `[[reply_to_current]]`.
//!
//! Grounded in `skynet_agent::tools::mod`'s string-based dispatch for tool
//! names (compare against a closed set of known literals, reject everything
//! else) rather than any kind of parser or interpreter.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives {
    pub silent: bool,
    pub reply_to: Option<String>,
    pub reply_to_current: bool,
}

fn directive_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[\[(silent|reply_to_current|reply_to:[A-Za-z0-9_\-\.]{1,256})\]\]").unwrap()
    })
}

/// Strip every recognized `[[...]]` directive token from `raw` and return
/// the plain body plus the directives found. Raw mode (caller's choice, not
/// this function's) skips calling this at all and emits `raw` verbatim —
/// §9's explicit requirement that adversarial model text can never reach an
/// eval/exec path is satisfied by this function matching literal strings
/// only, never interpreting its match as code or a filesystem path.
pub fn process(raw: &str) -> (String, Directives) {
    let mut directives = Directives::default();
    let body = directive_pattern()
        .replace_all(raw, |caps: &regex::Captures| {
            let token = &caps[1];
            if token == "silent" {
                directives.silent = true;
            } else if token == "reply_to_current" {
                directives.reply_to_current = true;
            } else if let Some(id) = token.strip_prefix("reply_to:") {
                directives.reply_to = Some(id.to_string());
            }
            ""
        })
        .trim()
        .to_string();
    (body, directives)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_silent_directive() {
        let (body, d) = process("All done. [[silent]]");
        assert_eq!(body, "All done.");
        assert!(d.silent);
    }

    #[test]
    fn parses_reply_to_with_event_id() {
        let (body, d) = process("[[reply_to:evt-123]] sure thing");
        assert_eq!(body, "sure thing");
        assert_eq!(d.reply_to.as_deref(), Some("evt-123"));
    }

    #[test]
    fn parses_reply_to_current() {
        let (body, d) = process("ok [[reply_to_current]]");
        assert_eq!(body, "ok");
        assert!(d.reply_to_current);
    }

    #[test]
    fn unknown_bracket_text_is_left_alone() {
        let (body, d) = process("see [[not_a_directive]] here");
        assert_eq!(body, "see [[not_a_directive]] here");
        assert_eq!(d, Directives::default());
    }

    #[test]
    fn plain_text_with_no_directives_is_unchanged() {
        let (body, d) = process("nothing special here");
        assert_eq!(body, "nothing special here");
        assert_eq!(d, Directives::default());
    }
}
