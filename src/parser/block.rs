use std::sync::LazyLock;

use regex::Regex;

static LEADING_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^```(?:json)?").unwrap());

const OPEN: char = '{';
const CLOSE: char = '}';
const FENCE: &str = "```";

/// Isolate the structured payload: first `{` through last `}` after fences are stripped.
/// Returns "" when there is no such span.
pub fn extract(raw: &str) -> &str {
    let text = strip_fences(raw);
    match (text.find(OPEN), text.rfind(CLOSE)) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => "",
    }
}

/// Candidate handed to the repairer. Falls back to everything from the first `{`
/// onwards when the generation stopped before any closing brace.
pub fn candidate(raw: &str) -> &str {
    let block = extract(raw);
    if !block.is_empty() {
        return block;
    }
    truncated_tail(raw)
}

/// Leading garbage dropped, never cut at a close delimiter.
fn truncated_tail(raw: &str) -> &str {
    let text = strip_fences(raw);
    match text.find(OPEN) {
        Some(start) => text[start..].trim_end(),
        None => "",
    }
}

fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(m) = LEADING_FENCE_RE.find(text) {
        text = text[m.end()..].trim_start();
    }
    if let Some(rest) = text.strip_prefix(FENCE) {
        text = rest.trim_start();
    }
    if let Some(rest) = text.strip_suffix(FENCE) {
        text = rest.trim_end();
    }
    text
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_object() {
        assert_eq!(extract(r#"{"a": true}"#), r#"{"a": true}"#);
    }

    #[test]
    fn fenced_with_tag_any_case() {
        let raw = "```JSON\n{\"contains_gbv\": false}\n```";
        assert_eq!(extract(raw), "{\"contains_gbv\": false}");
        let raw = "```\n{\"x\": 1}\n```\n";
        assert_eq!(extract(raw), "{\"x\": 1}");
    }

    #[test]
    fn prose_around_object() {
        let raw = "Sure! Here is the answer: {\"a\": {\"b\": 1}} Hope this helps {not json";
        assert_eq!(extract(raw), "{\"a\": {\"b\": 1}}");
    }

    #[test]
    fn spans_first_open_to_last_close() {
        let raw = "x {\"a\": 1} and {\"b\": 2} y";
        assert_eq!(extract(raw), "{\"a\": 1} and {\"b\": 2}");
    }

    #[test]
    fn no_delimiters_is_empty() {
        assert_eq!(extract("I think this is definitely hate speech against women"), "");
        assert_eq!(extract(""), "");
        assert_eq!(extract("```json\n```"), "");
    }

    #[test]
    fn close_before_open_is_empty() {
        assert_eq!(extract("} backwards {"), "");
    }

    #[test]
    fn candidate_salvages_truncated_generation() {
        let raw = "Answer:\n{\"contains_gbv\": true, \"segments\": [\"kill you\"";
        assert_eq!(extract(raw), "");
        assert_eq!(candidate(raw), "{\"contains_gbv\": true, \"segments\": [\"kill you\"");
    }

    #[test]
    fn candidate_prefers_complete_block() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(candidate(raw), "{\"a\": 1}");
        assert_eq!(candidate("no structure here"), "");
    }
}
