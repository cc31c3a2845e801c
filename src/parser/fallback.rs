use std::sync::LazyLock;

use regex::Regex;

use crate::schema::FieldSpec;

static FLAG_PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)["']([a-z0-9_]+)["']\s*:\s*(true|false)\b"#).unwrap());

/// Infer a boolean field from raw text when nothing parsed.
///
/// 1. a literal `"field": true|false` pair anywhere (true wins over false);
/// 2. any keyword trigger, case-insensitive, means true;
/// 3. otherwise undetermined (`None`), which is not the same as false.
pub fn detect_fallback(raw: &str, field: &FieldSpec, triggers: &[&str]) -> Option<bool> {
    if raw.trim().is_empty() {
        return None;
    }

    let mut seen_false = false;
    for caps in FLAG_PAIR_RE.captures_iter(raw) {
        let key = &caps[1];
        if !field.aliases.iter().any(|a| a.eq_ignore_ascii_case(key)) {
            continue;
        }
        if caps[2].eq_ignore_ascii_case("true") {
            return Some(true);
        }
        seen_false = true;
    }
    if seen_false {
        return Some(false);
    }

    let lower = raw.to_lowercase();
    if triggers.iter().any(|t| lower.contains(*t)) {
        return Some(true);
    }

    None
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{APPEARANCE, GBV_GENERATIVE};

    fn gbv(raw: &str) -> Option<bool> {
        let schema = &GBV_GENERATIVE;
        detect_fallback(raw, schema.flag().unwrap(), schema.triggers)
    }

    fn appearance(raw: &str) -> Option<bool> {
        let schema = &APPEARANCE;
        detect_fallback(raw, schema.flag().unwrap(), schema.triggers)
    }

    #[test]
    fn literal_pair_tolerates_case_and_whitespace() {
        assert_eq!(gbv(r#"broken "Contains_GBV"  :   TRUE, "segments": [ oops"#), Some(true));
        assert_eq!(appearance("'contains_appearance':false ... trailing junk {"), Some(false));
    }

    #[test]
    fn true_beats_false() {
        assert_eq!(
            appearance(r#""contains_appearance": false ... "contains_appearance": true"#),
            Some(true)
        );
    }

    #[test]
    fn other_fields_ignored() {
        assert_eq!(appearance(r#""contains_gbv": true"#), None);
        assert_eq!(appearance(r#""not_contains_appearance": true"#), None);
    }

    #[test]
    fn keyword_trigger_when_no_pair() {
        assert_eq!(gbv("I think this is definitely hate speech against women"), Some(true));
        assert_eq!(gbv("Calling her a WHORE is abuse"), Some(true));
    }

    #[test]
    fn literal_false_wins_over_keywords() {
        assert_eq!(gbv(r#""contains_gbv": false because no sexist language"#), Some(false));
    }

    #[test]
    fn undetermined_without_evidence() {
        assert_eq!(gbv("The model refused to answer."), None);
        assert_eq!(gbv(""), None);
        // No triggers for appearance.
        assert_eq!(appearance("she looks tired"), None);
    }
}
