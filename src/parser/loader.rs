use serde_json::{Map, Value};

use super::repair::{close_outside_strings, repair, substitute_literals};

/// Result of loading a candidate block. There is no error state: anything
/// that cannot be parsed at every tier is `Unstructured`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Structured(Map<String, Value>),
    Unstructured,
}

impl ParseOutcome {
    pub fn is_structured(&self) -> bool {
        matches!(self, ParseOutcome::Structured(_))
    }
}

/// Which tier produced the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Parsed after the standard repair.
    Repaired,
    /// Parsed after the string-aware closing pass.
    Reclosed,
    Failed,
}

pub fn load(text: &str) -> ParseOutcome {
    load_with_tier(text).0
}

pub fn load_with_tier(text: &str) -> (ParseOutcome, Tier) {
    if text.trim().is_empty() {
        return (ParseOutcome::Unstructured, Tier::Failed);
    }

    if let Some(map) = parse_object(&repair(text)) {
        return (ParseOutcome::Structured(map), Tier::Repaired);
    }

    if let Some(map) = parse_object(&close_outside_strings(&substitute_literals(text))) {
        return (ParseOutcome::Structured(map), Tier::Reclosed);
    }

    (ParseOutcome::Unstructured, Tier::Failed)
}

/// Strict parse; a top-level value that is not an object counts as a failure.
fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

// ── Tests ──
