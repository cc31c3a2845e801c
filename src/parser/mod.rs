pub mod block;
pub mod fallback;
pub mod loader;
pub mod normalize;
pub mod repair;

use crate::input::{RawClassification, RawRecord};
use crate::labels::ClassifierLabelMap;
use crate::schema::TaskSchema;
use loader::ParseOutcome;
use normalize::{FieldValue, NormalizedRecord};

/// How a row's values were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPath {
    Structured,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct Recovered {
    pub record: NormalizedRecord,
    pub path: RecoveryPath,
}

/// Four-pass pipeline: raw text → candidate block → repaired parse → normalized row.
/// Total: every input yields exactly one row.
pub fn process_record(raw: &RawRecord, source_text: &str, schema: &TaskSchema) -> Recovered {
    let candidate = block::candidate(&raw.raw_text);
    let outcome = loader::load(candidate);
    let path = match &outcome {
        ParseOutcome::Structured(map) if !map.is_empty() => RecoveryPath::Structured,
        _ => RecoveryPath::Fallback,
    };
    let fields = normalize::normalize(&outcome, &raw.raw_text, schema);

    Recovered {
        record: NormalizedRecord {
            id: raw.source_id.clone(),
            source_text: source_text.to_string(),
            fields,
        },
        path,
    }
}

/// Classifier rows: the label code is looked up, nothing is parsed.
/// Columns come from `schema`; values follow its order: flag, category,
/// raw label, confidence.
pub fn process_classification(
    raw: &RawClassification,
    model_tag: &str,
    source_text: &str,
    labels: &ClassifierLabelMap,
    schema: &TaskSchema,
) -> NormalizedRecord {
    let mapping = match raw.label {
        Some(code) => labels.map_label(model_tag, code),
        None => labels.unknown(),
    };
    let values = [
        FieldValue::Flag(mapping.contains),
        FieldValue::Text(mapping.category),
        FieldValue::Text(raw.label.map(|l| l.to_string()).unwrap_or_default()),
        FieldValue::Text(raw.confidence.map(|c| c.to_string()).unwrap_or_default()),
    ];

    NormalizedRecord {
        id: raw.source_id.clone(),
        source_text: source_text.to_string(),
        fields: schema.fields.iter().map(|f| f.column).zip(values).collect(),
    }
}

// ── Tests ──
