use serde_json::{Map, Value};

use super::fallback::detect_fallback;
use super::loader::ParseOutcome;
use crate::schema::{FieldSpec, Shape, TaskSchema};

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// `None` is undetermined.
    Flag(Option<bool>),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn empty(shape: Shape) -> Self {
        match shape {
            Shape::Flag => FieldValue::Flag(None),
            Shape::Text => FieldValue::Text(String::new()),
            Shape::List => FieldValue::List(Vec::new()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Flag(flag) => flag.is_none(),
            FieldValue::Text(text) => text.is_empty(),
            FieldValue::List(items) => items.is_empty(),
        }
    }
}

/// One output row: id, source text, then every schema field in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub id: String,
    pub source_text: String,
    pub fields: Vec<(&'static str, FieldValue)>,
}

impl NormalizedRecord {
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(c, _)| *c == column).map(|(_, v)| v)
    }

    /// Value of the first flag field, if the schema has one.
    pub fn flag(&self) -> Option<bool> {
        self.fields.iter().find_map(|(_, v)| match v {
            FieldValue::Flag(flag) => Some(*flag),
            _ => None,
        })?
    }
}

/// Map a parse outcome onto the schema's fields.
///
/// `raw` is the untouched model text, used only when nothing structured
/// survived. An empty mapping counts as nothing structured.
pub fn normalize(
    outcome: &ParseOutcome,
    raw: &str,
    schema: &TaskSchema,
) -> Vec<(&'static str, FieldValue)> {
    let map = match outcome {
        ParseOutcome::Structured(map) if !map.is_empty() => map,
        _ => return unstructured(raw, schema),
    };

    let mut fields: Vec<(&'static str, FieldValue)> = schema
        .fields
        .iter()
        .map(|spec| (spec.column, coerce(resolve(map, spec), spec.shape)))
        .collect();

    for inference in schema.inferences {
        let source = match column_value(&fields, inference.source) {
            Some(FieldValue::Text(text)) if !text.is_empty() => text.clone(),
            _ => continue,
        };
        if let Some((_, target)) = fields.iter_mut().find(|(c, _)| *c == inference.target) {
            if target.is_empty() {
                if let Some(category) = inference.infer(&source) {
                    *target = FieldValue::Text(category.to_string());
                }
            }
        }
    }

    // The model is not trusted to keep dependent fields empty on a negative.
    let negative = schema
        .flag()
        .and_then(|flag| column_value(&fields, flag.column))
        == Some(&FieldValue::Flag(Some(false)));
    if negative {
        for (spec, (_, value)) in schema.fields.iter().zip(fields.iter_mut()) {
            if spec.gated {
                *value = FieldValue::empty(spec.shape);
            }
        }
    }

    fields
}

fn unstructured(raw: &str, schema: &TaskSchema) -> Vec<(&'static str, FieldValue)> {
    schema
        .fields
        .iter()
        .map(|spec| {
            let value = match spec.shape {
                Shape::Flag => FieldValue::Flag(detect_fallback(raw, spec, schema.triggers)),
                shape => FieldValue::empty(shape),
            };
            (spec.column, value)
        })
        .collect()
}

fn column_value<'a>(fields: &'a [(&'static str, FieldValue)], column: &str) -> Option<&'a FieldValue> {
    fields.iter().find(|(c, _)| *c == column).map(|(_, v)| v)
}

/// First alias carrying a non-empty value.
fn resolve<'a>(map: &'a Map<String, Value>, spec: &FieldSpec) -> Option<&'a Value> {
    spec.aliases
        .iter()
        .filter_map(|key| map.get(*key))
        .find(|v| is_present(v))
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(entries) => !entries.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

fn coerce(value: Option<&Value>, shape: Shape) -> FieldValue {
    let Some(value) = value else {
        return FieldValue::empty(shape);
    };
    match shape {
        Shape::Flag => FieldValue::Flag(match value {
            Value::Bool(b) => Some(*b),
            Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Some(true),
            Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }),
        Shape::Text => FieldValue::Text(match value {
            Value::Array(items) => items.iter().filter_map(scalar_text).collect::<Vec<_>>().join("; "),
            other => scalar_text(other).unwrap_or_default(),
        }),
        Shape::List => FieldValue::List(match value {
            Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
            Value::String(s) => vec![s.clone()],
            _ => Vec::new(),
        }),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

// ── Tests ──
