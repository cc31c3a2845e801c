use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use crate::error::ConfigError;

/// One generation result, as written by the inference runner.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    #[serde(alias = "cid", deserialize_with = "lenient_string")]
    pub source_id: String,
    #[serde(default, alias = "model", deserialize_with = "lenient_string")]
    pub model_tag: String,
    #[serde(default, alias = "raw_output", deserialize_with = "lenient_string")]
    pub raw_text: String,
}

/// One classifier prediction.
#[derive(Debug, Clone, Deserialize)]
pub struct RawClassification {
    #[serde(alias = "cid", deserialize_with = "lenient_string")]
    pub source_id: String,
    #[serde(default)]
    pub label: Option<i64>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Ids show up as strings or numbers depending on the dataset; null reads as "".
fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

pub struct JsonlBatch<T> {
    pub records: Vec<T>,
    /// Lines that were not valid records.
    pub skipped: usize,
}

/// Read a JSONL file. Blank lines are ignored; malformed lines are logged and counted.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<JsonlBatch<T>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut records = Vec::new();
    let mut skipped = 0;

    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(file = %path.display(), line = i + 1, error = %e, "skipping malformed input line");
                skipped += 1;
            }
        }
    }

    Ok(JsonlBatch { records, skipped })
}

/// Original comment text by id, for the `comment` column.
#[derive(Debug, Default)]
pub struct SourceTexts(HashMap<String, String>);

impl SourceTexts {
    /// `.json`: an object `{id: text}`. Anything else is read as CSV with
    /// `id_column` / `text_column` headers.
    pub fn load(path: &Path, id_column: &str, text_column: &str) -> Result<Self> {
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::load_json(path)
        } else {
            Self::load_csv(path, id_column, text_column)
        }
    }

    fn load_json(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let raw: HashMap<String, Value> = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing {}", path.display()))?;
        let texts = raw
            .into_iter()
            .map(|(id, v)| {
                let text = match v {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (id, text)
            })
            .collect();
        Ok(SourceTexts(texts))
    }

    fn load_csv(path: &Path, id_column: &str, text_column: &str) -> Result<Self> {
        let mut reader =
            csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
        let headers = reader.headers()?.clone();
        let position = |column: &str| {
            headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| ConfigError::MissingColumn {
                    path: path.to_path_buf(),
                    column: column.to_string(),
                })
        };
        let id_idx = position(id_column)?;
        let text_idx = position(text_column)?;

        let mut texts = HashMap::new();
        for row in reader.records() {
            let row = row.with_context(|| format!("reading {}", path.display()))?;
            if let (Some(id), Some(text)) = (row.get(id_idx), row.get(text_idx)) {
                texts.insert(id.to_string(), text.to_string());
            }
        }
        Ok(SourceTexts(texts))
    }

    /// "" for ids the dataset does not contain.
    pub fn get(&self, id: &str) -> &str {
        self.0.get(id).map(String::as_str).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

// ── Tests ──
