//! Classifier label codes → semantic categories, per classifier model.
//!
//! Loaded once at start-up and only read afterwards, so a shared reference is
//! handed to every worker.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

pub const UNKNOWN_CATEGORY: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LabelMapping {
    /// `None` only for codes the table does not know.
    #[serde(rename = "contains_gbv", alias = "contains")]
    pub contains: Option<bool>,
    pub category: String,
}

#[derive(Debug, Clone, Default)]
pub struct ClassifierLabelMap {
    models: HashMap<String, HashMap<i64, LabelMapping>>,
}

impl ClassifierLabelMap {
    /// Tables for the classifiers in the evaluation suite.
    pub fn builtin() -> Self {
        let none = |code: i64| (code, mapping(false, "none"));
        let mut models = HashMap::new();
        // Hate-speech-CNERG/bert-base-uncased-hatexplain
        models.insert(
            "hate_explain".to_string(),
            HashMap::from([
                (0, mapping(true, "hate_speech")),
                none(1),
                (2, mapping(true, "offensive_language")),
            ]),
        );
        // cardiffnlp/twitter-roberta-base-hate
        models.insert(
            "cardiff_hate".to_string(),
            HashMap::from([none(0), (1, mapping(true, "hate_speech"))]),
        );
        // tum-nlp/bertweet-sexism (EDOS)
        models.insert(
            "sexism_edos_tum".to_string(),
            HashMap::from([none(0), (1, mapping(true, "sexism"))]),
        );
        // NLP-LTU/bertweet-large-sexism-detector (EDOS)
        models.insert(
            "sexism_edos_ltu".to_string(),
            HashMap::from([none(0), (1, mapping(true, "sexism"))]),
        );
        ClassifierLabelMap { models }
    }

    /// JSON object keyed by model tag, then by label code:
    /// `{"cardiff_hate": {"1": {"contains_gbv": true, "category": "hate_speech"}}}`.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let models = serde_json::from_str(json)?;
        Ok(ClassifierLabelMap { models })
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::LabelMapIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json).map_err(|source| ConfigError::LabelMapJson {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn has_model(&self, model_tag: &str) -> bool {
        self.models.contains_key(model_tag)
    }

    pub fn model_tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.models.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Unknown model tags and unknown codes map to `{contains: None, category: "unknown"}`.
    pub fn map_label(&self, model_tag: &str, code: i64) -> LabelMapping {
        self.models
            .get(model_tag)
            .and_then(|codes| codes.get(&code))
            .cloned()
            .unwrap_or_else(|| self.unknown())
    }

    pub fn unknown(&self) -> LabelMapping {
        LabelMapping {
            contains: None,
            category: UNKNOWN_CATEGORY.to_string(),
        }
    }
}

fn mapping(contains: bool, category: &str) -> LabelMapping {
    LabelMapping {
        contains: Some(contains),
        category: category.to_string(),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cardiff_codes() {
        let labels = ClassifierLabelMap::builtin();
        assert_eq!(labels.map_label("cardiff_hate", 1), mapping(true, "hate_speech"));
        assert_eq!(labels.map_label("cardiff_hate", 0), mapping(false, "none"));
        assert_eq!(
            labels.map_label("cardiff_hate", 9),
            LabelMapping {
                contains: None,
                category: "unknown".into()
            }
        );
    }

    #[test]
    fn hatexplain_normal_is_code_one() {
        let labels = ClassifierLabelMap::builtin();
        assert_eq!(labels.map_label("hate_explain", 0), mapping(true, "hate_speech"));
        assert_eq!(labels.map_label("hate_explain", 1), mapping(false, "none"));
        assert_eq!(labels.map_label("hate_explain", 2), mapping(true, "offensive_language"));
    }

    #[test]
    fn unknown_model_is_unknown_not_error() {
        let labels = ClassifierLabelMap::builtin();
        assert!(!labels.has_model("mystery_model"));
        assert_eq!(labels.map_label("mystery_model", 0), labels.unknown());
    }

    #[test]
    fn json_table_replaces_builtin() {
        let labels = ClassifierLabelMap::from_json_str(
            r#"{"toxic_bert": {"0": {"contains_gbv": false, "category": "none"},
                               "1": {"contains": true, "category": "toxic"}}}"#,
        )
        .unwrap();
        assert_eq!(labels.model_tags(), vec!["toxic_bert"]);
        assert_eq!(labels.map_label("toxic_bert", 1), mapping(true, "toxic"));
        assert_eq!(labels.map_label("cardiff_hate", 1).category, "unknown");
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = ClassifierLabelMap::from_json_file(Path::new("does/not/exist.json")).unwrap_err();
        assert!(matches!(err, ConfigError::LabelMapIo { .. }));
    }

    #[test]
    fn shareable_across_workers() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<ClassifierLabelMap>();
    }
}
