//! Declarative per-task output schemas.
//!
//! Every task shares one recovery pipeline; what differs between tasks
//! (columns, accepted key aliases, value shapes, keyword rules) lives here
//! as static data.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    Appearance,
    GbvGenerative,
    GbvClassifier,
}

impl Task {
    /// Token used in result and parsed file names.
    pub fn file_tag(self) -> &'static str {
        match self {
            Task::Appearance => "appearance",
            Task::GbvGenerative => "gbv",
            Task::GbvClassifier => "gbv_classifier",
        }
    }

    pub fn schema(self) -> &'static TaskSchema {
        match self {
            Task::Appearance => &APPEARANCE,
            Task::GbvGenerative => &GBV_GENERATIVE,
            Task::GbvClassifier => &GBV_CLASSIFIER,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Task::Appearance => "appearance",
            Task::GbvGenerative => "gbv-generative",
            Task::GbvClassifier => "gbv-classifier",
        };
        f.write_str(name)
    }
}

impl FromStr for Task {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "appearance" => Ok(Task::Appearance),
            "gbv" | "gbv-generative" => Ok(Task::GbvGenerative),
            "gbv-classifier" | "classifier" => Ok(Task::GbvClassifier),
            _ => Err(ConfigError::UnknownTask(s.to_string())),
        }
    }
}

/// Expected value shape of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Tri-state boolean: true, false or undetermined.
    Flag,
    Text,
    List,
}

#[derive(Debug)]
pub struct FieldSpec {
    /// Output column name.
    pub column: &'static str,
    /// Accepted keys in priority order, starting with the key the prompt asks for.
    pub aliases: &'static [&'static str],
    pub shape: Shape,
    /// Forced empty when the flag field is false.
    pub gated: bool,
}

/// Backfills `target` from free text in `source` when the model left it empty.
/// Rules are `(substring, category)`, checked in order, case-insensitive.
#[derive(Debug)]
pub struct Inference {
    pub target: &'static str,
    pub source: &'static str,
    pub rules: &'static [(&'static str, &'static str)],
}

impl Inference {
    pub fn infer(&self, text: &str) -> Option<&'static str> {
        let lower = text.to_lowercase();
        self.rules
            .iter()
            .find(|(needle, _)| lower.contains(*needle))
            .map(|(_, category)| *category)
    }
}

#[derive(Debug)]
pub struct TaskSchema {
    pub task: Task,
    pub id_column: &'static str,
    pub source_column: &'static str,
    pub fields: &'static [FieldSpec],
    pub inferences: &'static [Inference],
    /// Keyword triggers used by fallback detection when no structure survives.
    pub triggers: &'static [&'static str],
}

impl TaskSchema {
    pub fn header(&self) -> Vec<&'static str> {
        let mut header = vec![self.id_column, self.source_column];
        header.extend(self.fields.iter().map(|f| f.column));
        header
    }

    /// The boolean "contains" field gating the rest of the record.
    pub fn flag(&self) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.shape == Shape::Flag)
    }
}

// ── Built-in schemas ──

pub static APPEARANCE: TaskSchema = TaskSchema {
    task: Task::Appearance,
    id_column: "comment_id",
    source_column: "comment",
    fields: &[
        FieldSpec {
            column: "contains_appearance",
            aliases: &["contains_appearance"],
            shape: Shape::Flag,
            gated: false,
        },
        FieldSpec {
            column: "sub_category",
            aliases: &["appearance_sub_category", "sub_category", "appearance_category"],
            shape: Shape::Text,
            gated: true,
        },
        FieldSpec {
            column: "appearance_valence",
            aliases: &["appearance_valence", "valence"],
            shape: Shape::Text,
            gated: true,
        },
        FieldSpec {
            column: "segments",
            aliases: &["segments"],
            shape: Shape::List,
            gated: true,
        },
        FieldSpec {
            column: "reason",
            aliases: &["reason"],
            shape: Shape::Text,
            gated: false,
        },
    ],
    inferences: &[Inference {
        target: "sub_category",
        source: "reason",
        rules: &[
            ("face", "facial_features"),
            ("facial", "facial_features"),
            ("body", "body_features"),
            ("clothing", "clothing_or_dress"),
            ("dress", "clothing_or_dress"),
            ("groom", "cleanliness_or_grooming"),
            ("clean", "cleanliness_or_grooming"),
            ("evaluat", "evaluative_framing"),
            ("look", "evaluative_framing"),
        ],
    }],
    triggers: &[],
};

pub static GBV_GENERATIVE: TaskSchema = TaskSchema {
    task: Task::GbvGenerative,
    id_column: "comment_id",
    source_column: "comment",
    fields: &[
        FieldSpec {
            column: "contains_gbv",
            aliases: &["contains_gbv"],
            shape: Shape::Flag,
            gated: false,
        },
        FieldSpec {
            column: "gbv_primary_category",
            aliases: &["gbv_primary_category", "primary_category"],
            shape: Shape::Text,
            gated: true,
        },
        FieldSpec {
            column: "gbv_secondary_categories",
            aliases: &[
                "gbv_secondary_categories",
                "gbv_subcategories",
                "secondary_categories",
            ],
            shape: Shape::List,
            gated: true,
        },
        FieldSpec {
            column: "target",
            aliases: &["target", "target_group"],
            shape: Shape::Text,
            gated: true,
        },
        FieldSpec {
            column: "segments",
            aliases: &["segments"],
            shape: Shape::List,
            gated: true,
        },
        FieldSpec {
            column: "reason",
            aliases: &["reason"],
            shape: Shape::Text,
            gated: false,
        },
    ],
    inferences: &[Inference {
        target: "gbv_primary_category",
        source: "reason",
        rules: &[
            ("threat", "Threats"),
            ("stalk", "Violent Offences"),
            ("harass", "Violent Offences"),
            ("image-based", "Violent Offences"),
            ("pejorative", "Pejoratives"),
            ("slur", "Pejoratives"),
            ("silenc", "Disrespectful Actions"),
            ("disinformation", "Disrespectful Actions"),
            ("anti-feminis", "Disrespectful Actions"),
            ("benevolent", "Benevolent Othering"),
            ("compliment", "Benevolent Othering"),
            ("dehumanis", "Derogatory Content"),
            ("objectif", "Derogatory Content"),
            ("body shaming", "Derogatory Content"),
            ("derogatory", "Derogatory Content"),
        ],
    }],
    triggers: &[
        "misogyn",
        "slut",
        "bitch",
        "whore",
        "rape",
        "kill",
        "sexual",
        "sexist",
        "hate speech",
    ],
};

/// Classifier rows come from label codes, not generated text, so only the
/// columns matter here.
pub static GBV_CLASSIFIER: TaskSchema = TaskSchema {
    task: Task::GbvClassifier,
    id_column: "comment_id",
    source_column: "comment",
    fields: &[
        FieldSpec {
            column: "contains_gbv",
            aliases: &["contains_gbv"],
            shape: Shape::Flag,
            gated: false,
        },
        FieldSpec {
            column: "gbv_category",
            aliases: &["gbv_category"],
            shape: Shape::Text,
            gated: false,
        },
        FieldSpec {
            column: "raw_label",
            aliases: &["raw_label"],
            shape: Shape::Text,
            gated: false,
        },
        FieldSpec {
            column: "confidence",
            aliases: &["confidence"],
            shape: Shape::Text,
            gated: false,
        },
    ],
    inferences: &[],
    triggers: &[],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_names_parse() {
        assert_eq!("appearance".parse::<Task>().unwrap(), Task::Appearance);
        assert_eq!("gbv".parse::<Task>().unwrap(), Task::GbvGenerative);
        assert_eq!("GBV_generative".parse::<Task>().unwrap(), Task::GbvGenerative);
        assert_eq!("gbv-classifier".parse::<Task>().unwrap(), Task::GbvClassifier);
        assert!(matches!(
            "sentiment".parse::<Task>(),
            Err(ConfigError::UnknownTask(_))
        ));
    }

    #[test]
    fn headers_match_output_columns() {
        assert_eq!(
            APPEARANCE.header(),
            vec![
                "comment_id",
                "comment",
                "contains_appearance",
                "sub_category",
                "appearance_valence",
                "segments",
                "reason"
            ]
        );
        assert_eq!(
            GBV_CLASSIFIER.header(),
            vec![
                "comment_id",
                "comment",
                "contains_gbv",
                "gbv_category",
                "raw_label",
                "confidence"
            ]
        );
    }

    #[test]
    fn every_schema_has_one_ungated_flag() {
        for task in [Task::Appearance, Task::GbvGenerative, Task::GbvClassifier] {
            let schema = task.schema();
            assert_eq!(schema.task, task);
            let flags = schema.fields.iter().filter(|f| f.shape == Shape::Flag).count();
            assert_eq!(flags, 1, "{task}");
            assert!(!schema.flag().unwrap().gated);
            for field in schema.fields {
                assert!(!field.aliases.is_empty(), "{task}: {}", field.column);
            }
            for inference in schema.inferences {
                assert!(schema.fields.iter().any(|f| f.column == inference.target));
                assert!(schema.fields.iter().any(|f| f.column == inference.source));
            }
        }
    }

    #[test]
    fn inference_first_rule_wins() {
        let rules = &APPEARANCE.inferences[0];
        assert_eq!(rules.infer("Comments on her FACE and body"), Some("facial_features"));
        assert_eq!(rules.infer("mocks the way she looks"), Some("evaluative_framing"));
        assert_eq!(rules.infer("political disagreement"), None);
    }
}
