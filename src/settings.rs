use std::collections::HashMap;
use std::path::PathBuf;

use config::{Config, Environment};
use serde::Deserialize;

use crate::error::ConfigError;

const ENV_PREFIX: &str = "LLM_PARSER";

/// Batch defaults. Environment variables (`LLM_PARSER_*`) override these;
/// command-line flags override both.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub results_dir: PathBuf,
    pub output_dir: PathBuf,
    pub chunk_size: usize,
    pub models: Vec<String>,
    pub label_map: Option<PathBuf>,
    pub id_column: String,
    pub text_column: String,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// `vars` replaces the process environment; used by tests.
    fn load_from(vars: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("results_dir", "outputs/llm_results")?
            .set_default("output_dir", "outputs/parsed_csv")?
            .set_default("chunk_size", 500_i64)?
            .set_default("models", vec!["llama3_8b", "mistral_7b", "qwen_14b", "gemma_7b"])?
            .set_default("id_column", "tweet_id")?
            .set_default("text_column", "tweet")?
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("models")
                    .source(vars),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

// ── Tests ──
