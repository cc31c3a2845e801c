use std::path::PathBuf;

use thiserror::Error;

/// Problems with static configuration. Reported once per batch, never per record.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown task '{0}' (expected appearance, gbv-generative or gbv-classifier)")]
    UnknownTask(String),

    #[error("failed to read label map {}: {source}", .path.display())]
    LabelMapIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid label map {}: {source}", .path.display())]
    LabelMapJson {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("column '{column}' not found in {}", .path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("settings error: {0}")]
    Settings(#[from] config::ConfigError),
}
