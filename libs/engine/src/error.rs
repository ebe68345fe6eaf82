use std::path::PathBuf;

use recorder_api::BrokerError;

#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("source with topic '{0}' not found")]
    NotFound(String),

    #[error("model document {path}: {source}")]
    ModelParse { path: PathBuf, source: serde_json::Error },

    #[error("{context}: {source}")]
    Io { context: String, source: std::io::Error },

    #[error("serialize model: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("broker: {0}")]
    Broker(#[from] BrokerError),

    #[error("watch: {0}")]
    Watch(String),
}

impl RecorderError {
    /// I/O error with the path or action it happened on.
    pub fn io(context: impl std::fmt::Display, source: std::io::Error) -> Self {
        RecorderError::Io { context: context.to_string(), source }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RecorderError::NotFound(_))
    }
}
