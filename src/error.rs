// src/error.rs

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("audio source '{source_name}' failed to initialize: {reason}")]
    SourceInit { source_name: String, reason: String },

    #[error("'{0}' is already running")]
    AlreadyStarted(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to spawn worker thread for '{name}'")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}
