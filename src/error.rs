use thiserror::Error;

/// Recorder error types
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Recording already in progress")]
    AlreadyRecording,

    #[error("No recording in progress")]
    NotRecording,

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Metadata serialization failed: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("Keep-alive error: {0}")]
    KeepAlive(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for recorder operations
pub type Result<T> = std::result::Result<T, RecorderError>;
