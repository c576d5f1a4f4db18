//! Error types for scribeq.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScribeqError {
    // Input validation errors (reported before any worker is spawned)
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Unsupported file format: {extension}")]
    UnsupportedFormat { extension: String },

    // Worker process errors
    #[error("Failed to spawn worker: {message}")]
    Spawn { message: String },

    #[error("Worker protocol error: {message}")]
    Protocol { message: String },

    // Job lifecycle errors
    #[error("No such job: {id}")]
    JobNotFound { id: String },

    #[error("A job is already running: {id}")]
    JobAlreadyRunning { id: String },

    // Transcript invariant violations (ingestion boundaries)
    #[error("Invalid transcript: {message}")]
    InvalidTranscript { message: String },

    // Storage errors
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Transcript not found in storage: {id}")]
    TranscriptNotFound { id: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ScribeqError>;
