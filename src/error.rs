//! Error types for the engagement engine

use thiserror::Error;

/// Errors that can occur around a capture session or its results
#[derive(Debug, Error)]
pub enum EngageError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid session state: {0}")]
    InvalidSessionState(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to save result: {0}")]
    Persistence(String),
}
