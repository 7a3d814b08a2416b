//! Tokenizer error types.

use thiserror::Error;

/// Tokenizer errors
#[derive(Debug, Error)]
pub enum TokenizerError {
    #[error("Failed to load tokenizer from {path}: {message}")]
    Load { path: String, message: String },

    #[error("Failed to encode text: {0}")]
    Encode(String),

    #[error("Failed to save tokenizer: {0}")]
    Save(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for tokenizer operations
pub type Result<T> = std::result::Result<T, TokenizerError>;
