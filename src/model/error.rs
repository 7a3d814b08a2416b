//! Error types for model loading and saving

use std::path::PathBuf;

use thiserror::Error;

use crate::quant::QuantError;

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors raised while reading, quantizing, or writing a checkpoint
#[derive(Debug, Error)]
pub enum ModelError {
    /// `config.json` is not a JSON object
    #[error("config.json must be a JSON object")]
    InvalidConfig,

    /// Malformed safetensors header
    #[error("Invalid safetensors header in {path}: {message}")]
    Header { path: PathBuf, message: String },

    /// Safetensors (de)serialization failure
    #[error("SafeTensors error: {0}")]
    SafeTensors(String),

    /// Tensor dtype that cannot be read as floats
    #[error("Tensor {name} has unsupported dtype {dtype}")]
    UnsupportedDtype { name: String, dtype: String },

    /// Tensor shape does not match what the layer plan expects
    #[error("Tensor {name}: {message}")]
    Shape { name: String, message: String },

    /// Tensor listed in a header but absent from its shard
    #[error("Tensor {0} not found in any shard")]
    MissingTensor(String),

    /// Quantization failure
    #[error(transparent)]
    Quant(#[from] QuantError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<safetensors::SafeTensorError> for ModelError {
    fn from(err: safetensors::SafeTensorError) -> Self {
        Self::SafeTensors(err.to_string())
    }
}
