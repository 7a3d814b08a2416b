//! Error types for Hugging Face Hub operations

use thiserror::Error;

/// Result type for Hub operations
pub type Result<T> = std::result::Result<T, FetchError>;

/// Errors that can occur while resolving models, tokenizers, and datasets
#[derive(Debug, Error)]
pub enum FetchError {
    /// Repository not found
    #[error("Repository not found: {repo}")]
    RepoNotFound { repo: String },

    /// File not found in repository
    #[error("File not found in {repo}: {file}")]
    FileNotFound { repo: String, file: String },

    /// Invalid repository ID format
    #[error("Invalid repository ID format (expected 'name' or 'org/name'): {repo_id}")]
    InvalidRepoId { repo_id: String },

    /// SECURITY: only PyTorch pickle weights are available
    #[error("SECURITY: {repo} only provides PyTorch .bin weights, which may contain arbitrary code. Convert it to safetensors first.")]
    PickleSecurityRisk { repo: String },

    /// Hub client or request failure
    #[error("Hub request failed: {message}")]
    Api { message: String },

    /// Malformed shard index
    #[error("Failed to parse shard index {file}: {message}")]
    IndexParse { file: String, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FetchError {
    /// Check if error is a security concern
    #[must_use]
    pub fn is_security_risk(&self) -> bool {
        matches!(self, Self::PickleSecurityRisk { .. })
    }

    /// Map an hf-hub error for a file download
    pub(crate) fn from_download(repo: &str, file: &str, err: impl std::fmt::Display) -> Self {
        let message = err.to_string();
        if message.contains("404") {
            Self::FileNotFound { repo: repo.to_string(), file: file.to_string() }
        } else if message.contains("401") || message.contains("403") {
            Self::RepoNotFound { repo: repo.to_string() }
        } else {
            Self::Api { message: format!("Download of {file} from {repo} failed: {message}") }
        }
    }
}
