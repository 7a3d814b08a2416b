//! Configuration error types
//!
//! Defines the errors raised while resolving a quantization job.

use std::path::PathBuf;

/// Configuration error type
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Not all settings are provided. Use --help for more information.")]
    MissingSettings { fields: Vec<&'static str> },

    #[error("Invalid quantization bits: {0} (must be one of 2, 3, 4, 8)")]
    InvalidBits(u8),

    #[error("Invalid group size: {0} (must be > 0, or -1 for one group per row)")]
    InvalidGroupSize(i32),

    #[error("Invalid device map '{0}' (expected auto, balanced, balanced_low_0, sequential, cpu, mps, disk, cuda, cuda:N or N)")]
    InvalidDeviceMap(String),

    #[error("Invalid damp percent: {0} (must be in (0.0, 1.0))")]
    InvalidDampPercent(f32),

    #[error("Invalid number of calibration samples: {0} (must be > 0)")]
    InvalidSampleCount(usize),

    #[error("Job file not found: {}", .0.display())]
    JobFileNotFound(PathBuf),

    #[error("Failed to parse job file {}: {message}", .path.display())]
    JobFileParse { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Names of the settings that were left empty, if this is a missing-settings error
    #[must_use]
    pub fn missing_fields(&self) -> &[&'static str] {
        match self {
            Self::MissingSettings { fields } => fields,
            _ => &[],
        }
    }
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
