//! Pipeline error type

use thiserror::Error;

use crate::calibration::CalibrationError;
use crate::config::ConfigError;
use crate::hub::FetchError;
use crate::model::ModelError;
use crate::quant::QuantError;
use crate::tokenizer::TokenizerError;

/// Result type for pipeline steps
pub type Result<T> = std::result::Result<T, PipelineError>;

/// First failure of a quantization run
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Job resolution failed
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Hub resolution or download failed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Tokenizer load or save failed
    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),

    /// Calibration data could not be prepared
    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    /// Quantization directive or solver failed
    #[error(transparent)]
    Quant(#[from] QuantError),

    /// Model load or save failed
    #[error(transparent)]
    Model(#[from] ModelError),
}
