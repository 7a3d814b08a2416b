//! Error types for GPTQ quantization

use thiserror::Error;

/// Result type for quantization operations
pub type Result<T> = std::result::Result<T, QuantError>;

/// Errors raised while configuring or running GPTQ
#[derive(Debug, Error)]
pub enum QuantError {
    /// Bit width the packer cannot lay out
    #[error("Unsupported bit width: {0} (expected 2, 3, 4 or 8)")]
    UnsupportedBits(u8),

    /// Group size is zero or below -1
    #[error("Invalid group size: {0} (expected a positive size or -1)")]
    InvalidGroupSize(i32),

    /// Dampening outside (0, 1)
    #[error("Invalid damp_percent: {0} (expected a value in (0, 1))")]
    InvalidDamping(f32),

    /// Calibration sample count of zero
    #[error("nsamples must be positive")]
    InvalidSampleCount,

    /// Matrix dimensions do not line up
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// Layer dimensions cannot be packed at this bit width
    #[error("Cannot pack {rows}x{cols} at {bits} bits: dimensions must fill whole 32-bit words")]
    Unpackable { rows: usize, cols: usize, bits: u8 },

    /// Cholesky factorization hit a non-positive pivot
    #[error("Hessian is not positive definite (pivot {column}); increase damp_percent")]
    NotPositiveDefinite { column: usize },
}
