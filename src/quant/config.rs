//! GPTQ quantization directive

use serde::{Deserialize, Serialize};

use super::error::{QuantError, Result};

/// Bit widths the packer supports
pub const PACKABLE_BITS: [u8; 4] = [2, 3, 4, 8];

/// Upper bound on calibration window length
pub const MAX_MODEL_SEQLEN: usize = 2048;

/// GPTQ quantization settings
///
/// Serialized verbatim under `quantization_config` in the saved `config.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GptqConfig {
    /// Always `"gptq"`
    pub quant_method: String,
    /// Bits per weight
    pub bits: u8,
    /// Columns sharing one scale and zero point; -1 for one group per row
    pub group_size: i32,
    /// Calibration dataset name
    pub dataset: String,
    /// Fraction of the mean Hessian diagonal added as dampening
    pub damp_percent: f32,
    /// Quantize columns in order of decreasing activation
    pub desc_act: bool,
    /// Symmetric quantization grid
    pub sym: bool,
    /// Quantize sub-layers of a block one after another
    pub true_sequential: bool,
    /// Calibration windows
    pub nsamples: usize,
    /// Tokens per calibration window
    pub model_seqlen: Option<usize>,
    /// Calibration sampling seed
    pub seed: u64,
    /// On-disk packing format
    pub checkpoint_format: String,
}

impl GptqConfig {
    /// Create a directive with GPTQ defaults for everything but the three job fields
    ///
    /// # Errors
    ///
    /// Returns an error if `bits` cannot be packed or `group_size` is invalid.
    pub fn new(bits: u8, dataset: impl Into<String>, group_size: i32) -> Result<Self> {
        let config = Self {
            quant_method: "gptq".to_string(),
            bits,
            group_size,
            dataset: dataset.into(),
            damp_percent: 0.1,
            desc_act: false,
            sym: true,
            true_sequential: true,
            nsamples: 128,
            model_seqlen: None,
            seed: 0,
            checkpoint_format: "gptq".to_string(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Set dampening
    #[must_use]
    pub fn damp_percent(mut self, damp_percent: f32) -> Self {
        self.damp_percent = damp_percent;
        self
    }

    /// Set calibration sample count
    #[must_use]
    pub fn nsamples(mut self, nsamples: usize) -> Self {
        self.nsamples = nsamples;
        self
    }

    /// Set calibration seed
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set window length, capped at [`MAX_MODEL_SEQLEN`]
    #[must_use]
    pub fn model_seqlen(mut self, seqlen: usize) -> Self {
        self.model_seqlen = Some(seqlen.min(MAX_MODEL_SEQLEN));
        self
    }

    /// Window length in effect
    #[must_use]
    pub fn seqlen(&self) -> usize {
        self.model_seqlen.unwrap_or(MAX_MODEL_SEQLEN)
    }

    /// Largest quantized integer
    #[must_use]
    pub fn maxq(&self) -> u32 {
        (1u32 << self.bits) - 1
    }

    /// Check every field
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if !PACKABLE_BITS.contains(&self.bits) {
            return Err(QuantError::UnsupportedBits(self.bits));
        }
        if self.group_size == 0 || self.group_size < -1 {
            return Err(QuantError::InvalidGroupSize(self.group_size));
        }
        if !(self.damp_percent > 0.0 && self.damp_percent < 1.0) {
            return Err(QuantError::InvalidDamping(self.damp_percent));
        }
        if self.nsamples == 0 {
            return Err(QuantError::InvalidSampleCount);
        }
        Ok(())
    }

    /// The `quantize_config.json` document
    #[must_use]
    pub fn quantize_config(&self) -> serde_json::Value {
        serde_json::json!({
            "bits": self.bits,
            "group_size": self.group_size,
            "damp_percent": self.damp_percent,
            "desc_act": self.desc_act,
            "static_groups": false,
            "sym": self.sym,
            "true_sequential": self.true_sequential,
            "model_name_or_path": null,
            "model_file_base_name": "model",
            "quant_method": self.quant_method,
            "checkpoint_format": self.checkpoint_format,
        })
    }
}
