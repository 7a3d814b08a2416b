//! `config.json` handling

use std::path::Path;

use serde_json::{Map, Value};

use super::error::{ModelError, Result};
use crate::quant::{GptqConfig, MAX_MODEL_SEQLEN};

/// Keys holding the maximum sequence length, in lookup order
const MAX_POSITION_KEYS: [&str; 3] = ["max_position_embeddings", "n_positions", "seq_length"];

/// Keys holding the hidden size, in lookup order
const HIDDEN_SIZE_KEYS: [&str; 3] = ["hidden_size", "n_embd", "d_model"];

/// A model's `config.json`, kept verbatim for re-serialization
#[derive(Clone, Debug, PartialEq)]
pub struct ModelConfig {
    raw: Map<String, Value>,
}

impl ModelConfig {
    /// Read `config.json`
    ///
    /// # Errors
    ///
    /// Returns error if the file is unreadable or not a JSON object.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Parse a `config.json` document
    ///
    /// # Errors
    ///
    /// Returns error if the document is not a JSON object.
    pub fn from_json(json: &str) -> Result<Self> {
        match serde_json::from_str(json)? {
            Value::Object(raw) => Ok(Self { raw }),
            _ => Err(ModelError::InvalidConfig),
        }
    }

    fn usize_field(&self, keys: &[&str]) -> Option<usize> {
        keys.iter()
            .find_map(|key| self.raw.get(*key).and_then(Value::as_u64))
            .and_then(|v| usize::try_from(v).ok())
    }

    /// `model_type`, e.g. `llama` or `gpt2`
    #[must_use]
    pub fn model_type(&self) -> Option<&str> {
        self.raw.get("model_type").and_then(Value::as_str)
    }

    /// Hidden size
    #[must_use]
    pub fn hidden_size(&self) -> Option<usize> {
        self.usize_field(&HIDDEN_SIZE_KEYS)
    }

    /// Maximum positions the model was trained with
    #[must_use]
    pub fn max_positions(&self) -> Option<usize> {
        self.usize_field(&MAX_POSITION_KEYS)
    }

    /// Calibration window length: the model's positions capped at 2048
    #[must_use]
    pub fn model_seqlen(&self) -> usize {
        self.max_positions().unwrap_or(MAX_MODEL_SEQLEN).clamp(1, MAX_MODEL_SEQLEN)
    }

    /// Whether linear weights are stored `[in, out]` (GPT-2 `Conv1D`)
    #[must_use]
    pub fn uses_conv1d(&self) -> bool {
        self.model_type() == Some("gpt2")
    }

    /// The config to save next to quantized weights
    ///
    /// # Errors
    ///
    /// Returns error if the directive cannot be serialized.
    pub fn with_quantization(&self, quantization: &GptqConfig) -> Result<Value> {
        let mut raw = self.raw.clone();
        raw.insert("quantization_config".to_string(), serde_json::to_value(quantization)?);
        raw.insert("torch_dtype".to_string(), Value::String("float16".to_string()));
        Ok(Value::Object(raw))
    }
}
