//! Type definitions for Hub artifacts.

use std::collections::BTreeSet;
use std::path::PathBuf;

use super::error::{FetchError, Result};

/// Single-file safetensors weights
pub const SAFETENSORS_FILE: &str = "model.safetensors";
/// Shard index for sharded safetensors weights
pub const SAFETENSORS_INDEX_FILE: &str = "model.safetensors.index.json";
/// Model configuration
pub const CONFIG_FILE: &str = "config.json";
/// Optional generation defaults
pub const GENERATION_CONFIG_FILE: &str = "generation_config.json";
/// Serialized tokenizer
pub const TOKENIZER_FILE: &str = "tokenizer.json";
/// Optional tokenizer side files saved next to `tokenizer.json`
pub const TOKENIZER_SIDE_FILES: [&str; 2] = ["tokenizer_config.json", "special_tokens_map.json"];

/// Model weight format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightFormat {
    /// SafeTensors format (recommended, secure)
    SafeTensors,
    /// PyTorch pickle format (SECURITY RISK)
    PyTorchBin,
}

impl WeightFormat {
    /// Detect format from filename
    #[must_use]
    pub fn from_filename(filename: &str) -> Option<Self> {
        if filename.ends_with(".safetensors") {
            Some(Self::SafeTensors)
        } else if filename.ends_with(".bin") {
            Some(Self::PyTorchBin)
        } else {
            None
        }
    }

    /// Check if format is safe (no arbitrary code execution)
    #[must_use]
    pub fn is_safe(&self) -> bool {
        matches!(self, Self::SafeTensors)
    }
}

/// Layout of the weight files in a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightLayout {
    /// One `model.safetensors`
    Single,
    /// `model.safetensors.index.json` plus shards
    Sharded,
}

/// Choose the weight layout from a repository file listing
///
/// # Errors
///
/// Returns [`FetchError::PickleSecurityRisk`] when only `.bin` weights exist and
/// [`FetchError::FileNotFound`] when there are no weights at all.
pub fn select_weight_layout(repo: &str, files: &[String]) -> Result<WeightLayout> {
    if files.iter().any(|f| f == SAFETENSORS_INDEX_FILE) {
        return Ok(WeightLayout::Sharded);
    }
    if files.iter().any(|f| f == SAFETENSORS_FILE) {
        return Ok(WeightLayout::Single);
    }
    let has_pickle = files
        .iter()
        .filter_map(|f| WeightFormat::from_filename(f))
        .any(|format| !format.is_safe());
    if has_pickle {
        return Err(FetchError::PickleSecurityRisk { repo: repo.to_string() });
    }
    Err(FetchError::FileNotFound { repo: repo.to_string(), file: SAFETENSORS_FILE.to_string() })
}

/// Shard file names referenced by a safetensors index, sorted and deduplicated
///
/// # Errors
///
/// Returns an error if the index is not JSON or has no `weight_map` object.
pub fn parse_shard_index(json: &str) -> Result<Vec<String>> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let map = value.get("weight_map").and_then(|m| m.as_object()).ok_or_else(|| {
        FetchError::IndexParse {
            file: SAFETENSORS_INDEX_FILE.to_string(),
            message: "missing weight_map".to_string(),
        }
    })?;

    let mut shards = BTreeSet::new();
    for (tensor, file) in map {
        let file = file.as_str().ok_or_else(|| FetchError::IndexParse {
            file: SAFETENSORS_INDEX_FILE.to_string(),
            message: format!("shard for {tensor} is not a string"),
        })?;
        shards.insert(file.to_string());
    }
    Ok(shards.into_iter().collect())
}

/// Resolved model files on local disk
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    /// Repository ID or local directory the files came from
    pub source: String,
    /// `config.json`
    pub config: PathBuf,
    /// Safetensors weight files in shard order
    pub weights: Vec<PathBuf>,
    /// `generation_config.json`, if the repository has one
    pub generation_config: Option<PathBuf>,
}

/// Resolved tokenizer files on local disk
#[derive(Debug, Clone)]
pub struct TokenizerFiles {
    /// `tokenizer.json`
    pub tokenizer: PathBuf,
    /// Side files present in the repository
    pub side_files: Vec<PathBuf>,
}
