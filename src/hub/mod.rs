//! Hugging Face Hub access
//!
//! Resolves model weights, tokenizers, and calibration datasets from the Hub
//! with authentication and caching. Local model directories are accepted
//! wherever a repository ID is.

mod error;
mod fetcher;
mod options;
mod types;

#[cfg(test)]
mod tests;

pub use error::{FetchError, Result};
pub use fetcher::HfHubFetcher;
pub use options::FetchOptions;
pub use types::{
    parse_shard_index, select_weight_layout, ModelArtifact, TokenizerFiles, WeightFormat,
    WeightLayout, CONFIG_FILE, GENERATION_CONFIG_FILE, SAFETENSORS_FILE, SAFETENSORS_INDEX_FILE,
    TOKENIZER_FILE, TOKENIZER_SIDE_FILES,
};
