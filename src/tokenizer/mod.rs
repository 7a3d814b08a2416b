//! Pretrained tokenizers
//!
//! Loads Hugging Face `tokenizer.json` files through the `tokenizers` crate,
//! encodes calibration text, and writes the tokenizer next to the quantized
//! weights.
//!
//! # Example
//!
//! ```rust,ignore
//! use cuantizar::tokenizer::AutoTokenizer;
//!
//! let tokenizer = AutoTokenizer::from_file("path/to/tokenizer.json")?;
//! let ids = tokenizer.encode("Hello, world!")?;
//! tokenizer.save_pretrained("out_4bit")?;
//! ```

mod error;


use std::path::{Path, PathBuf};

use crate::hub::{TokenizerFiles, TOKENIZER_FILE};

pub use error::{Result, TokenizerError};

/// `tokenizer_config.json` written when the source repository has none
const FALLBACK_TOKENIZER_CONFIG: &str = r#"{"tokenizer_class": "PreTrainedTokenizerFast"}"#;

/// Tokenizer loaded from a pretrained model
#[derive(Clone)]
pub struct AutoTokenizer {
    inner: tokenizers::Tokenizer,
    /// `tokenizer_config.json` and friends, copied verbatim on save
    side_files: Vec<PathBuf>,
}

impl std::fmt::Debug for AutoTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoTokenizer")
            .field("vocab_size", &self.vocab_size())
            .field("side_files", &self.side_files)
            .finish()
    }
}

impl AutoTokenizer {
    /// Load from a `tokenizer.json` file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let inner = tokenizers::Tokenizer::from_file(path).map_err(|e| TokenizerError::Load {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { inner, side_files: Vec::new() })
    }

    /// Load from resolved Hub files, keeping the side files for saving
    ///
    /// # Errors
    /// Returns error if `tokenizer.json` cannot be parsed.
    pub fn from_files(files: &TokenizerFiles) -> Result<Self> {
        let mut tokenizer = Self::from_file(&files.tokenizer)?;
        tokenizer.side_files = files.side_files.clone();
        Ok(tokenizer)
    }

    /// Vocabulary size including added tokens
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }

    /// Look up a token ID
    #[must_use]
    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.inner.token_to_id(token)
    }

    /// Encode text to token IDs, adding the model's special tokens
    ///
    /// # Errors
    /// Returns error if the tokenizer pipeline fails.
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding =
            self.inner.encode(text, true).map_err(|e| TokenizerError::Encode(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Write `tokenizer.json` and the side files into `dir`
    ///
    /// # Errors
    /// Returns error if the directory cannot be created or a file cannot be written.
    pub fn save_pretrained(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let tokenizer_path = dir.join(TOKENIZER_FILE);
        self.inner.save(&tokenizer_path, false).map_err(|e| TokenizerError::Save(e.to_string()))?;
        let mut written = vec![tokenizer_path];

        for side in &self.side_files {
            let Some(name) = side.file_name() else { continue };
            let dest = dir.join(name);
            if *side != dest {
                std::fs::copy(side, &dest)?;
            }
            written.push(dest);
        }

        let config_path = dir.join("tokenizer_config.json");
        if !config_path.exists() {
            std::fs::write(&config_path, FALLBACK_TOKENIZER_CONFIG)?;
            written.push(config_path);
        }

        Ok(written)
    }
}
