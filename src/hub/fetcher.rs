//! Hugging Face Hub fetcher implementation.
//!
//! Resolves model, tokenizer, and dataset files through the hf-hub sync API.
//! A model identifier naming an existing local directory is served from disk.

use std::path::{Path, PathBuf};

use super::error::{FetchError, Result};
use super::options::FetchOptions;
use super::types::{
    parse_shard_index, select_weight_layout, ModelArtifact, TokenizerFiles, WeightLayout,
    CONFIG_FILE, GENERATION_CONFIG_FILE, SAFETENSORS_FILE, SAFETENSORS_INDEX_FILE,
    TOKENIZER_FILE, TOKENIZER_SIDE_FILES,
};

/// Hugging Face Hub fetcher
pub struct HfHubFetcher {
    /// Authentication token
    pub(crate) token: Option<String>,
    /// Cache directory
    pub(crate) cache_dir: PathBuf,
}

/// Where a repository's files come from
enum RepoSource {
    Local(PathBuf),
    Hub(hf_hub::api::sync::ApiRepo),
}

impl HfHubFetcher {
    /// Create new fetcher using the HF_TOKEN environment variable
    #[must_use]
    pub fn new() -> Self {
        Self { token: Self::resolve_token(), cache_dir: Self::default_cache_dir() }
    }

    /// Create fetcher with explicit token
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self { token: Some(token.into()), cache_dir: Self::default_cache_dir() }
    }

    /// Resolve token from multiple sources
    ///
    /// Priority:
    /// 1. HF_TOKEN environment variable
    /// 2. ~/.huggingface/token file
    #[must_use]
    pub fn resolve_token() -> Option<String> {
        if let Ok(token) = std::env::var("HF_TOKEN") {
            if !token.is_empty() {
                return Some(token);
            }
        }

        if let Some(home) = dirs::home_dir() {
            let token_path = home.join(".huggingface").join("token");
            if let Ok(token) = std::fs::read_to_string(token_path) {
                let token = token.trim().to_string();
                if !token.is_empty() {
                    return Some(token);
                }
            }
        }

        None
    }

    /// Get default cache directory
    pub(crate) fn default_cache_dir() -> PathBuf {
        dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".cache")).join("huggingface").join("hub")
    }

    /// Check if client has authentication
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Validate a repository ID: `name` or `org/name`
    pub(crate) fn parse_repo_id(repo_id: &str) -> Result<()> {
        let parts: Vec<&str> = repo_id.split('/').collect();
        let valid = match parts.as_slice() {
            [name] => !name.is_empty(),
            [org, name] => !org.is_empty() && !name.is_empty(),
            _ => false,
        };
        if valid {
            Ok(())
        } else {
            Err(FetchError::InvalidRepoId { repo_id: repo_id.to_string() })
        }
    }

    /// Local directory for a model identifier, if one exists on disk
    #[must_use]
    pub fn local_dir(model_id: &str) -> Option<PathBuf> {
        let path = Path::new(model_id);
        path.is_dir().then(|| path.to_path_buf())
    }

    /// Build the hf-hub sync API client with optional authentication.
    fn build_api(&self, options: &FetchOptions) -> Result<hf_hub::api::sync::Api> {
        let cache = options.cache_dir.clone().unwrap_or_else(|| self.cache_dir.clone());
        let mut api_builder = hf_hub::api::sync::ApiBuilder::new().with_cache_dir(cache);

        if let Some(token) = &self.token {
            api_builder = api_builder.with_token(Some(token.clone()));
        }

        api_builder
            .build()
            .map_err(|e| FetchError::Api { message: format!("Failed to initialize HF API: {e}") })
    }

    fn open(
        &self,
        repo_id: &str,
        repo_type: hf_hub::RepoType,
        options: &FetchOptions,
    ) -> Result<RepoSource> {
        if matches!(repo_type, hf_hub::RepoType::Model) {
            if let Some(dir) = Self::local_dir(repo_id) {
                return Ok(RepoSource::Local(dir));
            }
        }
        Self::parse_repo_id(repo_id)?;
        let api = self.build_api(options)?;
        Ok(RepoSource::Hub(api.repo(hf_hub::Repo::with_revision(
            repo_id.to_string(),
            repo_type,
            options.revision.clone(),
        ))))
    }

    fn list_files(source: &RepoSource, repo_id: &str) -> Result<Vec<String>> {
        match source {
            RepoSource::Local(dir) => {
                let mut files = Vec::new();
                for entry in std::fs::read_dir(dir)? {
                    let entry = entry?;
                    if entry.file_type()?.is_file() {
                        files.push(entry.file_name().to_string_lossy().into_owned());
                    }
                }
                files.sort();
                Ok(files)
            }
            RepoSource::Hub(repo) => {
                let info = repo.info().map_err(|e| {
                    let message = e.to_string();
                    if message.contains("404") || message.contains("401") {
                        FetchError::RepoNotFound { repo: repo_id.to_string() }
                    } else {
                        FetchError::Api { message: format!("Failed to list {repo_id}: {message}") }
                    }
                })?;
                Ok(info.siblings.into_iter().map(|s| s.rfilename).collect())
            }
        }
    }

    fn get(source: &RepoSource, repo_id: &str, file: &str) -> Result<PathBuf> {
        match source {
            RepoSource::Local(dir) => {
                let path = dir.join(file);
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(FetchError::FileNotFound {
                        repo: repo_id.to_string(),
                        file: file.to_string(),
                    })
                }
            }
            RepoSource::Hub(repo) => {
                repo.get(file).map_err(|e| FetchError::from_download(repo_id, file, e))
            }
        }
    }

    /// Resolve config and safetensors weights for a model
    ///
    /// # Errors
    ///
    /// Returns error if the repository is missing, only has pickle weights, or a
    /// download fails.
    pub fn fetch_model(&self, model_id: &str, options: &FetchOptions) -> Result<ModelArtifact> {
        let source = self.open(model_id, hf_hub::RepoType::Model, options)?;
        let files = Self::list_files(&source, model_id)?;

        let config = Self::get(&source, model_id, CONFIG_FILE)?;
        let weights = match select_weight_layout(model_id, &files)? {
            WeightLayout::Single => vec![Self::get(&source, model_id, SAFETENSORS_FILE)?],
            WeightLayout::Sharded => {
                let index = Self::get(&source, model_id, SAFETENSORS_INDEX_FILE)?;
                let shards = parse_shard_index(&std::fs::read_to_string(index)?)?;
                shards
                    .iter()
                    .map(|shard| Self::get(&source, model_id, shard))
                    .collect::<Result<Vec<_>>>()?
            }
        };
        let generation_config = if files.iter().any(|f| f == GENERATION_CONFIG_FILE) {
            Some(Self::get(&source, model_id, GENERATION_CONFIG_FILE)?)
        } else {
            None
        };

        Ok(ModelArtifact { source: model_id.to_string(), config, weights, generation_config })
    }

    /// Resolve tokenizer files for a model
    ///
    /// # Errors
    ///
    /// Returns error if `tokenizer.json` is unavailable.
    pub fn fetch_tokenizer(&self, model_id: &str, options: &FetchOptions) -> Result<TokenizerFiles> {
        let source = self.open(model_id, hf_hub::RepoType::Model, options)?;
        let files = Self::list_files(&source, model_id)?;

        let tokenizer = Self::get(&source, model_id, TOKENIZER_FILE)?;
        let side_files = TOKENIZER_SIDE_FILES
            .iter()
            .filter(|name| files.iter().any(|f| f == *name))
            .map(|name| Self::get(&source, model_id, name))
            .collect::<Result<Vec<_>>>()?;

        Ok(TokenizerFiles { tokenizer, side_files })
    }

    /// Download one file from a dataset repository
    ///
    /// # Errors
    ///
    /// Returns error if the dataset or file is unavailable.
    pub fn fetch_dataset_file(
        &self,
        dataset_id: &str,
        file: &str,
        options: &FetchOptions,
    ) -> Result<PathBuf> {
        let source = self.open(dataset_id, hf_hub::RepoType::Dataset, options)?;
        Self::get(&source, dataset_id, file)
    }
}

impl Default for HfHubFetcher {
    fn default() -> Self {
        Self::new()
    }
}
