//! YAML job files
//!
//! A job file carries any subset of the five job fields:
//!
//! ```yaml
//! model_id: gpt2
//! bits: 8
//! group_size: 32
//! ```

use std::path::Path;

use super::error::{ConfigError, Result};
use super::job::JobSettings;

/// Load job settings from a YAML file
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable, or contains unknown keys.
pub fn load_job_file(path: &Path) -> Result<JobSettings> {
    if !path.exists() {
        return Err(ConfigError::JobFileNotFound(path.to_path_buf()));
    }
    let contents = std::fs::read_to_string(path)?;
    parse_job_file(&contents).map_err(|message| ConfigError::JobFileParse {
        path: path.to_path_buf(),
        message,
    })
}

/// Parse job settings from YAML text; an empty document yields no settings
pub fn parse_job_file(contents: &str) -> std::result::Result<JobSettings, String> {
    if contents.trim().is_empty() {
        return Ok(JobSettings::default());
    }
    serde_yaml::from_str(contents).map_err(|e| e.to_string())
}
