//! Calibration dataset names
//!
//! Resolves the `--dataset` value to a text source.

use std::fmt;
use std::path::{Path, PathBuf};

use super::error::{CalibrationError, Result};

/// Hub dataset repository holding WikiText
pub const WIKITEXT_REPO: &str = "Salesforce/wikitext";
/// Train split of WikiText-2 (raw) inside [`WIKITEXT_REPO`]
pub const WIKITEXT2_TRAIN_FILE: &str = "wikitext-2-raw-v1/train-00000-of-00001.parquet";
/// Rows of WikiText-2 used for calibration
pub const WIKITEXT2_ROWS: usize = 1000;
/// Hub dataset repository holding C4
pub const C4_REPO: &str = "allenai/c4";
/// First English train shard of [`C4_REPO`], gzipped JSON lines
pub const C4_TRAIN_FILE: &str = "en/c4-train.00000-of-01024.json.gz";

/// Where calibration text comes from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CalibrationSource {
    /// WikiText-2 raw train split from the Hub
    WikiText2,
    /// Documents of the first C4 English train shard
    C4,
    /// A local UTF-8 text file
    LocalText(PathBuf),
}

impl CalibrationSource {
    /// Resolve a dataset name
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::UnsupportedDataset`] for names that are neither
    /// a known dataset nor an existing file.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "wikitext2" | "wikitext-2" => Ok(Self::WikiText2),
            "c4" | "c4-new" => Ok(Self::C4),
            _ => {
                let path = Path::new(name);
                if path.is_file() {
                    Ok(Self::LocalText(path.to_path_buf()))
                } else {
                    Err(CalibrationError::UnsupportedDataset(name.to_string()))
                }
            }
        }
    }
}

impl fmt::Display for CalibrationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WikiText2 => write!(f, "wikitext2"),
            Self::C4 => write!(f, "c4"),
            Self::LocalText(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Join WikiText rows into one calibration text
///
/// Empty rows become `" \n"`; the first [`WIKITEXT2_ROWS`] rows are used.
#[must_use]
pub fn join_wikitext_rows<S: AsRef<str>>(rows: &[S]) -> String {
    rows.iter()
        .take(WIKITEXT2_ROWS)
        .map(|row| if row.as_ref().is_empty() { " \n" } else { row.as_ref() })
        .collect()
}
