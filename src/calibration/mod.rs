//! GPTQ calibration data
//!
//! Turns a dataset name into tokenized calibration windows:
//! - Resolve the name (`wikitext2`, `c4` or a local text file)
//! - Load the raw text, or the documents for `c4`
//! - Tokenize and sample fixed-length windows with a seeded RNG

mod dataset;
mod error;
mod sampler;
mod text;


pub use dataset::{
    join_wikitext_rows, CalibrationSource, C4_REPO, C4_TRAIN_FILE, WIKITEXT2_ROWS,
    WIKITEXT2_TRAIN_FILE, WIKITEXT_REPO,
};
pub use error::{CalibrationError, Result};
pub use sampler::{
    sample_documents, sample_windows, CalibrationSet, SamplingOptions, MAX_DOCUMENT_DRAWS,
};
pub use text::{load_corpus, read_json_lines_gz, read_text_column, CalibrationCorpus};

use crate::hub::{FetchOptions, HfHubFetcher};
use crate::tokenizer::AutoTokenizer;

/// Resolve, load, tokenize, and sample a calibration dataset
///
/// # Errors
///
/// Returns error if the dataset is unknown or unavailable, or tokenization fails.
pub fn prepare_calibration(
    dataset: &str,
    tokenizer: &AutoTokenizer,
    fetcher: &HfHubFetcher,
    fetch_options: &FetchOptions,
    sampling: SamplingOptions,
) -> Result<CalibrationSet> {
    let source = CalibrationSource::from_name(dataset)?;
    match load_corpus(&source, fetcher, fetch_options)? {
        CalibrationCorpus::Text(text) => sample_windows(&tokenizer.encode(&text)?, sampling),
        CalibrationCorpus::Documents(documents) => {
            sample_documents(&documents, |document| Ok(tokenizer.encode(document)?), sampling)
        }
    }
}
