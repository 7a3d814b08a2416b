//! Random fixed-length calibration windows

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::error::{CalibrationError, Result};

/// Sampling parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplingOptions {
    /// Number of windows to draw
    pub nsamples: usize,
    /// Tokens per window
    pub seqlen: usize,
    /// RNG seed
    pub seed: u64,
}

/// Calibration token windows
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CalibrationSet {
    /// One token sequence per sample
    pub samples: Vec<Vec<u32>>,
}

impl CalibrationSet {
    /// Number of samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether there are no samples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Total tokens across all samples
    #[must_use]
    pub fn total_tokens(&self) -> usize {
        self.samples.iter().map(Vec::len).sum()
    }

    /// Occurrences of each token ID across all samples
    #[must_use]
    pub fn token_counts(&self) -> HashMap<u32, usize> {
        let mut counts = HashMap::new();
        for &id in self.samples.iter().flatten() {
            *counts.entry(id).or_insert(0) += 1;
        }
        counts
    }
}

/// Draw `nsamples` windows of `seqlen` tokens at uniform random offsets
///
/// A token stream no longer than one window yields a single window holding
/// every token.
///
/// # Errors
///
/// Returns an error if `nsamples` or `seqlen` is zero.
pub fn sample_windows(tokens: &[u32], options: SamplingOptions) -> Result<CalibrationSet> {
    check_options(options)?;
    if tokens.len() <= options.seqlen {
        return Ok(CalibrationSet { samples: vec![tokens.to_vec()] });
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let last_start = tokens.len() - options.seqlen - 1;
    let samples = (0..options.nsamples)
        .map(|_| {
            let start = rng.random_range(0..=last_start);
            tokens[start..start + options.seqlen].to_vec()
        })
        .collect();
    Ok(CalibrationSet { samples })
}

/// Consecutive rejected draws before document sampling gives up
pub const MAX_DOCUMENT_DRAWS: usize = 10_000;

/// Draw `nsamples` random documents longer than `seqlen` tokens and cut one
/// random `seqlen` window from each
///
/// # Errors
///
/// Returns an error if `nsamples` or `seqlen` is zero, encoding fails, or
/// [`MAX_DOCUMENT_DRAWS`] draws in a row find no long enough document.
pub fn sample_documents<S, F>(
    documents: &[S],
    mut encode: F,
    options: SamplingOptions,
) -> Result<CalibrationSet>
where
    S: AsRef<str>,
    F: FnMut(&str) -> Result<Vec<u32>>,
{
    check_options(options)?;
    let no_documents = || CalibrationError::NoLongDocuments { seqlen: options.seqlen, draws: 0 };
    if documents.is_empty() {
        return Err(no_documents());
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut samples = Vec::with_capacity(options.nsamples);
    while samples.len() < options.nsamples {
        let mut draws = 0;
        let tokens = loop {
            if draws == MAX_DOCUMENT_DRAWS {
                return Err(CalibrationError::NoLongDocuments { seqlen: options.seqlen, draws });
            }
            draws += 1;
            let document = &documents[rng.random_range(0..documents.len())];
            let tokens = encode(document.as_ref())?;
            if tokens.len() > options.seqlen {
                break tokens;
            }
        };
        let start = rng.random_range(0..tokens.len() - options.seqlen);
        samples.push(tokens[start..start + options.seqlen].to_vec());
    }
    Ok(CalibrationSet { samples })
}

fn check_options(options: SamplingOptions) -> Result<()> {
    if options.nsamples == 0 {
        return Err(CalibrationError::InvalidSampling("nsamples"));
    }
    if options.seqlen == 0 {
        return Err(CalibrationError::InvalidSampling("seqlen"));
    }
    Ok(())
}
