//! Quantization run orchestration
//!
//! [`run_job`] drives a [`QuantizationBackend`] through six steps in a fixed
//! order; the first failure aborts the run and nothing after it executes.

mod backend;
mod error;
mod step;


pub use backend::{HubBackend, QuantizationBackend, QuantizationDirective};
pub use error::{PipelineError, Result};
pub use step::Step;

use std::path::PathBuf;

use crate::cli::{log, LogLevel};
use crate::config::JobConfig;

fn announce(level: LogLevel, step: Step) {
    log(level, LogLevel::Normal, &format!("[{}/{}] {step}...", step.number(), Step::ALL.len()));
}

/// Quantize `job.model_id` and save it to `<model_id>_<bits>bit`
///
/// # Errors
///
/// Returns the first step failure.
pub fn run_job<B: QuantizationBackend>(
    job: &JobConfig,
    backend: &mut B,
    level: LogLevel,
) -> Result<PathBuf> {
    let output_dir = job.output_dir();

    announce(level, Step::LoadTokenizer);
    let tokenizer = backend.load_tokenizer(&job.model_id)?;

    announce(level, Step::BuildDirective);
    let directive = QuantizationDirective::new(backend.quantization_config(job)?, &tokenizer);

    announce(level, Step::LoadModel);
    let mut model = backend.load_quantized(job, &directive)?;

    announce(level, Step::MoveToCpu);
    backend.to_cpu(&mut model)?;

    announce(level, Step::SaveModel);
    backend.save_model(&model, &output_dir)?;

    announce(level, Step::SaveTokenizer);
    backend.save_tokenizer(&tokenizer, &output_dir)?;

    log(level, LogLevel::Normal, &format!("Saved to {}", output_dir.display()));
    Ok(output_dir)
}
