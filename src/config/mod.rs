//! Job configuration
//!
//! Command-line parsing, YAML job files, and resolution of the five job
//! fields against the compiled-in defaults.
//!
//! # Usage
//!
//! ```bash
//! cuantizar
//! cuantizar --model_id gpt2 --bits 8 --group_size 32
//! cuantizar --config job.yaml --device_map cpu
//! ```

mod cli;
mod device;
mod error;
mod file;
mod job;

pub use cli::{parse_args, Cli};
pub use device::{Device, DeviceMap};
pub use error::{ConfigError, Result};
pub use file::{load_job_file, parse_job_file};
pub use job::{
    effective_group_size, JobConfig, JobSettings, RunOptions, DEFAULT_BITS, DEFAULT_DAMP_PERCENT,
    DEFAULT_DATASET, DEFAULT_DEVICE_MAP, DEFAULT_GROUP_SIZE, DEFAULT_MODEL_ID, DEFAULT_NSAMPLES,
    DEFAULT_REVISION, DEFAULT_SEED, SUPPORTED_BITS,
};

/// Resolve the job and run options for a parsed command line
///
/// # Errors
///
/// Returns an error if the job file cannot be loaded or resolution fails.
pub fn resolve_cli(cli: &Cli) -> Result<(JobConfig, RunOptions)> {
    resolve_cli_with_defaults(cli, &JobSettings::builtin())
}

/// Resolve against explicit defaults (used to force missing settings in tests)
///
/// # Errors
///
/// Returns an error if the job file cannot be loaded or resolution fails.
pub fn resolve_cli_with_defaults(
    cli: &Cli,
    defaults: &JobSettings,
) -> Result<(JobConfig, RunOptions)> {
    let file = cli.config.as_deref().map(load_job_file).transpose()?;
    let job = JobConfig::resolve(&JobSettings::from_cli(cli), file.as_ref(), defaults)?;
    let options = RunOptions::from_cli(cli)?;
    Ok((job, options))
}
