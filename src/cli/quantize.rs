//! Quantize command implementation

use std::path::PathBuf;

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::{resolve_cli_with_defaults, Cli, JobConfig, JobSettings, RunOptions};
use crate::pipeline::{run_job, HubBackend, QuantizationBackend};

/// Resolve the job from the command line and run it against the Hub
pub fn run_quantize(cli: &Cli, level: LogLevel) -> Result<(), String> {
    execute(cli, &JobSettings::builtin(), level, |options| HubBackend::new(options, level))
        .map(|_| ())
}

/// Resolve against `defaults`, then build a backend and run
///
/// Nothing is constructed or loaded when resolution fails. Returns the output
/// directory, or `None` for a dry run.
pub(crate) fn execute<B, F>(
    cli: &Cli,
    defaults: &JobSettings,
    level: LogLevel,
    make_backend: F,
) -> Result<Option<PathBuf>, String>
where
    B: QuantizationBackend,
    F: FnOnce(&RunOptions) -> B,
{
    let (job, options) = resolve_cli_with_defaults(cli, defaults).map_err(|e| e.to_string())?;
    describe_job(&job, &options, level);

    if cli.dry_run {
        log(level, LogLevel::Normal, "Dry run: nothing loaded");
        return Ok(None);
    }

    let mut backend = make_backend(&options);
    run_job(&job, &mut backend, level).map(Some).map_err(|e| e.to_string())
}

fn describe_job(job: &JobConfig, options: &RunOptions, level: LogLevel) {
    log(level, LogLevel::Normal, &format!("Model: {}", job.model_id));
    log(
        level,
        LogLevel::Normal,
        &format!(
            "GPTQ: {} bits, group size {}, dataset {}",
            job.bits, job.group_size, job.dataset
        ),
    );
    log(level, LogLevel::Normal, &format!("Device map: {}", job.device_map));
    log(level, LogLevel::Normal, &format!("Output: {}", job.output_dir().display()));
    log(
        level,
        LogLevel::Verbose,
        &format!(
            "  Revision {}, {} samples, seed {}, damp {}",
            options.revision, options.nsamples, options.seed, options.damp_percent
        ),
    );
}
