//! CLI module for cuantizar
//!
//! A single flat command: resolve the job, then quantize.

mod logging;
mod quantize;


pub use logging::{log, LogLevel};

pub use crate::config::Cli;

/// Execute the parsed command line
pub fn run_command(cli: Cli) -> Result<(), String> {
    let log_level = LogLevel::from_flags(cli.quiet, cli.verbose);
    quantize::run_quantize(&cli, log_level)
}
