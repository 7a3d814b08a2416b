//! cuantizar CLI
//!
//! Quantizes a causal language model with GPTQ and saves it next to its
//! tokenizer in `<model_id>_<bits>bit`.
//!
//! # Usage
//!
//! ```bash
//! # Quantize the default model with the default settings
//! cuantizar
//!
//! # 8-bit, groups of 32 columns
//! cuantizar --model_id gpt2 --bits 8 --group_size 32
//!
//! # Show the resolved job without loading anything
//! cuantizar --model_id gpt2 --dry_run
//! ```

use clap::Parser;
use cuantizar::cli::{run_command, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
