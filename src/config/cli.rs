//! Command-line interface types
//!
//! Every job field is optional on the command line; missing values fall back
//! to the job file and then to the compiled-in defaults (see [`super::job`]).

use clap::Parser;
use std::path::PathBuf;

/// Cuantizar: GPTQ post-training quantization for causal language models
#[derive(Parser, Debug, Clone, PartialEq, Default)]
#[command(name = "cuantizar")]
#[command(author = "PAIML")]
#[command(version)]
#[command(about = "Quantize a GPT model. Run with --help for more info.")]
pub struct Cli {
    /// The pretrained model ID (Hub repository or local directory)
    #[arg(long = "model_id", value_name = "MODEL_ID")]
    pub model_id: Option<String>,

    /// Number of bits for quantization
    #[arg(long, value_name = "BITS")]
    pub bits: Option<u8>,

    /// The calibration dataset to use (wikitext2 or a local text file)
    #[arg(long, value_name = "DATASET")]
    pub dataset: Option<String>,

    /// Group size for quantization (-1 for one group per row)
    #[arg(long = "group_size", value_name = "N", allow_negative_numbers = true)]
    pub group_size: Option<i32>,

    /// Device map for loading the model (auto, cpu, cuda:0, ...)
    #[arg(long = "device_map", value_name = "DEVICE_MAP")]
    pub device_map: Option<String>,

    /// YAML job file supplying values between the command line and the defaults
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Hub revision (branch, tag, or commit) of the model
    #[arg(long, value_name = "REV")]
    pub revision: Option<String>,

    /// Cache directory for downloaded models and datasets
    #[arg(long = "cache_dir", value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Number of calibration samples
    #[arg(long, value_name = "N")]
    pub nsamples: Option<usize>,

    /// Seed for calibration sampling
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Hessian dampening as a fraction of the mean diagonal
    #[arg(long = "damp_percent", value_name = "FRACTION")]
    pub damp_percent: Option<f32>,

    /// Resolve and print the job without loading anything
    #[arg(long = "dry_run")]
    pub dry_run: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Parse CLI arguments from a string slice (for testing)
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_parse_no_arguments() {
        let cli = parse_args(["cuantizar"]).unwrap();
        assert_eq!(cli, Cli::default());
    }

    #[test]
    fn test_parse_all_job_fields() {
        let cli = parse_args([
            "cuantizar",
            "--model_id",
            "gpt2",
            "--bits",
            "8",
            "--dataset",
            "wikitext2",
            "--group_size",
            "32",
            "--device_map",
            "cuda:0",
        ])
        .unwrap();

        assert_eq!(cli.model_id.as_deref(), Some("gpt2"));
        assert_eq!(cli.bits, Some(8));
        assert_eq!(cli.dataset.as_deref(), Some("wikitext2"));
        assert_eq!(cli.group_size, Some(32));
        assert_eq!(cli.device_map.as_deref(), Some("cuda:0"));
    }

    #[test]
    fn test_parse_negative_group_size() {
        let cli = parse_args(["cuantizar", "--group_size", "-1"]).unwrap();
        assert_eq!(cli.group_size, Some(-1));
    }

    #[test]
    fn test_help_is_display_help() {
        let err = parse_args(["cuantizar", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert_eq!(err.exit_code(), 0);
        let rendered = err.render().to_string();
        assert!(rendered.contains("--model_id"));
        assert!(rendered.contains("--group_size"));
        assert!(rendered.contains("--device_map"));
    }

    #[test]
    fn test_non_numeric_bits_rejected() {
        let err = parse_args(["cuantizar", "--bits", "four"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(parse_args(["cuantizar", "--model-id", "gpt2"]).is_err());
    }

    #[test]
    fn test_extras() {
        let cli = parse_args([
            "cuantizar",
            "--config",
            "job.yaml",
            "--nsamples",
            "16",
            "--seed",
            "7",
            "--damp_percent",
            "0.05",
            "--dry_run",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("job.yaml")));
        assert_eq!(cli.nsamples, Some(16));
        assert_eq!(cli.seed, Some(7));
        assert!((cli.damp_percent.unwrap() - 0.05).abs() < 1e-6);
        assert!(cli.dry_run);
        assert!(cli.verbose);
        assert!(!cli.quiet);
    }
}
