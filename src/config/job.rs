//! Quantization job resolution
//!
//! A job is resolved once per invocation from three layers, highest
//! precedence first: command line, job file, compiled-in defaults.
//! Empty strings and zeros count as "not provided" at every layer.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::cli::Cli;
use super::device::DeviceMap;
use super::error::{ConfigError, Result};

/// Default model identifier
pub const DEFAULT_MODEL_ID: &str = "teknium/OpenHermes-2-Mistral-7B";
/// Default quantization bit width
pub const DEFAULT_BITS: u8 = 4;
/// Default calibration dataset
pub const DEFAULT_DATASET: &str = "wikitext2";
/// Default group size
pub const DEFAULT_GROUP_SIZE: i32 = 128;
/// Default device placement directive
pub const DEFAULT_DEVICE_MAP: &str = "auto";

/// Default number of calibration samples
pub const DEFAULT_NSAMPLES: usize = 128;
/// Default Hessian dampening fraction
pub const DEFAULT_DAMP_PERCENT: f32 = 0.1;
/// Default calibration sampling seed
pub const DEFAULT_SEED: u64 = 0;
/// Default Hub revision
pub const DEFAULT_REVISION: &str = "main";

/// Bit widths the GPTQ packer supports
pub const SUPPORTED_BITS: [u8; 4] = [2, 3, 4, 8];

/// One layer of job settings; every field may be absent
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSettings {
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub bits: Option<u8>,
    #[serde(default)]
    pub dataset: Option<String>,
    #[serde(default)]
    pub group_size: Option<i32>,
    #[serde(default)]
    pub device_map: Option<String>,
}

impl JobSettings {
    /// The compiled-in defaults
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            model_id: Some(DEFAULT_MODEL_ID.to_string()),
            bits: Some(DEFAULT_BITS),
            dataset: Some(DEFAULT_DATASET.to_string()),
            group_size: Some(DEFAULT_GROUP_SIZE),
            device_map: Some(DEFAULT_DEVICE_MAP.to_string()),
        }
    }

    /// Settings supplied on the command line
    #[must_use]
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            model_id: cli.model_id.clone(),
            bits: cli.bits,
            dataset: cli.dataset.clone(),
            group_size: cli.group_size,
            device_map: cli.device_map.clone(),
        }
    }

    /// Fill every unprovided field of `self` from `lower`
    #[must_use]
    pub fn or(self, lower: &Self) -> Self {
        Self {
            model_id: provided_str(self.model_id).or_else(|| provided_str(lower.model_id.clone())),
            bits: self.bits.filter(|b| *b != 0).or(lower.bits.filter(|b| *b != 0)),
            dataset: provided_str(self.dataset).or_else(|| provided_str(lower.dataset.clone())),
            group_size: self.group_size.filter(|g| *g != 0).or(lower.group_size.filter(|g| *g != 0)),
            device_map: provided_str(self.device_map)
                .or_else(|| provided_str(lower.device_map.clone())),
        }
    }

    /// Names of the fields still unprovided
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if provided_str(self.model_id.clone()).is_none() {
            missing.push("model_id");
        }
        if self.bits.filter(|b| *b != 0).is_none() {
            missing.push("bits");
        }
        if provided_str(self.dataset.clone()).is_none() {
            missing.push("dataset");
        }
        if self.group_size.filter(|g| *g != 0).is_none() {
            missing.push("group_size");
        }
        if provided_str(self.device_map.clone()).is_none() {
            missing.push("device_map");
        }
        missing
    }
}

fn provided_str(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// A fully resolved quantization job
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JobConfig {
    /// Model identifier (Hub repository or local directory)
    pub model_id: String,
    /// Quantization bit width
    pub bits: u8,
    /// Calibration dataset name or local text file
    pub dataset: String,
    /// Weights sharing one scale; -1 means one group per row
    pub group_size: i32,
    /// Device placement directive
    pub device_map: DeviceMap,
}

impl JobConfig {
    /// Resolve a job from command line, optional job file, and defaults
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSettings`] if any field is still absent
    /// after layering, and a validation error for out-of-range values.
    pub fn resolve(
        cli: &JobSettings,
        file: Option<&JobSettings>,
        defaults: &JobSettings,
    ) -> Result<Self> {
        let layered = match file {
            Some(file) => cli.clone().or(file),
            None => cli.clone(),
        };
        let resolved = layered.or(defaults);

        let missing = resolved.missing_fields();
        if !missing.is_empty() {
            return Err(ConfigError::MissingSettings { fields: missing });
        }

        let JobSettings { model_id, bits, dataset, group_size, device_map } = resolved;
        let (Some(model_id), Some(bits), Some(dataset), Some(group_size), Some(device_map)) =
            (model_id, bits, dataset, group_size, device_map)
        else {
            return Err(ConfigError::MissingSettings { fields: vec![] });
        };

        if !SUPPORTED_BITS.contains(&bits) {
            return Err(ConfigError::InvalidBits(bits));
        }
        if group_size < -1 {
            return Err(ConfigError::InvalidGroupSize(group_size));
        }
        let device_map = device_map.parse::<DeviceMap>()?;

        Ok(Self { model_id, bits, dataset, group_size, device_map })
    }

    /// Output directory name: `<model_id>_<bits>bit`
    #[must_use]
    pub fn output_dir_name(&self) -> String {
        format!("{}_{}bit", self.model_id, self.bits)
    }

    /// Output directory path, relative to the working directory
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(self.output_dir_name())
    }

    /// Group size in weights, given the row length; -1 spans the row
    #[must_use]
    pub fn effective_group_size(&self, in_features: usize) -> usize {
        effective_group_size(self.group_size, in_features)
    }
}

/// Group size in weights for a row of `in_features`
#[must_use]
pub fn effective_group_size(group_size: i32, in_features: usize) -> usize {
    if group_size <= 0 {
        in_features.max(1)
    } else {
        group_size as usize
    }
}

/// Options that tune a run without being part of the job identity
#[derive(Clone, Debug, PartialEq)]
pub struct RunOptions {
    /// Hub revision of the model
    pub revision: String,
    /// Cache directory override
    pub cache_dir: Option<PathBuf>,
    /// Number of calibration samples
    pub nsamples: usize,
    /// Calibration sampling seed
    pub seed: u64,
    /// Hessian dampening fraction
    pub damp_percent: f32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            revision: DEFAULT_REVISION.to_string(),
            cache_dir: None,
            nsamples: DEFAULT_NSAMPLES,
            seed: DEFAULT_SEED,
            damp_percent: DEFAULT_DAMP_PERCENT,
        }
    }
}

impl RunOptions {
    /// Apply command-line overrides
    ///
    /// # Errors
    ///
    /// Returns an error for a zero sample count or a damp percent outside (0, 1).
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut options = Self::default();
        if let Some(revision) = cli.revision.as_ref().filter(|r| !r.is_empty()) {
            options.revision = revision.clone();
        }
        if let Some(cache_dir) = &cli.cache_dir {
            options.cache_dir = Some(cache_dir.clone());
        }
        if let Some(nsamples) = cli.nsamples {
            if nsamples == 0 {
                return Err(ConfigError::InvalidSampleCount(nsamples));
            }
            options.nsamples = nsamples;
        }
        if let Some(seed) = cli.seed {
            options.seed = seed;
        }
        if let Some(damp) = cli.damp_percent {
            if !(damp > 0.0 && damp < 1.0) {
                return Err(ConfigError::InvalidDampPercent(damp));
            }
            options.damp_percent = damp;
        }
        Ok(options)
    }
}
