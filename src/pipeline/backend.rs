//! Collaborators the orchestrator drives

use std::path::Path;

use super::error::Result;
use crate::calibration::{prepare_calibration, SamplingOptions};
use crate::cli::{log, LogLevel};
use crate::config::{JobConfig, RunOptions};
use crate::hub::{FetchOptions, HfHubFetcher};
use crate::model::{save_pretrained, ModelConfig, QuantizedModel};
use crate::quant::GptqConfig;
use crate::tokenizer::AutoTokenizer;

/// GPTQ settings plus the tokenizer used to encode calibration text
#[derive(Debug)]
pub struct QuantizationDirective<'t, T> {
    /// Quantization settings
    pub config: GptqConfig,
    /// Tokenizer for calibration data
    pub tokenizer: &'t T,
}

impl<'t, T> QuantizationDirective<'t, T> {
    /// Pair settings with a tokenizer
    pub fn new(config: GptqConfig, tokenizer: &'t T) -> Self {
        Self { config, tokenizer }
    }
}

/// Loads, quantizes, places and saves models on behalf of [`run_job`](super::run_job)
pub trait QuantizationBackend {
    /// Loaded tokenizer
    type Tokenizer;
    /// Loaded, quantized model
    type Model;

    /// Load the tokenizer for `model_id`
    fn load_tokenizer(&mut self, model_id: &str) -> Result<Self::Tokenizer>;

    /// GPTQ settings for a job
    fn quantization_config(&mut self, job: &JobConfig) -> Result<GptqConfig>;

    /// Load the model's weights, quantizing during load and placing modules
    /// per `job.device_map`
    fn load_quantized(
        &mut self,
        job: &JobConfig,
        directive: &QuantizationDirective<'_, Self::Tokenizer>,
    ) -> Result<Self::Model>;

    /// Move every module to CPU
    fn to_cpu(&mut self, model: &mut Self::Model) -> Result<()>;

    /// Persist the model into `dir`
    fn save_model(&mut self, model: &Self::Model, dir: &Path) -> Result<()>;

    /// Persist the tokenizer into `dir`
    fn save_tokenizer(&mut self, tokenizer: &Self::Tokenizer, dir: &Path) -> Result<()>;
}

/// Backend reading from the Hugging Face Hub (or local directories) and
/// writing GPTQ checkpoints
pub struct HubBackend {
    fetcher: HfHubFetcher,
    fetch_options: FetchOptions,
    options: RunOptions,
    level: LogLevel,
}

impl HubBackend {
    /// Backend honoring revision, cache and calibration options
    #[must_use]
    pub fn new(options: &RunOptions, level: LogLevel) -> Self {
        let mut fetch_options = FetchOptions::new().revision(options.revision.clone());
        if let Some(dir) = &options.cache_dir {
            fetch_options = fetch_options.cache_dir(dir.clone());
        }
        Self { fetcher: HfHubFetcher::new(), fetch_options, options: options.clone(), level }
    }
}

impl QuantizationBackend for HubBackend {
    type Tokenizer = AutoTokenizer;
    type Model = QuantizedModel;

    fn load_tokenizer(&mut self, model_id: &str) -> Result<AutoTokenizer> {
        let files = self.fetcher.fetch_tokenizer(model_id, &self.fetch_options)?;
        let tokenizer = AutoTokenizer::from_files(&files)?;
        log(
            self.level,
            LogLevel::Verbose,
            &format!("  Vocabulary: {} tokens", tokenizer.vocab_size()),
        );
        Ok(tokenizer)
    }

    fn quantization_config(&mut self, job: &JobConfig) -> Result<GptqConfig> {
        let config = GptqConfig::new(job.bits, job.dataset.clone(), job.group_size)?
            .damp_percent(self.options.damp_percent)
            .nsamples(self.options.nsamples)
            .seed(self.options.seed);
        config.validate()?;
        Ok(config)
    }

    fn load_quantized(
        &mut self,
        job: &JobConfig,
        directive: &QuantizationDirective<'_, AutoTokenizer>,
    ) -> Result<QuantizedModel> {
        let artifact = self.fetcher.fetch_model(&job.model_id, &self.fetch_options)?;
        log(
            self.level,
            LogLevel::Verbose,
            &format!("  Weights: {} file(s)", artifact.weights.len()),
        );

        let model_config = ModelConfig::from_file(&artifact.config)?;
        let config = directive.config.clone().model_seqlen(model_config.model_seqlen());
        let sampling = SamplingOptions {
            nsamples: config.nsamples,
            seqlen: config.seqlen(),
            seed: config.seed,
        };
        let calibration = prepare_calibration(
            &config.dataset,
            directive.tokenizer,
            &self.fetcher,
            &self.fetch_options,
            sampling,
        )?;
        log(
            self.level,
            LogLevel::Verbose,
            &format!(
                "  Calibration: {} sample(s) of up to {} tokens from {}",
                calibration.len(),
                sampling.seqlen,
                config.dataset
            ),
        );

        let model =
            QuantizedModel::load(&artifact, model_config, config, &calibration, &job.device_map)?;
        for layer in &model.report.layers {
            log(
                self.level,
                LogLevel::Verbose,
                &format!(
                    "  {} [{} -> {}] loss {:.4}{}",
                    layer.prefix,
                    layer.in_features,
                    layer.out_features,
                    layer.loss,
                    if layer.calibrated { "" } else { " (uncalibrated)" }
                ),
            );
        }
        for prefix in &model.report.skipped {
            log(self.level, LogLevel::Verbose, &format!("  {prefix} kept dense"));
        }
        log(
            self.level,
            LogLevel::Normal,
            &format!(
                "  Quantized {} layer(s); placement {}",
                model.report.layers.len(),
                model.placement.summary()
            ),
        );
        Ok(model)
    }

    fn to_cpu(&mut self, model: &mut QuantizedModel) -> Result<()> {
        model.to_cpu();
        Ok(())
    }

    fn save_model(&mut self, model: &QuantizedModel, dir: &Path) -> Result<()> {
        for path in save_pretrained(model, dir)? {
            log(self.level, LogLevel::Verbose, &format!("  Wrote {}", path.display()));
        }
        Ok(())
    }

    fn save_tokenizer(&mut self, tokenizer: &AutoTokenizer, dir: &Path) -> Result<()> {
        for path in tokenizer.save_pretrained(dir)? {
            log(self.level, LogLevel::Verbose, &format!("  Wrote {}", path.display()));
        }
        Ok(())
    }
}
