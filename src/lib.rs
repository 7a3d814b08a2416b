//! GPTQ post-training quantization for Hugging Face causal language models
//!
//! Resolves a quantization job (model, bits, calibration dataset, group size,
//! device map) from command-line overrides over compiled-in defaults, then
//! loads the tokenizer, quantizes the model's decoder linear layers while
//! loading, and saves a GPTQ checkpoint with the tokenizer to
//! `<model_id>_<bits>bit`.

pub mod calibration;
pub mod cli;
pub mod config;
pub mod hub;
pub mod model;
pub mod pipeline;
pub mod quant;
pub mod tokenizer;

#[cfg(test)]
pub(crate) mod test_support;
