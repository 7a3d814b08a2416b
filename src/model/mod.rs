//! Causal language model checkpoints
//!
//! Reads a Hugging Face checkpoint (config plus single or sharded
//! safetensors), quantizes the linear layers of its decoder blocks with GPTQ
//! while streaming shards, and writes a GPTQ checkpoint back out.

mod config;
mod error;
mod layers;
mod placement;
mod quantized;
mod save;
mod weights;

#[cfg(test)]
mod tests;

pub use config::ModelConfig;
pub use error::{ModelError, Result};
pub use layers::{block_index, is_input_embedding, LayerPlan, LinearSpec};
pub use placement::{DevicePlacement, EMBEDDINGS_MODULE, HEAD_MODULE};
pub use quantized::{LayerReport, ModelTensor, QuantizationReport, QuantizedModel};
pub use save::{
    save_pretrained, save_pretrained_sharded, shard_file_name, MAX_SHARD_BYTES,
    QUANTIZE_CONFIG_FILE,
};
pub use weights::{bytes_to_f32, read_header, read_shard, read_tensor, RawTensor};
