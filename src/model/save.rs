//! Writing a quantized checkpoint

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use safetensors::tensor::TensorView;
use safetensors::Dtype;

use super::error::Result;
use super::quantized::{ModelTensor, QuantizedModel};
use crate::hub::{CONFIG_FILE, GENERATION_CONFIG_FILE, SAFETENSORS_FILE, SAFETENSORS_INDEX_FILE};

/// Shard size above which weights are split
pub const MAX_SHARD_BYTES: usize = 5_000_000_000;

/// AutoGPTQ-style quantization settings file
pub const QUANTIZE_CONFIG_FILE: &str = "quantize_config.json";

/// One tensor ready for serialization
struct OutputTensor<'a> {
    name: String,
    dtype: Dtype,
    shape: Vec<usize>,
    data: Cow<'a, [u8]>,
}

fn i32_bytes(values: impl IntoIterator<Item = i32>) -> Cow<'static, [u8]> {
    let values: Vec<i32> = values.into_iter().collect();
    Cow::Owned(bytemuck::cast_slice(&values).to_vec())
}

fn f16_bytes<'a>(values: impl IntoIterator<Item = &'a half::f16>) -> Cow<'static, [u8]> {
    Cow::Owned(values.into_iter().flat_map(|v| v.to_le_bytes()).collect())
}

fn output_tensors(model: &QuantizedModel) -> Vec<OutputTensor<'_>> {
    let mut out = Vec::new();
    for (name, tensor) in &model.tensors {
        match tensor {
            ModelTensor::Dense(raw) => out.push(OutputTensor {
                name: name.clone(),
                dtype: raw.dtype,
                shape: raw.shape.clone(),
                data: Cow::Borrowed(&raw.data),
            }),
            ModelTensor::Quantized(packed) => {
                out.push(OutputTensor {
                    name: format!("{name}.qweight"),
                    dtype: Dtype::I32,
                    shape: packed.qweight.shape().to_vec(),
                    data: i32_bytes(packed.qweight.iter().copied()),
                });
                out.push(OutputTensor {
                    name: format!("{name}.qzeros"),
                    dtype: Dtype::I32,
                    shape: packed.qzeros.shape().to_vec(),
                    data: i32_bytes(packed.qzeros.iter().copied()),
                });
                out.push(OutputTensor {
                    name: format!("{name}.scales"),
                    dtype: Dtype::F16,
                    shape: packed.scales.shape().to_vec(),
                    data: f16_bytes(packed.scales.iter()),
                });
                out.push(OutputTensor {
                    name: format!("{name}.g_idx"),
                    dtype: Dtype::I32,
                    shape: vec![packed.g_idx.len()],
                    data: i32_bytes(packed.g_idx.iter().copied()),
                });
                if let Some(bias) = &packed.bias {
                    out.push(OutputTensor {
                        name: format!("{name}.bias"),
                        dtype: Dtype::F16,
                        shape: vec![bias.len()],
                        data: f16_bytes(bias.iter()),
                    });
                }
            }
        }
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

/// Split tensors greedily into shards no larger than `max_bytes`
fn split_shards(tensors: &[OutputTensor<'_>], max_bytes: usize) -> Vec<std::ops::Range<usize>> {
    let mut shards = Vec::new();
    let (mut start, mut size) = (0, 0);
    for (i, tensor) in tensors.iter().enumerate() {
        let bytes = tensor.data.len();
        if i > start && size + bytes > max_bytes {
            shards.push(start..i);
            start = i;
            size = 0;
        }
        size += bytes;
    }
    if start < tensors.len() || shards.is_empty() {
        shards.push(start..tensors.len());
    }
    shards
}

/// Shard file name in the `model-00001-of-00002.safetensors` scheme
#[must_use]
pub fn shard_file_name(index: usize, total: usize) -> String {
    format!("model-{index:05}-of-{total:05}.safetensors")
}

fn is_weight_file(name: &str) -> bool {
    name == SAFETENSORS_FILE
        || name == SAFETENSORS_INDEX_FILE
        || (name.starts_with("model-") && name.ends_with(".safetensors"))
}

/// Write config, quantize config, weights and generation config to `dir`
///
/// # Errors
///
/// Returns error if any file cannot be written.
pub fn save_pretrained(model: &QuantizedModel, dir: &Path) -> Result<Vec<PathBuf>> {
    save_pretrained_sharded(model, dir, MAX_SHARD_BYTES)
}

/// [`save_pretrained`] with an explicit shard size limit
///
/// # Errors
///
/// Returns error if any file cannot be written.
pub fn save_pretrained_sharded(
    model: &QuantizedModel,
    dir: &Path,
    max_shard_bytes: usize,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if is_weight_file(&entry.file_name().to_string_lossy()) {
            std::fs::remove_file(entry.path())?;
        }
    }

    let mut written = Vec::new();

    let config_path = dir.join(CONFIG_FILE);
    let config = model.config.with_quantization(&model.quantization)?;
    std::fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;
    written.push(config_path);

    let quantize_config_path = dir.join(QUANTIZE_CONFIG_FILE);
    std::fs::write(
        &quantize_config_path,
        serde_json::to_string_pretty(&model.quantization.quantize_config())?,
    )?;
    written.push(quantize_config_path);

    let tensors = output_tensors(model);
    let shards = split_shards(&tensors, max_shard_bytes);
    let mut metadata = HashMap::new();
    metadata.insert("format".to_string(), "pt".to_string());

    let mut weight_map = BTreeMap::new();
    for (i, range) in shards.iter().enumerate() {
        let file_name = if shards.len() == 1 {
            SAFETENSORS_FILE.to_string()
        } else {
            shard_file_name(i + 1, shards.len())
        };
        let views = tensors[range.clone()]
            .iter()
            .map(|t| {
                TensorView::new(t.dtype, t.shape.clone(), &t.data).map(|view| (t.name.as_str(), view))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let path = dir.join(&file_name);
        safetensors::serialize_to_file(views, Some(metadata.clone()), &path)?;
        for tensor in &tensors[range.clone()] {
            weight_map.insert(tensor.name.clone(), file_name.clone());
        }
        written.push(path);
    }

    if shards.len() > 1 {
        let total_size: usize = tensors.iter().map(|t| t.data.len()).sum();
        let index = serde_json::json!({
            "metadata": { "total_size": total_size },
            "weight_map": weight_map,
        });
        let index_path = dir.join(SAFETENSORS_INDEX_FILE);
        std::fs::write(&index_path, serde_json::to_string_pretty(&index)?)?;
        written.push(index_path);
    }

    if let Some(source) = &model.generation_config {
        let path = dir.join(GENERATION_CONFIG_FILE);
        std::fs::copy(source, &path)?;
        written.push(path);
    }

    Ok(written)
}
