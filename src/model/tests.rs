//! Tests for checkpoint loading, quantization and saving

use super::*;
use crate::calibration::CalibrationSet;
use crate::config::{Device, DeviceMap};
use crate::hub::{FetchOptions, HfHubFetcher, ModelArtifact};
use crate::quant::GptqConfig;
use crate::test_support::{tiny_config_json, write_tiny_model, TINY_HIDDEN, TINY_LAYERS};
use approx::assert_abs_diff_eq;
use safetensors::{Dtype, SafeTensors};
use std::collections::BTreeMap;
use tempfile::TempDir;

fn tiny_artifact(dir: &TempDir) -> ModelArtifact {
    let repo = dir.path().join("tiny");
    write_tiny_model(&repo);
    HfHubFetcher::new().fetch_model(repo.to_str().unwrap(), &FetchOptions::default()).unwrap()
}

fn calibration() -> CalibrationSet {
    CalibrationSet { samples: vec![vec![1, 2, 3, 4, 1, 5], vec![2, 2, 3, 0]] }
}

fn load_tiny(dir: &TempDir, bits: u8, group_size: i32) -> QuantizedModel {
    let artifact = tiny_artifact(dir);
    let config = ModelConfig::from_file(&artifact.config).unwrap();
    let gptq = GptqConfig::new(bits, "wikitext2", group_size).unwrap();
    QuantizedModel::load(&artifact, config, gptq, &calibration(), &DeviceMap::Auto).unwrap()
}

#[test]
fn test_config_fields() {
    let config = ModelConfig::from_json(&tiny_config_json()).unwrap();
    assert_eq!(config.model_type(), Some("llama"));
    assert_eq!(config.hidden_size(), Some(TINY_HIDDEN));
    assert_eq!(config.max_positions(), Some(16));
    assert_eq!(config.model_seqlen(), 16);
    assert!(!config.uses_conv1d());
}

#[test]
fn test_config_seqlen_fallbacks() {
    let gpt2 = ModelConfig::from_json(r#"{"model_type": "gpt2", "n_positions": 1024, "n_embd": 768}"#)
        .unwrap();
    assert_eq!(gpt2.model_seqlen(), 1024);
    assert_eq!(gpt2.hidden_size(), Some(768));
    assert!(gpt2.uses_conv1d());

    let long = ModelConfig::from_json(r#"{"max_position_embeddings": 32768}"#).unwrap();
    assert_eq!(long.model_seqlen(), 2048);

    let bare = ModelConfig::from_json("{}").unwrap();
    assert_eq!(bare.model_seqlen(), 2048);
}

#[test]
fn test_config_must_be_object() {
    assert!(matches!(ModelConfig::from_json("[1, 2]"), Err(ModelError::InvalidConfig)));
}

#[test]
fn test_config_with_quantization() {
    let config = ModelConfig::from_json(&tiny_config_json()).unwrap();
    let gptq = GptqConfig::new(4, "wikitext2", 32).unwrap();
    let saved = config.with_quantization(&gptq).unwrap();
    assert_eq!(saved["torch_dtype"], "float16");
    assert_eq!(saved["quantization_config"]["quant_method"], "gptq");
    assert_eq!(saved["quantization_config"]["bits"], 4);
    assert_eq!(saved["model_type"], "llama");
}

#[test]
fn test_block_index() {
    assert_eq!(block_index("model.layers.12.mlp.up_proj.weight"), Some(12));
    assert_eq!(block_index("transformer.h.3.attn.c_attn.weight"), Some(3));
    assert_eq!(block_index("blocks.0.ff.weight"), Some(0));
    assert_eq!(block_index("model.embed_tokens.weight"), None);
    assert_eq!(block_index("model.layers.norm.weight"), None);
}

#[test]
fn test_layer_plan() {
    let shapes: BTreeMap<String, Vec<usize>> = [
        ("model.embed_tokens.weight", vec![6, 64]),
        ("model.layers.0.input_layernorm.weight", vec![64]),
        ("model.layers.0.self_attn.q_proj.weight", vec![64, 64]),
        ("model.layers.0.self_attn.o_proj.weight", vec![64, 48]),
        ("model.layers.1.mlp.up_proj.weight", vec![128, 64]),
        ("lm_head.weight", vec![6, 64]),
    ]
    .into_iter()
    .map(|(n, s)| (n.to_string(), s))
    .collect();

    let plan = LayerPlan::build(&shapes, 4, false);
    assert_eq!(plan.num_blocks, 2);
    assert_eq!(plan.embedding.as_deref(), Some("model.embed_tokens.weight"));
    assert_eq!(plan.linears.len(), 2);
    assert_eq!(plan.skipped, vec!["model.layers.0.self_attn.o_proj".to_string()]);

    let up = &plan.linears["model.layers.1.mlp.up_proj.weight"];
    assert_eq!((up.in_features, up.out_features), (64, 128));
    assert_eq!(
        plan.bias_owner("model.layers.0.self_attn.q_proj.bias").map(|s| s.prefix.as_str()),
        Some("model.layers.0.self_attn.q_proj")
    );
    assert!(plan.bias_owner("model.norm.bias").is_none());
}

#[test]
fn test_layer_plan_conv1d() {
    let shapes: BTreeMap<String, Vec<usize>> =
        [("h.0.attn.c_attn.weight".to_string(), vec![64, 192])].into_iter().collect();
    let plan = LayerPlan::build(&shapes, 4, true);
    let spec = &plan.linears["h.0.attn.c_attn.weight"];
    assert!(spec.transposed);
    assert_eq!((spec.in_features, spec.out_features), (64, 192));
}

#[test]
fn test_bytes_to_f32() {
    let halfs: Vec<u8> = [0.5f32, -2.0]
        .iter()
        .flat_map(|v| half::bf16::from_f32(*v).to_le_bytes())
        .collect();
    assert_eq!(bytes_to_f32(Dtype::BF16, &halfs), Some(vec![0.5, -2.0]));
    assert_eq!(bytes_to_f32(Dtype::I64, &[0; 8]), None);
}

#[test]
fn test_read_header_matches_shard() {
    let dir = TempDir::new().unwrap();
    let artifact = tiny_artifact(&dir);
    let header = read_header(&artifact.weights[0]).unwrap();
    let shard = read_shard(&artifact.weights[0]).unwrap();
    assert_eq!(header.len(), shard.len());
    for (name, shape) in header {
        assert_eq!(shard[&name].shape, shape);
    }
}

#[test]
fn test_placement_plan() {
    let auto = DevicePlacement::plan(&DeviceMap::Auto, 3);
    assert_eq!(auto.len(), 5);
    assert!(auto.is_all_cpu());

    let mut cuda = DevicePlacement::plan(&DeviceMap::Single(Device::Cuda(1)), 3);
    assert_eq!(cuda.device_of("layers.2"), Some(&Device::Cuda(1)));
    assert!(!cuda.is_all_cpu());
    cuda.to_cpu();
    assert!(cuda.is_all_cpu());
    assert_eq!(cuda.summary(), "cpu: 5");

    assert_eq!(DevicePlacement::module_of("model.layers.7.mlp.up_proj.weight"), "layers.7");
    assert_eq!(DevicePlacement::module_of("model.embed_tokens.weight"), EMBEDDINGS_MODULE);
    assert_eq!(DevicePlacement::module_of("lm_head.weight"), HEAD_MODULE);
}

#[test]
fn test_load_quantizes_block_linears() {
    let dir = TempDir::new().unwrap();
    let model = load_tiny(&dir, 4, 32);

    // q_proj, up_proj, down_proj per block; o_proj is not packable
    assert_eq!(model.quantized_layers(), 3 * TINY_LAYERS);
    assert_eq!(model.report.skipped.len(), TINY_LAYERS);
    assert_eq!(model.report.calibration_tokens, 10);

    let q = &model.report.layers.iter().find(|l| l.prefix.ends_with("0.self_attn.q_proj")).unwrap();
    assert!(q.calibrated);
    let down = &model.report.layers.iter().find(|l| l.prefix.ends_with("0.mlp.down_proj")).unwrap();
    assert!(!down.calibrated);

    let Some(ModelTensor::Quantized(packed)) = model.tensors.get("model.layers.0.self_attn.q_proj")
    else {
        panic!("q_proj should be quantized");
    };
    assert_eq!(packed.qweight.dim(), (TINY_HIDDEN * 4 / 32, TINY_HIDDEN));
    assert_eq!(packed.scales.nrows(), 2);
    assert!(packed.bias.is_some());

    assert!(matches!(model.tensors.get("lm_head.weight"), Some(ModelTensor::Dense(t)) if t.dtype == Dtype::F16));
    assert!(model.tensors.contains_key("model.layers.0.self_attn.o_proj.weight"));
    assert!(!model.tensors.contains_key("model.layers.0.self_attn.q_proj.bias"));
    assert!(model.placement.is_all_cpu());
}

#[test]
fn test_load_with_per_row_groups() {
    let dir = TempDir::new().unwrap();
    let model = load_tiny(&dir, 8, -1);
    let Some(ModelTensor::Quantized(packed)) = model.tensors.get("model.layers.1.mlp.down_proj")
    else {
        panic!("down_proj should be quantized");
    };
    assert_eq!(packed.scales.nrows(), 1);
    assert!(packed.g_idx.iter().all(|&g| g == 0));
}

#[test]
fn test_dequantized_weights_stay_close() {
    let dir = TempDir::new().unwrap();
    let model = load_tiny(&dir, 8, 32);
    let artifact_dir = dir.path().join("tiny");
    let original = read_tensor(
        &artifact_dir.join("model.safetensors"),
        "model.layers.0.mlp.down_proj.weight",
    )
    .unwrap()
    .to_matrix("down_proj")
    .unwrap();

    // down_proj reads the MLP width, so it is rounded without calibration
    let Some(ModelTensor::Quantized(packed)) = model.tensors.get("model.layers.0.mlp.down_proj")
    else {
        panic!("down_proj should be quantized");
    };
    let codes = packed.unpack_codes();
    let zeros = packed.unpack_zeros();
    for ((r, c), &code) in codes.indexed_iter() {
        let g = packed.g_idx[c] as usize;
        let scale = packed.scales[[g, r]].to_f32();
        let value = scale * (code as f32 - zeros[[g, r]] as f32);
        assert_abs_diff_eq!(value, original[[r, c]], epsilon = 0.01);
    }
}

#[test]
fn test_save_pretrained_single_file() {
    let dir = TempDir::new().unwrap();
    let mut model = load_tiny(&dir, 4, 32);
    model.to_cpu();
    let out = dir.path().join("tiny_4bit");
    let written = save_pretrained(&model, &out).unwrap();

    for file in ["config.json", "quantize_config.json", "model.safetensors", "generation_config.json"] {
        assert!(out.join(file).is_file(), "{file} missing");
    }
    assert_eq!(written.len(), 4);

    let config: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("config.json")).unwrap()).unwrap();
    assert_eq!(config["quantization_config"]["group_size"], 32);
    assert_eq!(config["torch_dtype"], "float16");

    let data = std::fs::read(out.join("model.safetensors")).unwrap();
    let tensors = SafeTensors::deserialize(&data).unwrap();
    let prefix = "model.layers.0.self_attn.q_proj";
    assert_eq!(tensors.tensor(&format!("{prefix}.qweight")).unwrap().dtype(), Dtype::I32);
    assert_eq!(tensors.tensor(&format!("{prefix}.qzeros")).unwrap().shape(), &[2, 8]);
    assert_eq!(tensors.tensor(&format!("{prefix}.scales")).unwrap().dtype(), Dtype::F16);
    assert_eq!(tensors.tensor(&format!("{prefix}.g_idx")).unwrap().shape(), &[TINY_HIDDEN]);
    assert_eq!(tensors.tensor(&format!("{prefix}.bias")).unwrap().dtype(), Dtype::F16);
    assert!(tensors.tensor(&format!("{prefix}.weight")).is_err());
    assert_eq!(tensors.tensor("lm_head.weight").unwrap().dtype(), Dtype::F16);
    assert_eq!(tensors.tensor("model.embed_tokens.weight").unwrap().dtype(), Dtype::F16);
}

#[test]
fn test_saved_dense_tensors_match_config_dtype() {
    let dir = TempDir::new().unwrap();
    let model = load_tiny(&dir, 4, 32);
    let out = dir.path().join("tiny_4bit");
    save_pretrained(&model, &out).unwrap();

    let config: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("config.json")).unwrap()).unwrap();
    assert_eq!(config["torch_dtype"], "float16");

    let data = std::fs::read(out.join("model.safetensors")).unwrap();
    let tensors = SafeTensors::deserialize(&data).unwrap();
    // embeddings, norms and the unpackable o_proj were F32 in the source checkpoint
    for name in [
        "model.embed_tokens.weight",
        "model.norm.weight",
        "model.layers.0.self_attn.o_proj.weight",
    ] {
        assert_eq!(tensors.tensor(name).unwrap().dtype(), Dtype::F16, "{name}");
    }
    for (name, view) in tensors.tensors() {
        assert!(
            matches!(view.dtype(), Dtype::F16 | Dtype::I32),
            "{name} saved as {:?}",
            view.dtype()
        );
    }
}

#[test]
fn test_into_f16_narrows_floats_only() {
    let bf16: Vec<u8> =
        [0.5f32, -2.0].iter().flat_map(|v| half::bf16::from_f32(*v).to_le_bytes()).collect();
    let tensor = RawTensor { dtype: Dtype::BF16, shape: vec![2], data: bf16 }.into_f16();
    assert_eq!(tensor.dtype, Dtype::F16);
    assert_eq!(tensor.to_f32("t").unwrap(), vec![0.5, -2.0]);

    let ids = RawTensor { dtype: Dtype::I64, shape: vec![1], data: vec![7, 0, 0, 0, 0, 0, 0, 0] };
    assert_eq!(ids.clone().into_f16(), ids);
}

#[test]
fn test_save_pretrained_sharded() {
    let dir = TempDir::new().unwrap();
    let model = load_tiny(&dir, 4, 32);
    let out = dir.path().join("sharded");
    std::fs::create_dir_all(&out).unwrap();
    std::fs::write(out.join("model.safetensors"), b"stale").unwrap();

    save_pretrained_sharded(&model, &out, 4096).unwrap();
    assert!(!out.join("model.safetensors").exists());

    let index: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(out.join("model.safetensors.index.json")).unwrap(),
    )
    .unwrap();
    let shards = crate::hub::parse_shard_index(&index.to_string()).unwrap();
    assert!(shards.len() > 1);
    assert_eq!(shards[0], shard_file_name(1, shards.len()));
    for shard in &shards {
        assert!(out.join(shard).is_file());
    }
    assert!(index["metadata"]["total_size"].as_u64().unwrap() > 0);
    assert_eq!(index["weight_map"]["lm_head.weight"].as_str().map(|s| s.starts_with("model-")), Some(true));
}

#[test]
fn test_shard_file_name() {
    assert_eq!(shard_file_name(1, 3), "model-00001-of-00003.safetensors");
}
