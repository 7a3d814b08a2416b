//! Fixtures shared by unit tests

use std::collections::HashMap;
use std::path::Path;

use safetensors::tensor::{Dtype, TensorView};

/// Minimal word-level tokenizer.json
pub(crate) const WORD_LEVEL_JSON: &str = r#"{
  "version": "1.0",
  "truncation": null,
  "padding": null,
  "added_tokens": [],
  "normalizer": null,
  "pre_tokenizer": {"type": "Whitespace"},
  "post_processor": null,
  "decoder": null,
  "model": {
    "type": "WordLevel",
    "vocab": {"[UNK]": 0, "the": 1, "cat": 2, "sat": 3, "on": 4, "mat": 5},
    "unk_token": "[UNK]"
  }
}"#;

/// Hidden size of the tiny model
pub(crate) const TINY_HIDDEN: usize = 64;
/// Decoder blocks of the tiny model
pub(crate) const TINY_LAYERS: usize = 2;
/// Vocabulary of the tiny model, matching [`WORD_LEVEL_JSON`]
pub(crate) const TINY_VOCAB: usize = 6;

fn values(len: usize, salt: usize) -> Vec<f32> {
    (0..len).map(|i| (((i * 37 + salt * 11) % 29) as f32 - 14.0) / 20.0).collect()
}

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn f16_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| half::f16::from_f32(*v).to_le_bytes()).collect()
}

/// Tensors of a tiny llama-style model: name, dtype, shape, bytes
pub(crate) fn tiny_tensors() -> Vec<(String, Dtype, Vec<usize>, Vec<u8>)> {
    let h = TINY_HIDDEN;
    let mut tensors = vec![
        (
            "model.embed_tokens.weight".to_string(),
            Dtype::F32,
            vec![TINY_VOCAB, h],
            f32_bytes(&values(TINY_VOCAB * h, 1)),
        ),
        ("model.norm.weight".to_string(), Dtype::F32, vec![h], f32_bytes(&vec![1.0; h])),
        ("lm_head.weight".to_string(), Dtype::F16, vec![TINY_VOCAB, h], f16_bytes(&values(TINY_VOCAB * h, 2))),
    ];
    for layer in 0..TINY_LAYERS {
        let p = format!("model.layers.{layer}");
        let salt = 10 * (layer + 1);
        tensors.extend([
            (format!("{p}.input_layernorm.weight"), Dtype::F32, vec![h], f32_bytes(&vec![1.0; h])),
            (format!("{p}.self_attn.q_proj.weight"), Dtype::F32, vec![h, h], f32_bytes(&values(h * h, salt))),
            (format!("{p}.self_attn.q_proj.bias"), Dtype::F32, vec![h], f32_bytes(&values(h, salt + 1))),
            (format!("{p}.self_attn.o_proj.weight"), Dtype::F32, vec![h, 48], f32_bytes(&values(h * 48, salt + 2))),
            (format!("{p}.mlp.up_proj.weight"), Dtype::F32, vec![2 * h, h], f32_bytes(&values(2 * h * h, salt + 3))),
            (format!("{p}.mlp.down_proj.weight"), Dtype::F32, vec![h, 2 * h], f32_bytes(&values(2 * h * h, salt + 4))),
        ]);
    }
    tensors
}

/// Serialize `(name, dtype, shape, bytes)` tensors to one safetensors file
pub(crate) fn write_safetensors(path: &Path, tensors: &[(String, Dtype, Vec<usize>, Vec<u8>)]) {
    let views: Vec<(&str, TensorView<'_>)> = tensors
        .iter()
        .map(|(name, dtype, shape, data)| {
            (name.as_str(), TensorView::new(*dtype, shape.clone(), data).unwrap())
        })
        .collect();
    let mut metadata = HashMap::new();
    metadata.insert("format".to_string(), "pt".to_string());
    std::fs::write(path, safetensors::serialize(views, Some(metadata)).unwrap()).unwrap();
}

/// `config.json` of the tiny model
pub(crate) fn tiny_config_json() -> String {
    serde_json::json!({
        "architectures": ["LlamaForCausalLM"],
        "model_type": "llama",
        "hidden_size": TINY_HIDDEN,
        "num_hidden_layers": TINY_LAYERS,
        "vocab_size": TINY_VOCAB,
        "max_position_embeddings": 16,
        "torch_dtype": "float32"
    })
    .to_string()
}

/// Write a complete tiny model repository into `dir`
pub(crate) fn write_tiny_model(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("config.json"), tiny_config_json()).unwrap();
    std::fs::write(dir.join("generation_config.json"), r#"{"max_new_tokens": 8}"#).unwrap();
    std::fs::write(dir.join("tokenizer.json"), WORD_LEVEL_JSON).unwrap();
    write_safetensors(&dir.join("model.safetensors"), &tiny_tensors());
}

/// Backend that records every call and can fail at one step
#[derive(Default)]
pub(crate) struct RecordingBackend {
    pub calls: Vec<crate::pipeline::Step>,
    pub fail_at: Option<crate::pipeline::Step>,
    pub directive: Option<crate::quant::GptqConfig>,
    pub saved_to: Vec<std::path::PathBuf>,
}

impl RecordingBackend {
    fn enter(&mut self, step: crate::pipeline::Step) -> crate::pipeline::Result<()> {
        self.calls.push(step);
        if self.fail_at == Some(step) {
            return Err(crate::model::ModelError::MissingTensor(format!("{step}")).into());
        }
        Ok(())
    }
}

impl crate::pipeline::QuantizationBackend for RecordingBackend {
    type Tokenizer = String;
    type Model = bool;

    fn load_tokenizer(&mut self, model_id: &str) -> crate::pipeline::Result<String> {
        self.enter(crate::pipeline::Step::LoadTokenizer)?;
        Ok(format!("tokenizer:{model_id}"))
    }

    fn quantization_config(
        &mut self,
        job: &crate::config::JobConfig,
    ) -> crate::pipeline::Result<crate::quant::GptqConfig> {
        self.enter(crate::pipeline::Step::BuildDirective)?;
        Ok(crate::quant::GptqConfig::new(job.bits, job.dataset.clone(), job.group_size)?)
    }

    fn load_quantized(
        &mut self,
        _job: &crate::config::JobConfig,
        directive: &crate::pipeline::QuantizationDirective<'_, String>,
    ) -> crate::pipeline::Result<bool> {
        self.enter(crate::pipeline::Step::LoadModel)?;
        self.directive = Some(directive.config.clone());
        Ok(false)
    }

    fn to_cpu(&mut self, model: &mut bool) -> crate::pipeline::Result<()> {
        self.enter(crate::pipeline::Step::MoveToCpu)?;
        *model = true;
        Ok(())
    }

    fn save_model(&mut self, model: &bool, dir: &Path) -> crate::pipeline::Result<()> {
        assert!(*model, "model saved before moving to CPU");
        self.enter(crate::pipeline::Step::SaveModel)?;
        self.saved_to.push(dir.to_path_buf());
        Ok(())
    }

    fn save_tokenizer(&mut self, tokenizer: &String, dir: &Path) -> crate::pipeline::Result<()> {
        assert!(tokenizer.starts_with("tokenizer:"));
        self.enter(crate::pipeline::Step::SaveTokenizer)?;
        self.saved_to.push(dir.to_path_buf());
        Ok(())
    }
}
