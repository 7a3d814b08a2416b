//! Linear layer discovery

use std::collections::BTreeMap;

use crate::quant::fills_words;

/// Path segments that introduce a repeated decoder block
const BLOCK_CONTAINERS: [&str; 3] = ["layers", "h", "blocks"];

/// Suffixes of input embedding tables across common architectures
const INPUT_EMBEDDING_SUFFIXES: [&str; 4] =
    ["embed_tokens.weight", "wte.weight", "embed_in.weight", "word_embeddings.weight"];

/// Index of the decoder block a tensor belongs to
#[must_use]
pub fn block_index(name: &str) -> Option<usize> {
    let parts: Vec<&str> = name.split('.').collect();
    parts.windows(2).find_map(|pair| {
        if BLOCK_CONTAINERS.contains(&pair[0]) {
            pair[1].parse().ok()
        } else {
            None
        }
    })
}

/// Whether a tensor is the token embedding table
#[must_use]
pub fn is_input_embedding(name: &str) -> bool {
    INPUT_EMBEDDING_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

fn is_excluded(prefix: &str) -> bool {
    let last = prefix.rsplit('.').next().unwrap_or(prefix);
    last.contains("norm")
        || last.starts_with("ln")
        || last.contains("emb")
        || last == "lm_head"
        || last == "wte"
        || last == "wpe"
}

/// A linear layer selected for quantization
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinearSpec {
    /// Module path, e.g. `model.layers.0.self_attn.q_proj`
    pub prefix: String,
    /// Input features
    pub in_features: usize,
    /// Output features
    pub out_features: usize,
    /// Stored `[in, out]` and needs transposing
    pub transposed: bool,
}

/// Which tensors get quantized, and which are carried through
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LayerPlan {
    /// Quantized layers keyed by weight tensor name
    pub linears: BTreeMap<String, LinearSpec>,
    /// Block linear layers left dense because they cannot be packed
    pub skipped: Vec<String>,
    /// Input embedding tensor name
    pub embedding: Option<String>,
    /// Number of decoder blocks
    pub num_blocks: usize,
}

impl LayerPlan {
    /// Plan from every tensor's name and shape
    #[must_use]
    pub fn build<'a>(
        tensors: impl IntoIterator<Item = (&'a String, &'a Vec<usize>)>,
        bits: u8,
        conv1d: bool,
    ) -> Self {
        let mut plan = Self::default();
        let mut max_block = None;

        for (name, shape) in tensors {
            if plan.embedding.is_none() && is_input_embedding(name) {
                plan.embedding = Some(name.clone());
            }
            let Some(block) = block_index(name) else {
                continue;
            };
            max_block = max_block.max(Some(block));

            let Some(prefix) = name.strip_suffix(".weight") else {
                continue;
            };
            let &[rows, cols] = shape.as_slice() else {
                continue;
            };
            if is_excluded(prefix) {
                continue;
            }

            let (in_features, out_features) = if conv1d { (rows, cols) } else { (cols, rows) };
            if in_features % 32 != 0 || !fills_words(out_features, bits) {
                plan.skipped.push(prefix.to_string());
                continue;
            }
            plan.linears.insert(
                name.clone(),
                LinearSpec {
                    prefix: prefix.to_string(),
                    in_features,
                    out_features,
                    transposed: conv1d,
                },
            );
        }

        plan.num_blocks = max_block.map_or(0, |b| b + 1);
        plan
    }

    /// The quantized layer a bias tensor belongs to
    #[must_use]
    pub fn bias_owner(&self, name: &str) -> Option<&LinearSpec> {
        let prefix = name.strip_suffix(".bias")?;
        self.linears.get(&format!("{prefix}.weight"))
    }
}
