//! Loading a model with GPTQ quantization applied

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use ndarray::Array2;

use super::config::ModelConfig;
use super::error::{ModelError, Result};
use super::layers::{LayerPlan, LinearSpec};
use super::placement::DevicePlacement;
use super::weights::{read_header, read_shard, read_tensor, RawTensor};
use crate::calibration::CalibrationSet;
use crate::config::DeviceMap;
use crate::hub::ModelArtifact;
use crate::quant::{GptqConfig, GptqSolver, HessianAccumulator, InverseHessian, PackedLinear};

/// Embedding rows gathered per Hessian update
const HESSIAN_CHUNK_ROWS: usize = 512;

/// A tensor of the quantized checkpoint
#[derive(Clone, Debug, PartialEq)]
pub enum ModelTensor {
    /// Carried through unquantized, floats narrowed to F16
    Dense(RawTensor),
    /// Replaced by GPTQ tensors
    Quantized(PackedLinear),
}

/// Outcome for one quantized layer
#[derive(Clone, Debug, PartialEq)]
pub struct LayerReport {
    /// Module path
    pub prefix: String,
    /// Input features
    pub in_features: usize,
    /// Output features
    pub out_features: usize,
    /// Weighted squared rounding error
    pub loss: f32,
    /// Whether calibration statistics were used
    pub calibrated: bool,
}

/// Per-layer results of a quantization pass
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuantizationReport {
    /// Quantized layers in load order
    pub layers: Vec<LayerReport>,
    /// Layers left dense
    pub skipped: Vec<String>,
    /// Calibration tokens behind the Hessian
    pub calibration_tokens: usize,
}

/// A checkpoint whose block linear layers have been quantized
#[derive(Clone, Debug)]
pub struct QuantizedModel {
    /// Original `config.json`
    pub config: ModelConfig,
    /// Directive the weights were quantized with
    pub quantization: GptqConfig,
    /// Output tensors keyed by module path (`prefix` for quantized layers,
    /// full tensor name otherwise)
    pub tensors: BTreeMap<String, ModelTensor>,
    /// Where each module lives
    pub placement: DevicePlacement,
    /// `generation_config.json` to copy on save
    pub generation_config: Option<PathBuf>,
    /// Per-layer results
    pub report: QuantizationReport,
}

impl QuantizedModel {
    /// Read every shard, quantizing block linear layers as they stream past
    ///
    /// # Errors
    ///
    /// Returns error if a shard cannot be read, a tensor has an unexpected
    /// shape or dtype, or the calibration Hessian cannot be factorized.
    pub fn load(
        artifact: &ModelArtifact,
        config: ModelConfig,
        quantization: GptqConfig,
        calibration: &CalibrationSet,
        device_map: &DeviceMap,
    ) -> Result<Self> {
        quantization.validate()?;

        let mut shapes = BTreeMap::new();
        let mut owner = HashMap::new();
        for shard in &artifact.weights {
            for (name, shape) in read_header(shard)? {
                owner.insert(name.clone(), shard.clone());
                shapes.insert(name, shape);
            }
        }
        let plan = LayerPlan::build(&shapes, quantization.bits, config.uses_conv1d());
        let placement = DevicePlacement::plan(device_map, plan.num_blocks);

        let (hinv, hidden) = match &plan.embedding {
            Some(name) if !calibration.is_empty() => {
                let shard = owner.get(name).ok_or_else(|| ModelError::MissingTensor(name.clone()))?;
                let embedding = read_tensor(shard, name)?.to_matrix(name)?;
                let hidden = embedding.ncols();
                let h = embedding_hessian(&embedding, calibration)?;
                (Some(InverseHessian::from_hessian(h, quantization.damp_percent)?), hidden)
            }
            _ => (None, 0),
        };

        let group_size = |in_features: usize| {
            crate::config::effective_group_size(quantization.group_size, in_features)
        };

        let identity = InverseHessian::Identity;
        let mut tensors = BTreeMap::new();
        let mut biases = HashMap::new();
        let mut report = QuantizationReport {
            skipped: plan.skipped.clone(),
            calibration_tokens: calibration.total_tokens(),
            ..QuantizationReport::default()
        };

        for shard in &artifact.weights {
            for (name, tensor) in read_shard(shard)? {
                if let Some(spec) = plan.linears.get(&name) {
                    let weight = oriented_weight(&tensor, &name, spec)?;
                    let (layer_hinv, calibrated) = match &hinv {
                        Some(h) if spec.in_features == hidden => (h, true),
                        _ => (&identity, false),
                    };
                    let solver = GptqSolver::new(
                        quantization.bits,
                        group_size(spec.in_features),
                        quantization.sym,
                    );
                    let (quantized, loss) = solver.quantize(weight.view(), layer_hinv)?;
                    tensors.insert(
                        spec.prefix.clone(),
                        ModelTensor::Quantized(PackedLinear::pack(&quantized, None)?),
                    );
                    report.layers.push(LayerReport {
                        prefix: spec.prefix.clone(),
                        in_features: spec.in_features,
                        out_features: spec.out_features,
                        loss,
                        calibrated,
                    });
                } else if let Some(spec) = plan.bias_owner(&name) {
                    biases.insert(spec.prefix.clone(), tensor.to_f32(&name)?);
                } else {
                    tensors.insert(name, ModelTensor::Dense(tensor.into_f16()));
                }
            }
        }

        for (prefix, bias) in biases {
            if let Some(ModelTensor::Quantized(packed)) = tensors.get_mut(&prefix) {
                packed.bias = Some(bias.into_iter().map(half::f16::from_f32).collect());
            }
        }

        Ok(Self {
            config,
            quantization,
            tensors,
            placement,
            generation_config: artifact.generation_config.clone(),
            report,
        })
    }

    /// Move every module to CPU
    pub fn to_cpu(&mut self) {
        self.placement.to_cpu();
    }

    /// Number of quantized layers
    #[must_use]
    pub fn quantized_layers(&self) -> usize {
        self.tensors.values().filter(|t| matches!(t, ModelTensor::Quantized(_))).count()
    }
}

/// `[out, in]` weight matrix for a planned layer
fn oriented_weight(tensor: &RawTensor, name: &str, spec: &LinearSpec) -> Result<Array2<f32>> {
    let matrix = tensor.to_matrix(name)?;
    let matrix = if spec.transposed { matrix.reversed_axes() } else { matrix };
    if matrix.dim() != (spec.out_features, spec.in_features) {
        return Err(ModelError::Shape {
            name: name.to_string(),
            message: format!(
                "expected [{}, {}], got {:?}",
                spec.out_features,
                spec.in_features,
                matrix.dim()
            ),
        });
    }
    Ok(matrix)
}

/// `2/n Σ x xᵀ` over the embeddings of every calibration token
fn embedding_hessian(embedding: &Array2<f32>, calibration: &CalibrationSet) -> Result<Array2<f64>> {
    let (vocab, hidden) = embedding.dim();
    let mut counts: Vec<(u32, usize)> = calibration
        .token_counts()
        .into_iter()
        .filter(|(id, _)| (*id as usize) < vocab)
        .collect();
    counts.sort_unstable();

    let mut acc = HessianAccumulator::new(hidden);
    for chunk in counts.chunks(HESSIAN_CHUNK_ROWS) {
        let mut rows = Array2::<f32>::zeros((chunk.len(), hidden));
        for (i, (id, _)) in chunk.iter().enumerate() {
            rows.row_mut(i).assign(&embedding.row(*id as usize));
        }
        let weights: Vec<usize> = chunk.iter().map(|(_, n)| *n).collect();
        acc.add_repeated(rows.view(), &weights)?;
    }
    Ok(acc.finish())
}
