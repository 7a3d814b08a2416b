//! Safetensors shard reading

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use ndarray::Array2;
use safetensors::{Dtype, SafeTensors};
use serde::Deserialize;

use super::error::{ModelError, Result};

/// Largest header accepted, matching the safetensors format limit
const MAX_HEADER_BYTES: u64 = 100 * 1024 * 1024;

/// An owned tensor in its on-disk dtype
#[derive(Clone, Debug, PartialEq)]
pub struct RawTensor {
    /// Element type
    pub dtype: Dtype,
    /// Dimensions
    pub shape: Vec<usize>,
    /// Little-endian element bytes
    pub data: Vec<u8>,
}

impl RawTensor {
    /// Copy a tensor out of a deserialized shard
    #[must_use]
    pub fn from_view(view: &safetensors::tensor::TensorView<'_>) -> Self {
        Self { dtype: view.dtype(), shape: view.shape().to_vec(), data: view.data().to_vec() }
    }

    /// Build an F16 tensor from floats
    #[must_use]
    pub fn f16(values: &[f32], shape: Vec<usize>) -> Self {
        let data = values.iter().flat_map(|v| half::f16::from_f32(*v).to_le_bytes()).collect();
        Self { dtype: Dtype::F16, shape, data }
    }

    /// The same tensor stored as F16; non-float tensors are returned unchanged
    #[must_use]
    pub fn into_f16(self) -> Self {
        if self.dtype == Dtype::F16 {
            return self;
        }
        match bytes_to_f32(self.dtype, &self.data) {
            Some(values) => Self::f16(&values, self.shape),
            None => self,
        }
    }

    /// Element values widened to f32
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnsupportedDtype`] for non-float dtypes.
    pub fn to_f32(&self, name: &str) -> Result<Vec<f32>> {
        bytes_to_f32(self.dtype, &self.data).ok_or_else(|| ModelError::UnsupportedDtype {
            name: name.to_string(),
            dtype: format!("{:?}", self.dtype),
        })
    }

    /// Values as a `[rows, cols]` matrix
    ///
    /// # Errors
    ///
    /// Returns error if the tensor is not 2-D or not a float dtype.
    pub fn to_matrix(&self, name: &str) -> Result<Array2<f32>> {
        let &[rows, cols] = self.shape.as_slice() else {
            return Err(ModelError::Shape {
                name: name.to_string(),
                message: format!("expected 2 dimensions, got {:?}", self.shape),
            });
        };
        Array2::from_shape_vec((rows, cols), self.to_f32(name)?).map_err(|e| ModelError::Shape {
            name: name.to_string(),
            message: e.to_string(),
        })
    }
}

/// Convert little-endian F32, F16 or BF16 bytes to f32
#[must_use]
pub fn bytes_to_f32(dtype: Dtype, data: &[u8]) -> Option<Vec<f32>> {
    match dtype {
        Dtype::F32 => Some(
            data.chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        Dtype::F16 => Some(
            data.chunks_exact(2)
                .map(|c| half::f16::from_bits(u16::from_le_bytes([c[0], c[1]])).to_f32())
                .collect(),
        ),
        Dtype::BF16 => Some(
            data.chunks_exact(2)
                .map(|c| half::bf16::from_bits(u16::from_le_bytes([c[0], c[1]])).to_f32())
                .collect(),
        ),
        _ => None,
    }
}

#[derive(Deserialize)]
struct HeaderEntry {
    shape: Vec<usize>,
}

/// Tensor names and shapes of one shard, read from its header only
///
/// # Errors
///
/// Returns error if the file cannot be read or the header is malformed.
pub fn read_header(path: &Path) -> Result<BTreeMap<String, Vec<usize>>> {
    let header_error = |message: String| ModelError::Header { path: path.to_path_buf(), message };

    let mut file = std::fs::File::open(path)?;
    let mut len = [0u8; 8];
    file.read_exact(&mut len)?;
    let len = u64::from_le_bytes(len);
    if len > MAX_HEADER_BYTES {
        return Err(header_error(format!("header of {len} bytes is too large")));
    }

    let mut header = vec![0u8; len as usize];
    file.read_exact(&mut header)?;
    let entries: BTreeMap<String, serde_json::Value> =
        serde_json::from_slice(&header).map_err(|e| header_error(e.to_string()))?;

    entries
        .into_iter()
        .filter(|(name, _)| name != "__metadata__")
        .map(|(name, value)| {
            let entry: HeaderEntry =
                serde_json::from_value(value).map_err(|e| header_error(format!("{name}: {e}")))?;
            Ok((name, entry.shape))
        })
        .collect()
}

/// Read every tensor of a shard, sorted by name
///
/// # Errors
///
/// Returns error if the file cannot be read or parsed.
pub fn read_shard(path: &Path) -> Result<BTreeMap<String, RawTensor>> {
    let data = std::fs::read(path)?;
    let tensors = SafeTensors::deserialize(&data)?;
    Ok(tensors
        .tensors()
        .into_iter()
        .map(|(name, view)| (name, RawTensor::from_view(&view)))
        .collect())
}

/// Read one named tensor from a shard
///
/// # Errors
///
/// Returns error if the shard cannot be parsed or lacks the tensor.
pub fn read_tensor(path: &Path, name: &str) -> Result<RawTensor> {
    let data = std::fs::read(path)?;
    let tensors = SafeTensors::deserialize(&data)?;
    let view = tensors.tensor(name).map_err(|_| ModelError::MissingTensor(name.to_string()))?;
    Ok(RawTensor::from_view(&view))
}
