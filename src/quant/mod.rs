//! GPTQ post-training quantization
//!
//! - [`GptqConfig`]: the quantization directive written into saved checkpoints
//! - [`find_params`]: per-group min-max scale and zero point
//! - [`HessianAccumulator`] / [`InverseHessian`]: calibration curvature
//! - [`GptqSolver`]: error-compensating column-wise rounding
//! - [`PackedLinear`]: `qweight` / `qzeros` / `scales` / `g_idx` packing

mod config;
mod error;
mod gptq;
mod hessian;
mod pack;
mod params;


pub use config::{GptqConfig, MAX_MODEL_SEQLEN, PACKABLE_BITS};
pub use error::{QuantError, Result};
pub use gptq::{GptqSolver, QuantizedWeight, BLOCK_SIZE};
pub use hessian::{cholesky, invert_lower, HessianAccumulator, InverseHessian};
pub use pack::{fills_words, pack_codes, unpack_codes, PackedLinear};
pub use params::{find_params, quantize_value, GroupParams};
