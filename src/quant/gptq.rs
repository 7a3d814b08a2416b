//! GPTQ column-by-column solver

use ndarray::{s, Array2, ArrayView2, Axis};

use super::error::{QuantError, Result};
use super::hessian::InverseHessian;
use super::params::find_params;

/// Columns processed per lazy-update block
pub const BLOCK_SIZE: usize = 128;

/// Integer codes and grid parameters for one weight matrix
#[derive(Clone, Debug, PartialEq)]
pub struct QuantizedWeight {
    /// Codes in `[0, maxq]`, `[out, in]`
    pub codes: Array2<u32>,
    /// Scales, `[groups, out]`
    pub scales: Array2<f32>,
    /// Integer zero points, `[groups, out]`
    pub zeros: Array2<u32>,
    /// Group index of each input column
    pub g_idx: Vec<i32>,
    /// Bits per code
    pub bits: u8,
    /// Columns per group
    pub group_size: usize,
}

impl QuantizedWeight {
    /// Output features
    #[must_use]
    pub fn out_features(&self) -> usize {
        self.codes.nrows()
    }

    /// Input features
    #[must_use]
    pub fn in_features(&self) -> usize {
        self.codes.ncols()
    }

    /// Reconstructed weight, `[out, in]`
    #[must_use]
    pub fn dequantize(&self) -> Array2<f32> {
        let mut out = Array2::zeros(self.codes.raw_dim());
        for ((row, col), value) in out.indexed_iter_mut() {
            let g = self.g_idx[col] as usize;
            let zero = self.zeros[[g, row]] as f32;
            *value = self.scales[[g, row]] * (self.codes[[row, col]] as f32 - zero);
        }
        out
    }
}

/// Quantizes one linear layer at a time
#[derive(Clone, Debug)]
pub struct GptqSolver {
    bits: u8,
    group_size: usize,
    sym: bool,
    block_size: usize,
}

impl GptqSolver {
    /// Solver for `bits` with groups of `group_size` input columns
    #[must_use]
    pub fn new(bits: u8, group_size: usize, sym: bool) -> Self {
        Self { bits, group_size: group_size.max(1), sym, block_size: BLOCK_SIZE }
    }

    /// Override the lazy-update block width
    #[must_use]
    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    fn maxq(&self) -> u32 {
        (1u32 << self.bits) - 1
    }

    /// Quantize `weight` (`[out, in]`), returning codes and the squared-error loss
    ///
    /// Each column's rounding error is spread over the not-yet-quantized
    /// columns through `hinv`. With [`InverseHessian::Identity`] no error is
    /// propagated and the result is plain round-to-nearest per group.
    ///
    /// # Errors
    ///
    /// Returns an error if `hinv` does not match the input dimension.
    pub fn quantize(
        &self,
        weight: ArrayView2<'_, f32>,
        hinv: &InverseHessian,
    ) -> Result<(QuantizedWeight, f32)> {
        let (rows, cols) = weight.dim();
        if let Some(n) = hinv.columns() {
            if n != cols {
                return Err(QuantError::ShapeMismatch {
                    expected: format!("{n} input columns"),
                    actual: format!("{cols}"),
                });
            }
        }

        let group_size = self.group_size.min(cols.max(1));
        let groups = cols.div_ceil(group_size);
        let maxq = self.maxq();

        let mut w = weight.to_owned();
        for col in 0..cols {
            if hinv.is_dead(col) {
                w.column_mut(col).fill(0.0);
            }
        }

        let mut codes = Array2::<u32>::zeros((rows, cols));
        let mut scales = Array2::<f32>::zeros((groups, rows));
        let mut zeros = Array2::<u32>::zeros((groups, rows));
        let mut params = find_params(w.slice(s![.., ..group_size.min(cols)]), maxq, self.sym);
        let mut loss = 0.0f32;

        for i1 in (0..cols).step_by(self.block_size) {
            let i2 = (i1 + self.block_size).min(cols);
            let count = i2 - i1;
            let mut w1 = w.slice(s![.., i1..i2]).to_owned();
            let mut err1 = Array2::<f32>::zeros((rows, count));

            for i in 0..count {
                let col = i1 + i;
                if col % group_size == 0 {
                    // grid from `w`, which only carries updates from earlier blocks
                    let end = (col + group_size).min(cols);
                    params = find_params(w.slice(s![.., col..end]), maxq, self.sym);
                    let g = col / group_size;
                    scales.row_mut(g).assign(&params.scale);
                    zeros.row_mut(g).assign(&params.zero.mapv(|z| z as u32));
                }

                let d = match hinv {
                    InverseHessian::Identity => 1.0,
                    InverseHessian::Dense { upper, .. } => upper[[col, col]],
                };
                for r in 0..rows {
                    let x = w1[[r, i]];
                    let q = params.quantize(r, x, maxq);
                    codes[[r, col]] = q;
                    let e = (x - params.dequantize(r, q)) / d;
                    loss += e * e / 2.0;
                    err1[[r, i]] = e;
                }

                if let InverseHessian::Dense { upper, .. } = hinv {
                    let h_row = upper.slice(s![col, (col + 1)..i2]);
                    let e = err1.column(i).insert_axis(Axis(1));
                    let update = e.dot(&h_row.insert_axis(Axis(0)));
                    let mut rest = w1.slice_mut(s![.., (i + 1)..]);
                    rest -= &update;
                }
            }

            if let InverseHessian::Dense { upper, .. } = hinv {
                if i2 < cols {
                    let update = err1.dot(&upper.slice(s![i1..i2, i2..]));
                    let mut rest = w.slice_mut(s![.., i2..]);
                    rest -= &update;
                }
            }
        }

        let g_idx = (0..cols).map(|i| (i / group_size) as i32).collect();
        let quantized =
            QuantizedWeight { codes, scales, zeros, g_idx, bits: self.bits, group_size };
        Ok((quantized, loss))
    }
}
