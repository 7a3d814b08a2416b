//! Per-row scale and zero-point search

use ndarray::{Array1, ArrayView2, Axis};

/// Scale and zero point for every output row of one column group
#[derive(Clone, Debug, PartialEq)]
pub struct GroupParams {
    /// One scale per row
    pub scale: Array1<f32>,
    /// One integer zero point per row
    pub zero: Array1<f32>,
}

impl GroupParams {
    /// Integer code for `x` in row `row`
    #[must_use]
    pub fn quantize(&self, row: usize, x: f32, maxq: u32) -> u32 {
        quantize_value(x, self.scale[row], self.zero[row], maxq)
    }

    /// Real value for code `q` in row `row`
    #[must_use]
    pub fn dequantize(&self, row: usize, q: u32) -> f32 {
        self.scale[row] * (q as f32 - self.zero[row])
    }
}

/// Min-max parameters over the columns of `weights` (`[rows, cols]`)
///
/// The range always contains zero. A symmetric grid centers the zero point at
/// `(maxq + 1) / 2`; an all-zero row gets the range `[-1, 1]`.
#[must_use]
pub fn find_params(weights: ArrayView2<'_, f32>, maxq: u32, sym: bool) -> GroupParams {
    let rows = weights.nrows();
    let mut scale = Array1::zeros(rows);
    let mut zero = Array1::zeros(rows);
    let maxq_f = maxq as f32;

    for (r, row) in weights.axis_iter(Axis(0)).enumerate() {
        let mut xmin = row.iter().copied().fold(0.0f32, f32::min);
        let mut xmax = row.iter().copied().fold(0.0f32, f32::max);

        if sym {
            xmax = xmin.abs().max(xmax);
            if xmin < 0.0 {
                xmin = -xmax;
            }
        }
        if xmin == 0.0 && xmax == 0.0 {
            xmin = -1.0;
            xmax = 1.0;
        }

        let s = (xmax - xmin) / maxq_f;
        scale[r] = s;
        zero[r] = if sym { (maxq_f + 1.0) / 2.0 } else { (-xmin / s).round() };
    }

    GroupParams { scale, zero }
}

/// Round `x` onto the grid and clamp to `[0, maxq]`
#[must_use]
pub fn quantize_value(x: f32, scale: f32, zero: f32, maxq: u32) -> u32 {
    ((x / scale).round() + zero).clamp(0.0, maxq as f32) as u32
}
