//! Hessian accumulation and inverse factorization

use ndarray::{s, Array2, ArrayView2, Axis};

use super::error::{QuantError, Result};

/// Running `2/n Σ x xᵀ` over calibration inputs
#[derive(Clone, Debug)]
pub struct HessianAccumulator {
    sum: Array2<f64>,
    samples: usize,
}

impl HessianAccumulator {
    /// Accumulator for inputs of `columns` features
    #[must_use]
    pub fn new(columns: usize) -> Self {
        Self { sum: Array2::zeros((columns, columns)), samples: 0 }
    }

    /// Number of input rows seen
    #[must_use]
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Add one row per input token
    ///
    /// # Errors
    ///
    /// Returns an error if the feature count differs from the accumulator's.
    pub fn add_batch(&mut self, inputs: ArrayView2<'_, f32>) -> Result<()> {
        let counts = vec![1; inputs.nrows()];
        self.add_repeated(inputs, &counts)
    }

    /// Add rows that each occur `counts[i]` times
    ///
    /// # Errors
    ///
    /// Returns an error if the feature count differs or `counts` does not
    /// match the row count.
    pub fn add_repeated(&mut self, rows: ArrayView2<'_, f32>, counts: &[usize]) -> Result<()> {
        if rows.ncols() != self.sum.ncols() || rows.nrows() != counts.len() {
            return Err(QuantError::ShapeMismatch {
                expected: format!("[{}, {}]", counts.len(), self.sum.ncols()),
                actual: format!("[{}, {}]", rows.nrows(), rows.ncols()),
            });
        }
        let mut scaled = rows.mapv(f64::from);
        for (mut row, &count) in scaled.axis_iter_mut(Axis(0)).zip(counts) {
            row *= (count as f64).sqrt();
        }
        self.sum += &scaled.t().dot(&scaled);
        self.samples += counts.iter().sum::<usize>();
        Ok(())
    }

    /// The averaged Hessian
    #[must_use]
    pub fn finish(self) -> Array2<f64> {
        if self.samples == 0 {
            return self.sum;
        }
        self.sum * (2.0 / self.samples as f64)
    }
}

/// Lower Cholesky factor `L` with `a = L Lᵀ`
///
/// # Errors
///
/// Returns [`QuantError::NotPositiveDefinite`] on a non-positive pivot.
pub fn cholesky(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for j in 0..n {
        let row_j = l.slice(s![j, ..j]).to_owned();
        let pivot = a[[j, j]] - row_j.dot(&row_j);
        if pivot <= 0.0 || !pivot.is_finite() {
            return Err(QuantError::NotPositiveDefinite { column: j });
        }
        let d = pivot.sqrt();
        l[[j, j]] = d;
        for i in (j + 1)..n {
            let dot = l.slice(s![i, ..j]).dot(&row_j);
            l[[i, j]] = (a[[i, j]] - dot) / d;
        }
    }
    Ok(l)
}

/// Inverse of a lower triangular matrix
#[must_use]
pub fn invert_lower(l: &Array2<f64>) -> Array2<f64> {
    let n = l.nrows();
    let mut inv = Array2::<f64>::zeros((n, n));
    for j in 0..n {
        inv[[j, j]] = 1.0 / l[[j, j]];
        for i in (j + 1)..n {
            let dot = l.slice(s![i, j..i]).dot(&inv.slice(s![j..i, j]));
            inv[[i, j]] = -dot / l[[i, i]];
        }
    }
    inv
}

/// Per-column inverse-Hessian information consumed by the solver
#[derive(Clone, Debug)]
pub enum InverseHessian {
    /// No calibration statistics: every column independent
    Identity,
    /// Upper Cholesky factor of the damped inverse Hessian
    Dense {
        /// `U` with `H⁻¹ = Uᵀ U`
        upper: Array2<f32>,
        /// Columns with zero curvature
        dead: Vec<bool>,
    },
}

impl InverseHessian {
    /// Dampen `h`, invert it and take the upper Cholesky factor of the inverse
    ///
    /// Columns with a zero diagonal are marked dead and given unit curvature.
    ///
    /// # Errors
    ///
    /// Returns an error if `h` is not square or stays indefinite after damping.
    pub fn from_hessian(mut h: Array2<f64>, damp_percent: f32) -> Result<Self> {
        let n = h.nrows();
        if h.ncols() != n {
            return Err(QuantError::ShapeMismatch {
                expected: format!("[{n}, {n}]"),
                actual: format!("[{}, {}]", n, h.ncols()),
            });
        }

        let mut dead = vec![false; n];
        for (i, flag) in dead.iter_mut().enumerate() {
            if h[[i, i]] == 0.0 {
                *flag = true;
                h[[i, i]] = 1.0;
            }
        }

        let damp = f64::from(damp_percent) * h.diag().mean().unwrap_or(1.0);
        h.diag_mut().mapv_inplace(|d| d + damp);

        let l_inv = invert_lower(&cholesky(&h)?);
        let h_inv = l_inv.t().dot(&l_inv);
        let upper = cholesky(&h_inv)?.reversed_axes().mapv(|v| v as f32);

        Ok(Self::Dense { upper, dead })
    }

    /// Number of columns covered, `None` for identity
    #[must_use]
    pub fn columns(&self) -> Option<usize> {
        match self {
            Self::Identity => None,
            Self::Dense { upper, .. } => Some(upper.nrows()),
        }
    }

    /// Whether column `col` saw no calibration signal
    #[must_use]
    pub fn is_dead(&self, col: usize) -> bool {
        match self {
            Self::Identity => false,
            Self::Dense { dead, .. } => dead.get(col).copied().unwrap_or(false),
        }
    }
}
