//! Dense symmetric positive-definite helpers.
//!
//! Community covariances are small (`d x d` with `d` the embedding width), so a
//! plain Cholesky factorisation is enough to get both the inverse and the
//! log-determinant needed by the Gaussian density.

use crate::error::{Error, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Lower-triangular Cholesky factor `L` with `A = L Lᵀ`.
#[derive(Debug, Clone)]
pub struct Cholesky {
    lower: Array2<f64>,
}

impl Cholesky {
    /// Factorise a symmetric positive-definite matrix.
    ///
    /// Only the lower triangle of `a` is read.
    pub fn new(a: ArrayView2<'_, f64>) -> Result<Self> {
        let (n, m) = a.dim();
        if n != m {
            return Err(Error::dim("cholesky (square matrix)", n, m));
        }

        let mut lower = Array2::<f64>::zeros((n, n));
        for j in 0..n {
            let mut diag = a[[j, j]];
            for k in 0..j {
                diag -= lower[[j, k]] * lower[[j, k]];
            }
            if diag <= 0.0 || !diag.is_finite() {
                return Err(Error::Linalg(format!(
                    "matrix is not positive definite (pivot {j} = {diag})"
                )));
            }
            let ljj = diag.sqrt();
            lower[[j, j]] = ljj;

            for i in (j + 1)..n {
                let mut s = a[[i, j]];
                for k in 0..j {
                    s -= lower[[i, k]] * lower[[j, k]];
                }
                lower[[i, j]] = s / ljj;
            }
        }

        Ok(Self { lower })
    }

    /// Matrix dimension.
    pub fn dim(&self) -> usize {
        self.lower.nrows()
    }

    /// `ln |A| = 2 Σ ln L_ii`.
    pub fn log_det(&self) -> f64 {
        2.0 * self.lower.diag().iter().map(|v| v.ln()).sum::<f64>()
    }

    /// Solve `L y = b` (forward substitution).
    fn forward(&self, b: ArrayView1<'_, f64>) -> Array1<f64> {
        let n = self.dim();
        let mut y = Array1::<f64>::zeros(n);
        for i in 0..n {
            let mut s = b[i];
            for k in 0..i {
                s -= self.lower[[i, k]] * y[k];
            }
            y[i] = s / self.lower[[i, i]];
        }
        y
    }

    /// Solve `Lᵀ x = y` (back substitution).
    fn backward(&self, y: ArrayView1<'_, f64>) -> Array1<f64> {
        let n = self.dim();
        let mut x = Array1::<f64>::zeros(n);
        for i in (0..n).rev() {
            let mut s = y[i];
            for k in (i + 1)..n {
                s -= self.lower[[k, i]] * x[k];
            }
            x[i] = s / self.lower[[i, i]];
        }
        x
    }

    /// Squared Mahalanobis norm `bᵀ A⁻¹ b = |L⁻¹ b|²`.
    pub fn mahalanobis_sq(&self, b: ArrayView1<'_, f64>) -> Result<f64> {
        if b.len() != self.dim() {
            return Err(Error::dim("mahalanobis", self.dim(), b.len()));
        }
        let y = self.forward(b);
        Ok(y.dot(&y))
    }

    /// Full inverse `A⁻¹`, solved column by column.
    pub fn inverse(&self) -> Array2<f64> {
        let n = self.dim();
        let mut inv = Array2::<f64>::zeros((n, n));
        let mut e = Array1::<f64>::zeros(n);
        for col in 0..n {
            e.fill(0.0);
            e[col] = 1.0;
            let y = self.forward(e.view());
            let x = self.backward(y.view());
            inv.column_mut(col).assign(&x);
        }
        inv
    }
}
