//! Negative-sampling gradient.
//!
//! For a target vector `v` and stacked context rows `C = [c₀; c₁; …; c_m]`
//! (row 0 the true context, rows 1..m the negatives) with labels
//! `y = [1, 0, …, 0]`:
//!
//! ```text
//! p = σ(C v)
//! g = (y - p) · α
//! ```
//!
//! `g` is the per-row multiplier for both updates (`v += gᵀ C`,
//! `c_j += g_j v`) and `p` doubles as the probabilities for the
//! log-likelihood.

use crate::kernel::{PortableKernel, VectorKernel};
use comembed_core::{Error, Result};
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

/// Logistic function.
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Compute `(gradient, sigmoid_outputs)` with the portable kernel.
pub fn gradient(
    center: ArrayView1<'_, f32>,
    contexts: ArrayView2<'_, f32>,
    labels: ArrayView1<'_, f32>,
    learning_rate: f32,
) -> Result<(Array1<f32>, Array1<f32>)> {
    gradient_with(&PortableKernel, center, contexts, labels, learning_rate)
}

/// Compute `(gradient, sigmoid_outputs)` with a chosen kernel.
///
/// Fails with [`Error::DimensionMismatch`] when the center width differs from
/// the context width, or when there is not exactly one label per context row.
pub fn gradient_with<K: VectorKernel + ?Sized>(
    kernel: &K,
    center: ArrayView1<'_, f32>,
    contexts: ArrayView2<'_, f32>,
    labels: ArrayView1<'_, f32>,
    learning_rate: f32,
) -> Result<(Array1<f32>, Array1<f32>)> {
    let (rows, width) = contexts.dim();
    if width != center.len() {
        return Err(Error::dim("gradient (context width)", center.len(), width));
    }
    if labels.len() != rows {
        return Err(Error::dim("gradient (labels per context row)", rows, labels.len()));
    }

    let probs: Array1<f32> = contexts
        .axis_iter(Axis(0))
        .map(|row| sigmoid(kernel.dot(center, row)))
        .collect();
    let grad = (&labels - &probs) * learning_rate;

    Ok((grad, probs))
}
