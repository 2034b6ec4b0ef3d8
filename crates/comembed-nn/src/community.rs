//! Community regularization gradient.
//!
//! The community term of the objective for node `i` is the log of its mixture
//! likelihood. Its gradient with respect to `φ_i`, weighted by the
//! responsibilities, points toward the centroids of the communities the node
//! belongs to:
//!
//! ```text
//! O₃(φ_i) = ln Σ_c π_ic N(φ_i | ψ_c, Σ_c)
//! g_i     = -clip( λ₂ Σ_c π_ic Σ_c⁻¹ (φ_i - ψ_c),  ±0.1 α )
//! ```
//!
//! Clipping at a tenth of the learning rate keeps the pull bounded no matter
//! how badly conditioned a covariance is.

use comembed_core::{CommunityModel, Error, Responsibilities, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};

/// Result of one community gradient evaluation.
#[derive(Debug, Clone)]
pub struct CommunityStep {
    /// Clipped gradient, already scaled by `lambda2`; add it to the node row.
    pub gradient: Array1<f32>,
    /// `Σ_c π_ic N(φ_i | ψ_c, Σ_c)`; not a logarithm.
    pub likelihood: f64,
}

/// Clip bound applied to every gradient element.
#[inline]
pub fn clip_bound(learning_rate: f32) -> f32 {
    0.1 * learning_rate
}

/// Community gradient for row `index` of `node_embedding`.
pub fn community_gradient(
    node_embedding: ArrayView2<'_, f32>,
    model: &CommunityModel,
    responsibilities: &Responsibilities,
    learning_rate: f32,
    lambda2: f32,
    index: usize,
) -> Result<CommunityStep> {
    if index >= node_embedding.nrows() {
        return Err(Error::IndexOutOfBounds {
            index,
            len: node_embedding.nrows(),
            what: "node embedding",
        });
    }
    community_gradient_row(
        node_embedding.row(index),
        model,
        responsibilities.row(index)?,
        learning_rate,
        lambda2,
    )
}

/// Community gradient for a single embedding row with its responsibility row.
///
/// Pure: nothing is mutated, the caller applies the returned gradient.
/// A negative or non-finite `learning_rate` is an [`Error::InvalidConfig`].
pub fn community_gradient_row(
    phi: ArrayView1<'_, f32>,
    model: &CommunityModel,
    pi: ArrayView1<'_, f64>,
    learning_rate: f32,
    lambda2: f32,
) -> Result<CommunityStep> {
    if !(learning_rate.is_finite() && learning_rate >= 0.0) {
        return Err(Error::InvalidConfig(format!(
            "community learning rate must be finite and non-negative, got {learning_rate}"
        )));
    }
    if phi.len() != model.dim() {
        return Err(Error::dim("community gradient (embedding width)", model.dim(), phi.len()));
    }
    if pi.len() != model.k() {
        return Err(Error::dim("community gradient (communities)", model.k(), pi.len()));
    }

    let phi = phi.mapv(f64::from);
    let mut grad = Array1::<f64>::zeros(phi.len());
    let mut likelihood = 0.0f64;

    for (community, &weight) in model.communities().iter().zip(pi.iter()) {
        let diff = &phi - &community.centroid();
        let pulled = community.inv_covariance().dot(&diff);
        grad.scaled_add(weight * f64::from(lambda2), &pulled);
        likelihood += weight * community.density(phi.view())?;
    }

    let bound = f64::from(clip_bound(learning_rate));
    let gradient = grad.mapv(|g| (-g.clamp(-bound, bound)) as f32);

    Ok(CommunityStep {
        gradient,
        likelihood,
    })
}
