//! Gaussian-mixture community model.
//!
//! Each of `k` communities is a multivariate normal `N(ψ_c, Σ_c)` over the node
//! embedding space. The mixture weights of a node are its row of the
//! responsibility matrix `π`, produced by an external inference step (EM).
//!
//! ```text
//! p(φ_i) = Σ_c π_ic · N(φ_i | ψ_c, Σ_c)
//! ```
//!
//! The normalising constant of every component is computed once here, so
//! evaluating a density only costs one triangular solve.

use crate::error::{Error, Result};
use crate::linalg::Cholesky;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use tracing::debug;

const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// One community: centroid, inverse covariance and the cached covariance factor.
#[derive(Debug, Clone)]
pub struct Community {
    centroid: Array1<f64>,
    inv_covariance: Array2<f64>,
    chol: Cholesky,
    /// `-0.5 (d ln 2π + ln |Σ|)`
    log_norm: f64,
}

impl Community {
    fn build(
        centroid: Array1<f64>,
        covariance: Array2<f64>,
        inv_covariance: Option<Array2<f64>>,
    ) -> Result<Self> {
        let d = centroid.len();
        if covariance.dim() != (d, d) {
            return Err(Error::dim("community covariance", d, covariance.nrows()));
        }
        let chol = Cholesky::new(covariance.view())?;
        let inv_covariance = match inv_covariance {
            Some(inv) => {
                if inv.dim() != (d, d) {
                    return Err(Error::dim("community inverse covariance", d, inv.nrows()));
                }
                inv
            }
            None => chol.inverse(),
        };
        let log_norm = -0.5 * (d as f64 * LN_2PI + chol.log_det());
        Ok(Self {
            centroid,
            inv_covariance,
            chol,
            log_norm,
        })
    }

    pub fn centroid(&self) -> ArrayView1<'_, f64> {
        self.centroid.view()
    }

    pub fn inv_covariance(&self) -> ArrayView2<'_, f64> {
        self.inv_covariance.view()
    }

    /// `ln N(x | ψ, Σ)`.
    pub fn log_density(&self, x: ArrayView1<'_, f64>) -> Result<f64> {
        if x.len() != self.centroid.len() {
            return Err(Error::dim("community density", self.centroid.len(), x.len()));
        }
        let diff = &x - &self.centroid;
        Ok(self.log_norm - 0.5 * self.chol.mahalanobis_sq(diff.view())?)
    }

    /// `N(x | ψ, Σ)`. Underflows to `0.0` far from the centroid.
    pub fn density(&self, x: ArrayView1<'_, f64>) -> Result<f64> {
        Ok(self.log_density(x)?.exp())
    }
}

/// A fixed set of `k` communities over a `d`-dimensional embedding space.
#[derive(Debug, Clone)]
pub struct CommunityModel {
    communities: Vec<Community>,
    dim: usize,
}

impl CommunityModel {
    /// Build from centroids (`k x d`) and covariances (`k` matrices of `d x d`).
    ///
    /// Inverses are derived from the Cholesky factor of each covariance.
    pub fn new(centroids: ArrayView2<'_, f64>, covariances: &[Array2<f64>]) -> Result<Self> {
        Self::assemble(centroids, covariances, None)
    }

    /// Build with externally supplied inverse covariances (e.g. from the EM step).
    ///
    /// The inverses are used for the gradient as given; densities still use
    /// the factorised covariance.
    pub fn with_inverses(
        centroids: ArrayView2<'_, f64>,
        covariances: &[Array2<f64>],
        inv_covariances: &[Array2<f64>],
    ) -> Result<Self> {
        Self::assemble(centroids, covariances, Some(inv_covariances))
    }

    fn assemble(
        centroids: ArrayView2<'_, f64>,
        covariances: &[Array2<f64>],
        inv_covariances: Option<&[Array2<f64>]>,
    ) -> Result<Self> {
        let (k, dim) = centroids.dim();
        if covariances.len() != k {
            return Err(Error::dim("covariance count", k, covariances.len()));
        }
        if let Some(inv) = inv_covariances {
            if inv.len() != k {
                return Err(Error::dim("inverse covariance count", k, inv.len()));
            }
        }

        let communities = centroids
            .axis_iter(Axis(0))
            .enumerate()
            .map(|(c, centroid)| {
                Community::build(
                    centroid.to_owned(),
                    covariances[c].clone(),
                    inv_covariances.map(|inv| inv[c].clone()),
                )
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            k,
            dim,
            external_inverses = inv_covariances.is_some(),
            "built community model"
        );
        Ok(Self { communities, dim })
    }

    /// Number of communities `k`.
    pub fn k(&self) -> usize {
        self.communities.len()
    }

    /// Embedding dimension `d`.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn communities(&self) -> &[Community] {
        &self.communities
    }

    pub fn community(&self, c: usize) -> Option<&Community> {
        self.communities.get(c)
    }
}

/// Posterior community memberships `π`, one row per vocabulary index.
///
/// Rows are used as given; they are not renormalised.
#[derive(Debug, Clone)]
pub struct Responsibilities {
    pi: Array2<f64>,
}

impl Responsibilities {
    pub fn new(pi: Array2<f64>) -> Result<Self> {
        if pi.iter().any(|&p| !p.is_finite() || p < 0.0) {
            return Err(Error::InvalidConfig(
                "responsibilities must be finite and non-negative".into(),
            ));
        }
        Ok(Self { pi })
    }

    /// Every node assigned to every community with weight `1/k`.
    pub fn uniform(num_nodes: usize, k: usize) -> Self {
        let w = if k == 0 { 0.0 } else { 1.0 / k as f64 };
        Self {
            pi: Array2::from_elem((num_nodes, k), w),
        }
    }

    /// Number of vocabulary rows.
    pub fn num_nodes(&self) -> usize {
        self.pi.nrows()
    }

    /// Number of communities.
    pub fn k(&self) -> usize {
        self.pi.ncols()
    }

    pub fn row(&self, index: usize) -> Result<ArrayView1<'_, f64>> {
        if index >= self.pi.nrows() {
            return Err(Error::IndexOutOfBounds {
                index,
                len: self.pi.nrows(),
                what: "responsibility matrix",
            });
        }
        Ok(self.pi.row(index))
    }
}
