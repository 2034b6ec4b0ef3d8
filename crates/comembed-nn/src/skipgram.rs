//! Skip-gram training for node embeddings with community regularization.
//!
//! # Overview
//!
//! Every pair of nodes that co-occur within `window_size` steps of a walk is a
//! positive example; a handful of table draws per pair are the negatives. The
//! node row of each pair is nudged toward its observed neighbour and away from
//! the negatives. With `lambda2 > 0` the same row also drifts toward the mean
//! of the mixture components weighted by its responsibilities, so nodes in one
//! community end up clustered around a shared centroid.
//!
//! # Objective
//!
//! For a walk position `pos` holding the context node `c` and every other
//! position `pos2` in `[pos - w, pos + w]` holding the target node `t`,
//! skip-gram with negative sampling (SGNS) maximizes:
//!
//! ```text
//! λ₁ [ log σ(φ_t · c_c) + Σⱼ log σ(-φ_t · c_nⱼ) ] + λ₂ log Σ_k π_tk N(φ_t | ψ_k, Σ_k)
//! ```
//!
//! with `m` negatives `nⱼ` drawn from the smoothed unigram table and never
//! equal to `t` or `c`.
//!
//! ## First vs Second Order
//!
//! - **First order**: there is only one matrix. Context rows are read from the
//!   node matrix itself and only the target row is written.
//! - **Second order**: a separate context matrix is trained jointly. The
//!   sampled context rows receive `c_j += g_j φ_t` and the negative terms
//!   count toward the log-likelihood.
//!
//! # Sign Convention
//!
//! [`WalkOutcome::log_likelihood`] is a sum of log-probabilities and should go
//! *up* during training. Use [`WalkOutcome::loss`] for a value to minimize.
//!
//! # Example
//!
//! ```rust
//! use comembed_core::SamplingTable;
//! use comembed_nn::{init_node_embeddings, SkipGramUpdater, TrainConfig};
//! use rand::SeedableRng;
//! use rand_xorshift::XorShiftRng;
//!
//! let mut rng = XorShiftRng::seed_from_u64(7);
//! let mut node = init_node_embeddings(6, 8, &mut rng)?;
//! let table = SamplingTable::from_indices((0..6).collect());
//!
//! let updater = SkipGramUpdater::new(TrainConfig::default().with_negative_samples(2))?;
//! let walk = [Some(0usize), Some(1), None, Some(2)];
//! let outcome = updater.train_indices(&mut node, None, &walk, &table, None, &mut rng)?;
//! assert_eq!(outcome.present, 3);
//! # Ok::<(), comembed_core::Error>(())
//! ```
//!
//! # References
//!
//! - Mikolov et al. (2013). "Distributed Representations of Words and Phrases."
//! - Tang et al. (2015). "LINE: Large-scale Information Network Embedding."
//! - Cavallari et al. (2017). "Learning Community Embedding with Community
//!   Detection and Node Embedding on Graphs."

use crate::community::community_gradient_row;
use crate::config::TrainConfig;
use crate::gradient::gradient_with;
use crate::kernel::{Kernel, VectorKernel};
use comembed_core::{CommunityModel, Error, Responsibilities, Result, SamplingTable, Vocab};
use ndarray::{Array1, Array2, ArrayView2};
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use tracing::{debug, instrument, trace};

/// Community parameters consulted when `lambda2 > 0`.
#[derive(Debug, Clone, Copy)]
pub struct CommunityTerm<'a> {
    pub model: &'a CommunityModel,
    pub responsibilities: &'a Responsibilities,
}

impl<'a> CommunityTerm<'a> {
    pub fn new(model: &'a CommunityModel, responsibilities: &'a Responsibilities) -> Self {
        Self {
            model,
            responsibilities,
        }
    }
}

/// What one walk contributed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WalkOutcome {
    /// Walk positions holding an in-vocabulary node.
    pub present: usize,
    /// (target, context) pairs that produced an update.
    pub pairs: usize,
    /// Accumulated weighted log-likelihood (higher is better).
    pub log_likelihood: f64,
}

impl WalkOutcome {
    /// Negated log-likelihood, for minimization.
    pub fn loss(&self) -> f64 {
        -self.log_likelihood
    }

    /// Add another walk's outcome to this one.
    pub fn merge(&mut self, other: &Self) {
        self.present += other.present;
        self.pairs += other.pairs;
        self.log_likelihood += other.log_likelihood;
    }
}

/// Initialize node embeddings uniformly in `±0.5 / dim`.
pub fn init_node_embeddings<R: Rng + ?Sized>(
    num_nodes: usize,
    dim: usize,
    rng: &mut R,
) -> Result<Array2<f32>> {
    if dim == 0 {
        return Err(Error::InvalidConfig("embedding dimension must be positive".into()));
    }
    let bound = 0.5 / dim as f32;
    let dist = Uniform::new(-bound, bound)
        .map_err(|e| Error::InvalidConfig(format!("invalid init bounds: {e}")))?;
    Ok(Array2::from_shape_simple_fn((num_nodes, dim), || dist.sample(rng)))
}

/// Context embeddings start at zero.
pub fn init_context_embeddings(num_nodes: usize, dim: usize) -> Array2<f32> {
    Array2::zeros((num_nodes, dim))
}

/// Draw `count` negatives into `out` (after clearing it and pushing `context`).
///
/// Draws equal to `target` or `context` are rejected; duplicates among the
/// negatives are kept. Gives up with [`Error::SamplingExhausted`] after
/// `max_draws` table draws.
pub fn sample_negatives_into<R: Rng + ?Sized>(
    table: &SamplingTable,
    target: usize,
    context: usize,
    count: usize,
    max_draws: usize,
    out: &mut Vec<usize>,
    rng: &mut R,
) -> Result<()> {
    out.clear();
    out.push(context);

    let mut attempts = 0;
    while out.len() <= count {
        if attempts >= max_draws {
            return Err(Error::SamplingExhausted {
                target,
                context,
                attempts,
            });
        }
        attempts += 1;

        let Some(node) = table.draw(rng) else {
            return Err(Error::SamplingExhausted {
                target,
                context,
                attempts,
            });
        };
        if node != target && node != context {
            out.push(node);
        }
    }
    Ok(())
}

/// Applies the per-walk SGD update to caller-owned embedding matrices.
///
/// The updater holds no embedding state. Calls on disjoint walks may run on
/// different threads only if the caller partitions rows or serializes writes;
/// nothing here locks.
#[derive(Debug, Clone)]
pub struct SkipGramUpdater {
    config: TrainConfig,
    kernel: Kernel,
}

impl SkipGramUpdater {
    /// Create an updater using the process-wide kernel.
    pub fn new(config: TrainConfig) -> Result<Self> {
        Self::with_kernel(config, Kernel::global())
    }

    /// Create an updater with an explicit kernel.
    pub fn with_kernel(config: TrainConfig, kernel: Kernel) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, kernel })
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn kernel(&self) -> Kernel {
        self.kernel
    }

    /// Replace the learning rate, e.g. for linear decay between walks.
    pub fn set_learning_rate(&mut self, lr: f32) -> Result<()> {
        let config = self.config.clone().with_learning_rate(lr);
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Train on a walk of vocabulary entries (`None` = out of vocabulary).
    ///
    /// See [`train_indices`](Self::train_indices).
    pub fn train_walk<R: Rng + ?Sized>(
        &self,
        node: &mut Array2<f32>,
        context: Option<&mut Array2<f32>>,
        walk: &[Option<&Vocab>],
        table: &SamplingTable,
        community: Option<CommunityTerm<'_>>,
        rng: &mut R,
    ) -> Result<WalkOutcome> {
        let indices: Vec<Option<usize>> = walk.iter().map(|v| v.map(|v| v.index)).collect();
        self.train_indices(node, context, &indices, table, community, rng)
    }

    /// Train on a walk of embedding row indices (`None` = out of vocabulary).
    ///
    /// `context = None` trains first-order embeddings only (context rows are
    /// read from `node`); `Some` trains a separate second-order context matrix.
    /// `community` must be provided whenever `lambda2 > 0`.
    ///
    /// Only touched rows change. An error aborts the walk part-way: rows
    /// updated by earlier pairs keep their updates.
    ///
    /// A negative drawn more than once for the same pair updates its context
    /// row once per draw, not once per distinct index.
    #[instrument(level = "trace", skip_all, fields(len = walk.len()))]
    pub fn train_indices<R: Rng + ?Sized>(
        &self,
        node: &mut Array2<f32>,
        mut context: Option<&mut Array2<f32>>,
        walk: &[Option<usize>],
        table: &SamplingTable,
        community: Option<CommunityTerm<'_>>,
        rng: &mut R,
    ) -> Result<WalkOutcome> {
        let cfg = &self.config;
        let community = if cfg.community_enabled() {
            Some(community.ok_or_else(|| {
                Error::InvalidConfig("lambda2 > 0 requires community parameters".into())
            })?)
        } else {
            None
        };
        let context_rows = self.validate(node, context.as_deref(), walk, community)?;

        let mut outcome = WalkOutcome {
            present: walk.iter().filter(|n| n.is_some()).count(),
            ..WalkOutcome::default()
        };
        if table.is_empty() {
            debug!(present = outcome.present, "empty sampling table, walk skipped");
            return Ok(outcome);
        }

        let dim = node.ncols();
        let m = cfg.negative_samples;
        let window = cfg.window_size;
        let floor = cfg.prob_floor;

        let mut labels = Array1::<f32>::zeros(m + 1);
        labels[0] = 1.0;
        let mut indices = Vec::with_capacity(m + 1);
        let mut stacked = Array2::<f32>::zeros((m + 1, dim));
        let mut work = Array1::<f32>::zeros(dim);

        for (pos, &ctx) in walk.iter().enumerate() {
            let Some(ctx) = ctx else {
                continue;
            };

            let start = pos.saturating_sub(window);
            let end = (pos + window + 1).min(walk.len());

            for pos2 in start..end {
                if pos2 == pos {
                    continue;
                }
                let Some(target) = walk[pos2] else {
                    continue;
                };

                sample_negatives_into(
                    table,
                    target,
                    ctx,
                    m,
                    cfg.max_draws_per_pair,
                    &mut indices,
                    rng,
                )?;
                if let Some(&bad) = indices.iter().find(|&&i| i >= context_rows) {
                    return Err(Error::IndexOutOfBounds {
                        index: bad,
                        len: context_rows,
                        what: "context embedding (sampling table entry)",
                    });
                }

                // Snapshot rows: in first-order mode `target` may also be a context row.
                {
                    let rows: ArrayView2<'_, f32> = match context.as_deref() {
                        Some(c) => c.view(),
                        None => node.view(),
                    };
                    for (slot, &i) in indices.iter().enumerate() {
                        stacked.row_mut(slot).assign(&rows.row(i));
                    }
                }
                let target_row = node.row(target).to_owned();

                let (grad, probs) = gradient_with(
                    &self.kernel,
                    target_row.view(),
                    stacked.view(),
                    labels.view(),
                    cfg.learning_rate,
                )?;

                work.fill(0.0);
                for (slot, &g) in grad.iter().enumerate() {
                    self.kernel.axpy(g, stacked.row(slot), work.view_mut());
                }
                outcome.log_likelihood +=
                    f64::from(cfg.lambda1) * f64::from(probs[0].clamp(floor, 1.0 - floor)).ln();

                let community_step = match community {
                    Some(term) => {
                        let step = community_gradient_row(
                            target_row.view(),
                            term.model,
                            term.responsibilities.row(target)?,
                            cfg.learning_rate,
                            cfg.lambda2,
                        )?;
                        outcome.log_likelihood += f64::from(cfg.lambda2)
                            * step.likelihood.max(f64::MIN_POSITIVE).ln();
                        Some(step)
                    }
                    None => None,
                };

                if let Some(ctx_matrix) = context.as_deref_mut() {
                    for (slot, &i) in indices.iter().enumerate() {
                        self.kernel
                            .axpy(grad[slot], target_row.view(), ctx_matrix.row_mut(i));
                    }
                    let negative_ll: f64 = probs
                        .iter()
                        .skip(1)
                        .map(|&p| f64::from((1.0 - p).clamp(floor, 1.0 - floor)).ln())
                        .sum();
                    outcome.log_likelihood += f64::from(cfg.lambda1) * negative_ll;
                }

                self.kernel
                    .axpy(cfg.lambda1, work.view(), node.row_mut(target));
                if let Some(step) = &community_step {
                    self.kernel
                        .axpy(1.0, step.gradient.view(), node.row_mut(target));
                }

                outcome.pairs += 1;
            }
        }

        trace!(
            present = outcome.present,
            pairs = outcome.pairs,
            log_likelihood = outcome.log_likelihood,
            "walk trained"
        );
        Ok(outcome)
    }

    /// Check shapes and indices up front so a bad walk fails before any write.
    /// Returns the number of context rows.
    fn validate(
        &self,
        node: &Array2<f32>,
        context: Option<&Array2<f32>>,
        walk: &[Option<usize>],
        community: Option<CommunityTerm<'_>>,
    ) -> Result<usize> {
        let (rows, dim) = node.dim();
        let context_rows = match context {
            Some(c) => {
                if c.ncols() != dim {
                    return Err(Error::dim("context embedding width", dim, c.ncols()));
                }
                c.nrows()
            }
            None => rows,
        };

        for &index in walk.iter().flatten() {
            if index >= rows {
                return Err(Error::IndexOutOfBounds {
                    index,
                    len: rows,
                    what: "node embedding",
                });
            }
            if index >= context_rows {
                return Err(Error::IndexOutOfBounds {
                    index,
                    len: context_rows,
                    what: "context embedding",
                });
            }
        }

        if let Some(term) = community {
            if term.model.dim() != dim {
                return Err(Error::dim("community model width", dim, term.model.dim()));
            }
            if term.responsibilities.k() != term.model.k() {
                return Err(Error::dim(
                    "responsibility columns",
                    term.model.k(),
                    term.responsibilities.k(),
                ));
            }
            for &index in walk.iter().flatten() {
                term.responsibilities.row(index)?;
            }
        }

        Ok(context_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::PortableKernel;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    fn rng() -> XorShiftRng {
        XorShiftRng::seed_from_u64(42)
    }

    fn portable(config: TrainConfig) -> SkipGramUpdater {
        SkipGramUpdater::with_kernel(config, Kernel::Portable(PortableKernel)).unwrap()
    }

    fn small_config() -> TrainConfig {
        TrainConfig::default()
            .with_negative_samples(2)
            .with_window_size(1)
            .with_learning_rate(0.05)
    }

    #[test]
    fn test_init_shapes() {
        let mut r = rng();
        let node = init_node_embeddings(10, 16, &mut r).unwrap();
        assert_eq!(node.dim(), (10, 16));
        assert!(node.iter().all(|v| v.abs() <= 0.5 / 16.0));
        assert!(init_context_embeddings(10, 16).iter().all(|&v| v == 0.0));
        assert!(init_node_embeddings(3, 0, &mut r).is_err());
    }

    #[test]
    fn test_all_oov_walk_is_noop() {
        let mut r = rng();
        let mut node = init_node_embeddings(5, 4, &mut r).unwrap();
        let mut ctx = init_node_embeddings(5, 4, &mut r).unwrap();
        let (node0, ctx0) = (node.clone(), ctx.clone());
        let table = SamplingTable::from_indices((0..5).collect());

        let outcome = portable(small_config())
            .train_indices(&mut node, Some(&mut ctx), &[None, None, None], &table, None, &mut r)
            .unwrap();
        assert_eq!(outcome.present, 0);
        assert_eq!(outcome.log_likelihood, 0.0);
        assert_eq!(node, node0);
        assert_eq!(ctx, ctx0);
    }

    #[test]
    fn test_single_node_walk() {
        let mut r = rng();
        let mut node = init_node_embeddings(5, 4, &mut r).unwrap();
        let node0 = node.clone();
        let table = SamplingTable::from_indices((0..5).collect());

        let outcome = portable(small_config().with_window_size(3))
            .train_indices(&mut node, None, &[Some(2)], &table, None, &mut r)
            .unwrap();
        assert_eq!(outcome.present, 1);
        assert_eq!(outcome.pairs, 0);
        assert_eq!(outcome.log_likelihood, 0.0);
        assert_eq!(node, node0);
    }

    #[test]
    fn test_zero_window_no_pairs() {
        let mut r = rng();
        let mut node = init_node_embeddings(5, 4, &mut r).unwrap();
        let node0 = node.clone();
        let table = SamplingTable::from_indices((0..5).collect());

        let outcome = portable(small_config().with_window_size(0))
            .train_indices(&mut node, None, &[Some(0), Some(1), Some(2)], &table, None, &mut r)
            .unwrap();
        assert_eq!(outcome.present, 3);
        assert_eq!(outcome.pairs, 0);
        assert_eq!(node, node0);
    }

    #[test]
    fn test_empty_table_skips_updates() {
        let mut r = rng();
        let mut node = init_node_embeddings(3, 4, &mut r).unwrap();
        let node0 = node.clone();
        let outcome = portable(small_config())
            .train_indices(
                &mut node,
                None,
                &[Some(0), Some(1)],
                &SamplingTable::default(),
                None,
                &mut r,
            )
            .unwrap();
        assert_eq!(outcome.present, 2);
        assert_eq!(outcome.pairs, 0);
        assert_eq!(node, node0);
    }

    #[test]
    fn test_oov_gap_breaks_window() {
        let mut r = rng();
        let mut node = init_node_embeddings(5, 4, &mut r).unwrap();
        let table = SamplingTable::from_indices((0..5).collect());
        // window 1 around each present node only reaches the gap
        let outcome = portable(small_config())
            .train_indices(&mut node, None, &[Some(0), None, Some(1)], &table, None, &mut r)
            .unwrap();
        assert_eq!(outcome.present, 2);
        assert_eq!(outcome.pairs, 0);
    }

    #[test]
    fn test_second_order_touches_only_sampled_rows() {
        let mut r = rng();
        let mut node = init_node_embeddings(6, 4, &mut r).unwrap();
        let mut ctx = init_node_embeddings(6, 4, &mut r).unwrap();
        let (node0, ctx0) = (node.clone(), ctx.clone());
        // negatives can only be 3 (0 and 1 are the pair)
        let table = SamplingTable::from_indices(vec![0, 1, 3]);

        let outcome = portable(small_config())
            .train_indices(&mut node, Some(&mut ctx), &[Some(0), Some(1)], &table, None, &mut r)
            .unwrap();
        assert_eq!(outcome.pairs, 2);
        assert!(outcome.log_likelihood.is_finite());
        assert!(outcome.log_likelihood < 0.0);

        for row in [2, 4, 5] {
            assert_eq!(node.row(row), node0.row(row));
            assert_eq!(ctx.row(row), ctx0.row(row));
        }
        assert_eq!(node.row(3), node0.row(3));
        assert_ne!(ctx.row(3), ctx0.row(3));
        assert_ne!(node.row(0), node0.row(0));
        assert_ne!(node.row(1), node0.row(1));
    }

    #[test]
    fn test_first_order_matches_hand_computation() {
        let mut node = array![[0.1f32, 0.2], [0.3, -0.1], [-0.2, 0.4]];
        let table = SamplingTable::from_indices(vec![2]);
        let lr = 0.1;
        let updater = portable(
            TrainConfig::default()
                .with_negative_samples(1)
                .with_window_size(1)
                .with_learning_rate(lr),
        );

        // single pair: context at pos 0 (row 0), target at pos 1 (row 1) and back
        let walk = [Some(0), Some(1)];
        let before = node.clone();
        let mut r = rng();
        let outcome = updater
            .train_indices(&mut node, None, &walk, &table, None, &mut r)
            .unwrap();
        assert_eq!(outcome.pairs, 2);

        // first pair: pos=0 (context 0), pos2=1 (target 1), negative 2
        let t = before.row(1).to_owned();
        let c0 = before.row(0).to_owned();
        let n = before.row(2).to_owned();
        let g0 = (1.0 - sigmoid_f(t.dot(&c0))) * lr;
        let g1 = (0.0 - sigmoid_f(t.dot(&n))) * lr;
        let expected_t = &t + &(&c0 * g0 + &n * g1);
        for (a, b) in node.row(1).iter().zip(expected_t.iter()) {
            assert!((a - b).abs() < 1e-6);
        }

        // second pair: pos=1 (context 1, already updated), pos2=0 (target 0)
        let t = before.row(0).to_owned();
        let c1 = expected_t;
        let g0 = (1.0 - sigmoid_f(t.dot(&c1))) * lr;
        let g1 = (0.0 - sigmoid_f(t.dot(&n))) * lr;
        let expected_0 = &t + &(&c1 * g0 + &n * g1);
        for (a, b) in node.row(0).iter().zip(expected_0.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
        assert_eq!(node.row(2), before.row(2));
    }

    fn sigmoid_f(x: f32) -> f32 {
        1.0 / (1.0 + (-x).exp())
    }

    fn assert_row_close(actual: ndarray::ArrayView1<'_, f32>, expected: &Array1<f32>) {
        for (a, b) in actual.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-6, "{actual:?} vs {expected:?}");
        }
    }

    #[test]
    fn test_second_order_matches_hand_computation() {
        let mut node = array![[0.1f32, 0.2], [0.3, -0.1], [-0.2, 0.4]];
        let mut ctx = array![[0.05f32, -0.3], [0.2, 0.1], [-0.4, 0.25]];
        let table = SamplingTable::from_indices(vec![2]);
        let (lr, lambda1) = (0.1f32, 0.5f32);
        let updater = portable(
            TrainConfig::default()
                .with_negative_samples(1)
                .with_window_size(1)
                .with_learning_rate(lr)
                .with_lambda1(lambda1),
        );

        let (node0, ctx0) = (node.clone(), ctx.clone());
        let mut r = rng();
        let outcome = updater
            .train_indices(&mut node, Some(&mut ctx), &[Some(0), Some(1)], &table, None, &mut r)
            .unwrap();
        assert_eq!(outcome.pairs, 2);

        // first pair: context 0, target 1, negative 2
        let t = node0.row(1).to_owned();
        let c = ctx0.row(0).to_owned();
        let n = ctx0.row(2).to_owned();
        let (p0, p1) = (sigmoid_f(t.dot(&c)), sigmoid_f(t.dot(&n)));
        let (g0, g1) = ((1.0 - p0) * lr, -p1 * lr);
        let expected_node1 = &t + &((&c * g0 + &n * g1) * lambda1);
        let expected_ctx0 = &c + &(&t * g0);
        let ctx2_mid = &n + &(&t * g1);
        let mut expected_ll =
            f64::from(lambda1) * (f64::from(p0).ln() + f64::from(1.0 - p1).ln());

        // second pair: context 1, target 0, negative 2 (already moved)
        let t = node0.row(0).to_owned();
        let c = ctx0.row(1).to_owned();
        let n = ctx2_mid;
        let (p0, p1) = (sigmoid_f(t.dot(&c)), sigmoid_f(t.dot(&n)));
        let (g0, g1) = ((1.0 - p0) * lr, -p1 * lr);
        let expected_node0 = &t + &((&c * g0 + &n * g1) * lambda1);
        let expected_ctx1 = &c + &(&t * g0);
        let expected_ctx2 = &n + &(&t * g1);
        expected_ll += f64::from(lambda1) * (f64::from(p0).ln() + f64::from(1.0 - p1).ln());

        assert_row_close(node.row(0), &expected_node0);
        assert_row_close(node.row(1), &expected_node1);
        assert_eq!(node.row(2), node0.row(2));
        assert_row_close(ctx.row(0), &expected_ctx0);
        assert_row_close(ctx.row(1), &expected_ctx1);
        assert_row_close(ctx.row(2), &expected_ctx2);
        assert!((outcome.log_likelihood - expected_ll).abs() < 1e-6);
    }

    #[test]
    fn test_duplicate_negatives_update_once_per_draw() {
        let mut node = array![[0.1f32, 0.2], [0.3, -0.1], [-0.2, 0.4]];
        let mut ctx = array![[0.05f32, -0.3], [0.2, 0.1], [-0.4, 0.25]];
        let table = SamplingTable::from_indices(vec![2]);
        let lr = 0.1f32;
        let updater = portable(
            TrainConfig::default()
                .with_negative_samples(2)
                .with_window_size(1)
                .with_learning_rate(lr),
        );

        let (node0, ctx0) = (node.clone(), ctx.clone());
        let mut r = rng();
        // the only admissible negative is row 2, so both draws of each pair hit it
        let outcome = updater
            .train_indices(&mut node, Some(&mut ctx), &[Some(0), Some(1)], &table, None, &mut r)
            .unwrap();
        assert_eq!(outcome.pairs, 2);

        let t = node0.row(1).to_owned();
        let n = ctx0.row(2).to_owned();
        let g1 = -sigmoid_f(t.dot(&n)) * lr;
        // both draws hit row 2, each applies its own step
        let ctx2_mid = &n + &(&t * (2.0 * g1));

        let t = node0.row(0).to_owned();
        let g1 = -sigmoid_f(t.dot(&ctx2_mid)) * lr;
        let expected_ctx2 = &ctx2_mid + &(&t * (2.0 * g1));
        assert_row_close(ctx.row(2), &expected_ctx2);
    }

    #[test]
    fn test_community_step_added_to_node_row() {
        let mut node = array![[0.1f32, 0.2], [0.3, -0.1], [-0.2, 0.4]];
        let centroids = array![[1.0, 0.0], [-1.0, 0.0]];
        let model = CommunityModel::new(centroids.view(), &[Array2::eye(2), Array2::eye(2)]).unwrap();
        let pi = Responsibilities::new(array![[0.5, 0.5], [0.3, 0.7], [1.0, 0.0]]).unwrap();
        let table = SamplingTable::from_indices(vec![2]);
        let (lr, lambda1, lambda2) = (0.1f32, 0.8f32, 0.01f32);
        let updater = portable(
            TrainConfig::default()
                .with_negative_samples(1)
                .with_window_size(1)
                .with_learning_rate(lr)
                .with_lambda1(lambda1)
                .with_lambda2(lambda2),
        );

        let before = node.clone();
        let mut r = rng();
        let outcome = updater
            .train_indices(
                &mut node,
                None,
                &[Some(0), Some(1)],
                &table,
                Some(CommunityTerm::new(&model, &pi)),
                &mut r,
            )
            .unwrap();
        assert_eq!(outcome.pairs, 2);

        // first pair: target 1 reads context row 0 and negative row 2 from `node`
        let t = before.row(1).to_owned();
        let c = before.row(0).to_owned();
        let n = before.row(2).to_owned();
        let p0 = sigmoid_f(t.dot(&c));
        let (g0, g1) = ((1.0 - p0) * lr, -sigmoid_f(t.dot(&n)) * lr);
        let step = community_gradient_row(t.view(), &model, pi.row(1).unwrap(), lr, lambda2)
            .unwrap();
        // inside the clip bound, so the step is the raw pull
        assert!((step.gradient[0] + 0.007).abs() < 1e-6, "{:?}", step.gradient);
        let expected_node1 = &t + &((&c * g0 + &n * g1) * lambda1) + &step.gradient;
        let mut expected_ll = f64::from(lambda1) * f64::from(p0).ln()
            + f64::from(lambda2) * step.likelihood.ln();

        // second pair: target 0, context row 1 already moved
        let t = before.row(0).to_owned();
        let c = expected_node1.clone();
        let p0 = sigmoid_f(t.dot(&c));
        let (g0, g1) = ((1.0 - p0) * lr, -sigmoid_f(t.dot(&n)) * lr);
        let step = community_gradient_row(t.view(), &model, pi.row(0).unwrap(), lr, lambda2)
            .unwrap();
        let expected_node0 = &t + &((&c * g0 + &n * g1) * lambda1) + &step.gradient;
        expected_ll += f64::from(lambda1) * f64::from(p0).ln()
            + f64::from(lambda2) * step.likelihood.ln();

        assert_row_close(node.row(1), &expected_node1);
        assert_row_close(node.row(0), &expected_node0);
        assert_eq!(node.row(2), before.row(2));
        assert!((outcome.log_likelihood - expected_ll).abs() < 1e-6);
    }

    #[test]
    fn test_sampling_exhausted() {
        let mut r = rng();
        let mut node = init_node_embeddings(3, 4, &mut r).unwrap();
        // only the pair itself is in the table: no admissible negative
        let table = SamplingTable::from_indices(vec![0, 1]);
        let err = portable(small_config().with_max_draws_per_pair(50))
            .train_indices(&mut node, None, &[Some(0), Some(1)], &table, None, &mut r);
        assert!(matches!(
            err,
            Err(Error::SamplingExhausted { attempts: 50, .. })
        ));
    }

    #[test]
    fn test_table_index_out_of_range() {
        let mut r = rng();
        let mut node = init_node_embeddings(3, 4, &mut r).unwrap();
        let table = SamplingTable::from_indices(vec![7]);
        let err = portable(small_config().with_negative_samples(1))
            .train_indices(&mut node, None, &[Some(0), Some(1)], &table, None, &mut r);
        assert!(matches!(err, Err(Error::IndexOutOfBounds { index: 7, .. })));
    }

    #[test]
    fn test_walk_index_out_of_range_fails_before_writes() {
        let mut r = rng();
        let mut node = init_node_embeddings(3, 4, &mut r).unwrap();
        let node0 = node.clone();
        let table = SamplingTable::from_indices((0..3).collect());
        let err = portable(small_config())
            .train_indices(&mut node, None, &[Some(0), Some(1), Some(9)], &table, None, &mut r);
        assert!(matches!(err, Err(Error::IndexOutOfBounds { index: 9, .. })));
        assert_eq!(node, node0);
    }

    #[test]
    fn test_context_width_mismatch() {
        let mut r = rng();
        let mut node = init_node_embeddings(3, 4, &mut r).unwrap();
        let mut ctx = init_context_embeddings(3, 5);
        let table = SamplingTable::from_indices((0..3).collect());
        let err = portable(small_config()).train_indices(
            &mut node,
            Some(&mut ctx),
            &[Some(0), Some(1)],
            &table,
            None,
            &mut r,
        );
        assert!(matches!(err, Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn test_lambda2_requires_community() {
        let mut r = rng();
        let mut node = init_node_embeddings(3, 2, &mut r).unwrap();
        let table = SamplingTable::from_indices((0..3).collect());
        let err = portable(small_config().with_lambda2(0.5))
            .train_indices(&mut node, None, &[Some(0), Some(1)], &table, None, &mut r);
        assert!(matches!(err, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_lambda2_zero_ignores_community() {
        let centroids = array![[1.0, 1.0]];
        let model = CommunityModel::new(centroids.view(), &[Array2::eye(2)]).unwrap();
        let pi = Responsibilities::uniform(4, 1);
        let table = SamplingTable::from_indices((0..4).collect());
        let walk = [Some(0), Some(1), Some(2)];

        let mut r = rng();
        let start = init_node_embeddings(4, 2, &mut r).unwrap();
        let updater = portable(small_config());

        let mut with_term = start.clone();
        let mut rng_a = rng();
        let a = updater
            .train_indices(
                &mut with_term,
                None,
                &walk,
                &table,
                Some(CommunityTerm::new(&model, &pi)),
                &mut rng_a,
            )
            .unwrap();

        let mut without = start.clone();
        let mut rng_b = rng();
        let b = updater
            .train_indices(&mut without, None, &walk, &table, None, &mut rng_b)
            .unwrap();

        assert_eq!(with_term, without);
        assert_eq!(a, b);
    }

    #[test]
    fn test_community_term_adds_likelihood() {
        let centroids = array![[0.0, 0.0]];
        let model = CommunityModel::new(centroids.view(), &[Array2::eye(2)]).unwrap();
        let pi = Responsibilities::uniform(4, 1);
        let table = SamplingTable::from_indices((0..4).collect());
        let walk = [Some(0), Some(1)];

        let mut r = rng();
        let mut node = init_node_embeddings(4, 2, &mut r).unwrap();
        let outcome = portable(small_config().with_lambda2(1.0))
            .train_indices(
                &mut node,
                None,
                &walk,
                &table,
                Some(CommunityTerm::new(&model, &pi)),
                &mut r,
            )
            .unwrap();
        // near the centroid the density is about 1/(2π), so each pair adds ~ln(0.159)
        assert!(outcome.log_likelihood < 2.0 * (1.0f64 / (2.0 * std::f64::consts::PI)).ln() + 0.1);
        assert!(outcome.log_likelihood.is_finite());
    }

    #[test]
    fn test_train_walk_with_vocab() {
        let vocab: Vec<Vocab> = (0..4).map(|i| Vocab::new(i).with_count(1)).collect();
        let walk = [Some(&vocab[0]), None, Some(&vocab[2]), Some(&vocab[3])];
        let table = SamplingTable::from_indices((0..4).collect());
        let mut r = rng();
        let mut node = init_node_embeddings(4, 3, &mut r).unwrap();
        let outcome = portable(small_config())
            .train_walk(&mut node, None, &walk, &table, None, &mut r)
            .unwrap();
        assert_eq!(outcome.present, 3);
        assert_eq!(outcome.pairs, 2);
    }

    #[test]
    fn test_loss_is_negated_likelihood() {
        let mut a = WalkOutcome {
            present: 2,
            pairs: 1,
            log_likelihood: -1.5,
        };
        assert_eq!(a.loss(), 1.5);
        a.merge(&WalkOutcome {
            present: 1,
            pairs: 2,
            log_likelihood: -0.5,
        });
        assert_eq!(a.present, 3);
        assert_eq!(a.pairs, 3);
        assert_eq!(a.log_likelihood, -2.0);
    }

    #[test]
    fn test_set_learning_rate_validates() {
        let mut updater = portable(small_config());
        assert!(updater.set_learning_rate(0.01).is_ok());
        assert!((updater.config().learning_rate - 0.01).abs() < 1e-9);
        assert!(updater.set_learning_rate(-1.0).is_err());
    }
}
