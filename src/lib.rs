//! `comembed` trains node embeddings from graph random walks with a skip-gram
//! objective and a Gaussian-mixture community regularizer.
//!
//! Design goal: keep the numeric core small and explicit. Callers own the
//! embedding matrices, the sampling table, the corpus and the community model;
//! this crate only applies the per-walk update.
//!
//! - [`core`] - vocabulary, sampling table, corpora, community model
//! - [`nn`] - gradient primitive, community gradient, skip-gram updater
//!
//! ```rust
//! use comembed::core::{CommunityModel, Responsibilities, SamplingTable};
//! use comembed::core::ndarray::{array, Array2};
//! use comembed::nn::{init_node_embeddings, CommunityTerm, SkipGramUpdater, TrainConfig};
//! use rand::SeedableRng;
//!
//! let mut rng = rand_xorshift::XorShiftRng::seed_from_u64(1);
//! let mut node = init_node_embeddings(4, 2, &mut rng)?;
//! let table = SamplingTable::from_indices(vec![0, 1, 2, 3]);
//! let model = CommunityModel::new(array![[0.0, 0.0]].view(), &[Array2::eye(2)])?;
//! let pi = Responsibilities::uniform(4, 1);
//!
//! let updater = SkipGramUpdater::new(
//!     TrainConfig::default().with_negative_samples(1).with_lambda2(0.1),
//! )?;
//! let outcome = updater.train_indices(
//!     &mut node,
//!     None,
//!     &[Some(0), Some(1), Some(2)],
//!     &table,
//!     Some(CommunityTerm::new(&model, &pi)),
//!     &mut rng,
//! )?;
//! assert_eq!(outcome.present, 3);
//! assert!(outcome.loss().is_finite());
//! # Ok::<(), comembed::Error>(())
//! ```

pub use comembed_core as core;
pub use comembed_nn as nn;

pub use comembed_core::{Error, Result};
