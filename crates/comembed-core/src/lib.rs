// Allow minor clippy style warnings at crate level
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]

//! Data contracts for community-regularized walk embeddings.
//!
//! This crate holds everything the training core reads but never owns:
//!
//! - [`Vocab`] - A node of the walk corpus (embedding row + frequency)
//! - [`SamplingTable`] - Smoothed-unigram table for negative sampling
//! - [`corpus`] - Epoch repetition and worker chunking of walk corpora
//! - [`CommunityModel`] / [`Responsibilities`] - Gaussian mixture over embeddings
//!
//! # From Walks to Communities
//!
//! Walk-based embeddings (DeepWalk, node2vec) only see local co-occurrence.
//! Community embedding (Cavallari et al. 2017, "ComE") closes the loop with a
//! global signal: fit a Gaussian mixture on the node embeddings, then pull
//! each node toward the centroids of the communities it likely belongs to.
//!
//! ```text
//! walks ──► skip-gram (first/second order) ──► φ
//!                                              │
//!            ψ, Σ, π  ◄── EM over φ ◄──────────┘
//!              │
//!              └──► community gradient on φ
//! ```
//!
//! # Example
//!
//! ```rust
//! use comembed_core::{SamplingTable, TableConfig, Vocab};
//!
//! let vocab: Vec<Vocab> = (0..4).map(|i| Vocab::new(i).with_count(10 * (i as u64 + 1))).collect();
//! let table = SamplingTable::from_vocab(&vocab, TableConfig::default().with_size(1_000))?;
//! assert_eq!(table.distinct(), 4);
//! # Ok::<(), comembed_core::Error>(())
//! ```

pub mod community;
pub mod corpus;
mod error;
pub mod linalg;
mod table;
mod vocab;

pub use community::{Community, CommunityModel, Responsibilities};
pub use corpus::{chunked, chunked_arrays, Chunked, RepeatCorpus};
pub use error::{Error, Result};
pub use table::{SamplingTable, TableConfig};
pub use vocab::{ByCount, Vocab};

// Re-export ndarray so callers build matrices against the same version
pub use ndarray;
