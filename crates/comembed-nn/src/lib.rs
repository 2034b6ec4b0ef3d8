// Allow minor clippy style warnings at crate level
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]

//! Skip-gram negative sampling with Gaussian-mixture community regularization.
//!
//! Three layers, each usable on its own:
//!
//! | Layer | Entry point | Mutates |
//! |-------|-------------|---------|
//! | Negative-sampling gradient | [`gradient`] | nothing |
//! | Community gradient | [`community_gradient`] | nothing |
//! | Per-walk update | [`SkipGramUpdater::train_walk`] | touched embedding rows |
//!
//! The inner loop runs on a [`Kernel`]: a native SIMD implementation when the
//! CPU supports it, otherwise the portable ndarray one. The choice is made once
//! per process and logged through `tracing`.
//!
//! Embedding matrices are owned by the caller and borrowed for the duration of
//! a call. Nothing is global except the kernel choice.

pub mod community;
mod config;
pub mod gradient;
pub mod kernel;
pub mod skipgram;

pub use community::{community_gradient, community_gradient_row, CommunityStep};
pub use config::TrainConfig;
pub use gradient::{gradient, gradient_with, sigmoid};
pub use kernel::{Kernel, KernelUnavailable, NativeKernel, PortableKernel, VectorKernel};
pub use skipgram::{
    init_context_embeddings, init_node_embeddings, sample_negatives_into, CommunityTerm,
    SkipGramUpdater, WalkOutcome,
};
