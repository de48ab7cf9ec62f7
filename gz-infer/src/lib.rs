//! Evaluator interface and model plumbing.
//!
//! The network itself is an external collaborator; this crate owns the
//! contract (`Evaluator`), the symmetry-averaged root evaluation, the
//! bounded prediction cache, and the on-disk/remote model store.

pub mod cache;
pub mod evaluator;
pub mod model;

pub use cache::{LruMap, PredictionCache};
pub use evaluator::{
    evaluate_symmetry_averaged, symmetry_count_for_budget, Evaluator, InferError, Prediction,
    UniformEvaluator,
};
pub use model::{
    fetch_remote_if_changed, model_fingerprint, LinearModel, ModelManifest, ModelWatcher,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod cache_tests;
#[cfg(test)]
mod model_tests;
