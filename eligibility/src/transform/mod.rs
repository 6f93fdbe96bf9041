//! Transformation module.
//!
//! - Operations: per-field coercion chains
//! - Normalizer: raw row + partner config to canonical record
//! - Pipeline: the run orchestrator

pub mod normalizer;
pub mod operations;
pub mod pipeline;

pub use normalizer::{normalize, normalize_detailed, CoercionKind, CoercionNote};
pub use operations::{rules_description, rules_for, Coercion};
pub use pipeline::{run_pipeline, Pipeline, RunPhase};
