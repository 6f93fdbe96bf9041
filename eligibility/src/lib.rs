//! # Eligibility - partner member-file normalization
//!
//! Turns heterogeneous partner eligibility files (each with its own
//! delimiter and column names) into one canonical member table. Partners are
//! pure configuration: onboarding one is an edit to the registry document.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Registry   │────▶│   Reader    │────▶│ Normalizer  │────▶│  Validator  │────▶│ Output sink │
//! │ (JSON+schema│     │ (per file,  │     │ (per-field  │     │ (external_id│     │ (unified    │
//! │  checked)   │     │  lazy rows) │     │  coercions) │     │  required)  │     │  CSV)       │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use eligibility::{run_pipeline, CsvSink, NoopRejectSink, RunOptions};
//!
//! let options = RunOptions::default().with_registry("partners.json");
//! let mut sink = CsvSink::new(options.output.clone());
//! let result = run_pipeline(&options, &mut sink, &mut NoopRejectSink)?;
//! eligibility::report::print_summary(&result);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Canonical record and fields
//! - [`registry`] - Partner registry
//! - [`parser`] - Partner file reading with structural skips
//! - [`transform`] - Coercions, normalizer, and pipeline
//! - [`validation`] - Row validation
//! - [`report`] - Run results and summary table
//! - [`output`] - Output and audit sinks
//! - [`logging`] - Tracing setup
//! - [`config`] - Run options

// Core modules
pub mod error;
pub mod models;

// Configuration
pub mod config;
pub mod registry;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// Results and sinks
pub mod output;
pub mod report;

pub mod logging;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{PipelineError, ReaderError, RegistryError, SinkError};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{CanonicalField, CanonicalRecord, CANONICAL_HEADER};

// =============================================================================
// Re-exports - Registry
// =============================================================================

pub use registry::{PartnerConfig, PartnerRegistry};

// =============================================================================
// Re-exports - Reader
// =============================================================================

pub use parser::{read, PartnerRows, RawRow, RowEvent, StructuralSkip};

// =============================================================================
// Re-exports - Normalizer and Validator
// =============================================================================

pub use transform::{normalize, normalize_detailed};
pub use validation::{validate, RejectReason, Validation};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use config::RunOptions;
pub use output::{
    CsvRejectSink, CsvSink, Destination, MemorySink, NoopRejectSink, OutputSink, RejectSink,
};
pub use report::{BatchResult, DropReason, PartnerReport, PartnerStatus, RejectedRow};
pub use transform::pipeline::{run_pipeline, Pipeline, RunPhase};
