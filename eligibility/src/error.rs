//! Error types for the eligibility normalization pipeline.
//!
//! This module defines a hierarchy of error types, one per layer:
//!
//! - [`RegistryError`] - Partner registry loading and checking (fatal)
//! - [`ReaderError`] - Partner file access (scoped to one partner)
//! - [`SinkError`] - Output and audit writers (fatal)
//! - [`PipelineError`] - Top-level run errors
//!
//! Row-level and field-level problems are not errors: structural skips and
//! validation rejections are recorded in the run report, and coercion
//! failures degrade to empty strings.

use std::path::PathBuf;

use thiserror::Error;

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors while loading the partner registry.
///
/// Every variant is fatal for a run: without a usable registry there is
/// nothing to process.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Registry file could not be read.
    #[error("Cannot read partner registry '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Registry document is not valid JSON or does not deserialize.
    #[error("Partner registry JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Registry document violates the registry schema.
    #[error("Partner registry does not match schema: {}", errors.join("; "))]
    Schema { errors: Vec<String> },

    /// No partners configured.
    #[error("Partner registry is empty")]
    Empty,

    /// Partner code is blank.
    #[error("Partner '{partner}' has an empty partner_code")]
    EmptyPartnerCode { partner: String },

    /// Two entries share a partner code.
    #[error("Partner code '{code}' is used by both '{first}' and '{second}'")]
    DuplicatePartnerCode {
        code: String,
        first: String,
        second: String,
    },

    /// Delimiter is not a single usable ASCII character.
    #[error("Partner '{partner}' has an unusable delimiter {delimiter:?}")]
    InvalidDelimiter { partner: String, delimiter: String },

    /// Two source columns map onto the same canonical field.
    #[error("Partner '{partner}' maps both '{first}' and '{second}' to {field}")]
    DuplicateTarget {
        partner: String,
        field: String,
        first: String,
        second: String,
    },

    /// No source column maps to `external_id`.
    #[error("Partner '{partner}' has no column mapped to external_id")]
    MissingIdMapping { partner: String },
}

// =============================================================================
// Reader Errors
// =============================================================================

/// Errors while opening a partner file.
///
/// Scoped to one partner: the orchestrator records the failure and moves on.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// File missing, unreadable, or without a header line.
    #[error("Source unavailable for '{}': {reason}", path.display())]
    SourceUnavailable { path: PathBuf, reason: String },
}

impl ReaderError {
    pub(crate) fn unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

// =============================================================================
// Sink Errors
// =============================================================================

/// Errors from output and audit sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    /// IO error creating or writing the destination.
    #[error("Output IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization error.
    #[error("Output CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("Output JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Sink was handed a second batch.
    #[error("Output sink already received the batch")]
    AlreadyWritten,
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level run errors.
///
/// This is the error type returned by [`crate::transform::pipeline::run_pipeline`].
/// Only registry and sink failures reach it; partner and row failures never do.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Registry could not be loaded.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Output or audit sink failed.
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for reader operations.
pub type ReaderResult<T> = Result<T, ReaderError>;

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
