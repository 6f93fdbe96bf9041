//! Row Validator
//!
//! Accepts or rejects a canonical record. The only required field is
//! `external_id`; every other field may be empty. Rejection is a value, not
//! an error: the orchestrator counts it and moves on.

use serde::Serialize;
use std::fmt;

use crate::models::CanonicalRecord;

/// Why a canonical record was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum RejectReason {
    /// `external_id` is empty after normalization
    MissingExternalId,
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::MissingExternalId => "missing_external_id",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of validating one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Accepted,
    Rejected(RejectReason),
}

impl Validation {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Validation::Accepted)
    }
}

/// Validate a canonical record.
pub fn validate(record: &CanonicalRecord) -> Validation {
    if record.external_id.trim().is_empty() {
        return Validation::Rejected(RejectReason::MissingExternalId);
    }
    Validation::Accepted
}
