//! Run options.
//!
//! Filled from CLI flags, with environment fallbacks resolved by `clap`
//! (`ELIGIBILITY_REGISTRY`, `ELIGIBILITY_OUTPUT`, `ELIGIBILITY_REJECTS`).

use std::path::PathBuf;

use crate::output::{Destination, DEFAULT_OUTPUT_PATH};
use crate::registry::DEFAULT_REGISTRY_PATH;

pub const ENV_REGISTRY: &str = "ELIGIBILITY_REGISTRY";
pub const ENV_OUTPUT: &str = "ELIGIBILITY_OUTPUT";
pub const ENV_REJECTS: &str = "ELIGIBILITY_REJECTS";

/// Options for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Partner registry document
    pub registry_path: PathBuf,

    /// Unified table destination
    pub output: Destination,

    /// Audit CSV for dropped rows; not written when `None`
    pub rejects_path: Option<PathBuf>,

    /// JSON run report; not written when `None`
    pub report_path: Option<PathBuf>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            registry_path: PathBuf::from(DEFAULT_REGISTRY_PATH),
            output: Destination::File(PathBuf::from(DEFAULT_OUTPUT_PATH)),
            rejects_path: None,
            report_path: None,
        }
    }
}

impl RunOptions {
    pub fn with_registry(mut self, path: impl Into<PathBuf>) -> Self {
        self.registry_path = path.into();
        self
    }

    pub fn with_output(mut self, output: Destination) -> Self {
        self.output = output;
        self
    }

    pub fn with_rejects(mut self, path: Option<PathBuf>) -> Self {
        self.rejects_path = path;
        self
    }

    pub fn with_report(mut self, path: Option<PathBuf>) -> Self {
        self.report_path = path;
        self
    }
}
