//! Pipeline Orchestrator.
//!
//! Drives Reader -> Normalizer -> Validator for every registered partner, in
//! registry order, and accumulates the run's [`BatchResult`]. A partner whose
//! source cannot be opened is recorded and skipped; it never aborts the run.
//!
//! ```text
//! Idle -> LoadingRegistry -> ProcessingPartner(0..n) -> Aggregating -> Done
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use eligibility::{run_pipeline, CsvSink, NoopRejectSink, RunOptions};
//!
//! let options = RunOptions::default();
//! let mut sink = CsvSink::new(options.output.clone());
//! let result = run_pipeline(&options, &mut sink, &mut NoopRejectSink)?;
//! println!("{} accepted", result.accepted());
//! ```

use std::borrow::Cow;
use std::fmt;
use std::path::Path;

use tracing::{debug, error, info, trace, warn};

use crate::config::RunOptions;
use crate::error::{PipelineResult, RegistryResult};
use crate::logging::redact_value;
use crate::models::CanonicalRecord;
use crate::output::{write_report, OutputSink, RejectSink};
use crate::parser::{self, RowEvent};
use crate::registry::{PartnerConfig, PartnerRegistry};
use crate::report::{BatchResult, DropReason, PartnerReport, PartnerStatus, RejectedRow};
use crate::validation::{validate, Validation};

use super::normalizer::{normalize_detailed, CoercionKind};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    LoadingRegistry,
    /// Index into the registry's processing order
    ProcessingPartner(usize),
    Aggregating,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Idle => f.write_str("idle"),
            RunPhase::LoadingRegistry => f.write_str("loading_registry"),
            RunPhase::ProcessingPartner(i) => write!(f, "processing_partner({})", i),
            RunPhase::Aggregating => f.write_str("aggregating"),
            RunPhase::Done => f.write_str("done"),
        }
    }
}

fn enter(current: &mut RunPhase, phase: RunPhase) {
    *current = phase;
    debug!(phase = %phase, "Run phase");
}

/// Sequential, single-run orchestrator over a registry.
#[derive(Debug)]
pub struct Pipeline<'a> {
    registry: Cow<'a, PartnerRegistry>,
    phase: RunPhase,
}

impl<'a> Pipeline<'a> {
    /// Orchestrator over an already loaded registry, starting `Idle`.
    pub fn new(registry: &'a PartnerRegistry) -> Self {
        Self {
            registry: Cow::Borrowed(registry),
            phase: RunPhase::Idle,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn registry(&self) -> &PartnerRegistry {
        &self.registry
    }

    /// Process every partner and return the accumulated batch.
    ///
    /// Records are ordered by partner processing order, then file order.
    pub fn run(&mut self) -> BatchResult {
        if self.phase == RunPhase::Idle {
            enter(&mut self.phase, RunPhase::LoadingRegistry);
        }

        let mut batch = BatchResult::default();

        for (index, config) in self.registry.iter().enumerate() {
            enter(&mut self.phase, RunPhase::ProcessingPartner(index));
            let report = ingest(config, &mut batch);
            batch.partners.push(report);
        }

        enter(&mut self.phase, RunPhase::Aggregating);
        info!(
            partners = batch.partners.len(),
            unavailable = batch.unavailable().count(),
            accepted = batch.accepted(),
            rejected = batch.rejected_count(),
            "Run complete"
        );

        enter(&mut self.phase, RunPhase::Done);
        batch
    }
}

impl Pipeline<'static> {
    /// Load the registry from disk, leaving the orchestrator in `LoadingRegistry`.
    pub fn load(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let path = path.as_ref();
        let mut phase = RunPhase::Idle;
        enter(&mut phase, RunPhase::LoadingRegistry);

        let registry = PartnerRegistry::load(path)?;
        info!(
            partners = registry.len(),
            registry = %path.display(),
            "Registry loaded"
        );

        Ok(Self {
            registry: Cow::Owned(registry),
            phase,
        })
    }
}

/// Run one partner through reader, normalizer and validator.
fn ingest(config: &PartnerConfig, batch: &mut BatchResult) -> PartnerReport {
    let partner = config.partner_id.as_str();
    let mut report = PartnerReport::new(partner, &config.partner_code, config.file_path.clone());
    info!(partner, path = %config.file_path.display(), "Processing partner");

    let rows = match parser::read(config) {
        Ok(rows) => rows,
        Err(e) => {
            error!(partner, error = %e, "Partner source unavailable, skipping");
            report.status = PartnerStatus::SourceUnavailable {
                reason: e.to_string(),
            };
            return report;
        }
    };

    report.encoding = Some(rows.encoding().to_string());
    debug!(
        partner,
        encoding = rows.encoding(),
        columns = rows.headers().len(),
        "Source opened"
    );

    if let Some(id_column) = config.id_column() {
        if !rows.headers().iter().any(|h| h == id_column) {
            warn!(
                partner,
                column = id_column,
                "external_id column not in header, every row will be rejected"
            );
        }
    }

    for event in rows {
        report.rows_read += 1;

        match event {
            RowEvent::Skipped(skip) => {
                warn!(
                    partner,
                    line = skip.line,
                    expected = skip.expected,
                    found = skip.found,
                    "Skipping malformed line"
                );
                divert(&mut report, batch, skip.line, DropReason::StructuralRowSkip, None);
            }
            RowEvent::Row(row) => {
                let (record, notes) = normalize_detailed(&row, config);
                for note in notes.iter().filter(|n| n.kind == CoercionKind::Invalid) {
                    trace!(partner, line = row.line(), field = %note.field, "Value could not be normalized");
                    report.record_invalid(note.field);
                }
                trace!(
                    partner,
                    line = row.line(),
                    external_id = redact_value(&record.external_id),
                    "Normalized row"
                );

                match validate(&record) {
                    Validation::Accepted => {
                        report.accepted += 1;
                        batch.records.push(record);
                    }
                    Validation::Rejected(reason) => {
                        warn!(partner, line = row.line(), reason = %reason, "Row rejected");
                        let reason = DropReason::Rejected(reason);
                        divert(&mut report, batch, row.line(), reason, Some(record));
                    }
                }
            }
        }
    }

    info!(
        partner,
        rows = report.rows_read,
        accepted = report.accepted,
        rejected = report.rejected(),
        "Partner complete"
    );
    report
}

fn divert(
    report: &mut PartnerReport,
    batch: &mut BatchResult,
    line: u64,
    reason: DropReason,
    record: Option<CanonicalRecord>,
) {
    report.record_drop(reason);
    batch.rejected.push(RejectedRow {
        partner_code: report.partner_code.clone(),
        line,
        reason,
        record,
    });
}

/// Load the registry, run every partner, then hand the results to the sinks.
///
/// The output sink receives the whole record set in a single call, even when
/// it is empty. Only registry and sink failures are errors here.
pub fn run_pipeline(
    options: &RunOptions,
    sink: &mut dyn OutputSink,
    rejects: &mut dyn RejectSink,
) -> PipelineResult<BatchResult> {
    let result = Pipeline::load(&options.registry_path)?.run();

    sink.write_records(&result.records)?;
    rejects.divert(&result.rejected)?;
    if let Some(path) = &options.report_path {
        write_report(path, &result)?;
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CanonicalField;
    use crate::output::{MemorySink, NoopRejectSink};
    use crate::validation::RejectReason;
    use std::fs;
    use std::path::Path;

    fn partner(dir: &Path, id: &str, code: &str, content: Option<&str>) -> PartnerConfig {
        let path = dir.join(format!("{}.csv", id));
        if let Some(content) = content {
            fs::write(&path, content).unwrap();
        }
        PartnerConfig::new(id, code, path)
            .map("id", CanonicalField::ExternalId)
            .map("fname", CanonicalField::FirstName)
    }

    #[test]
    fn test_phases() {
        let dir = tempfile::tempdir().unwrap();
        let registry =
            PartnerRegistry::from_partners(vec![partner(dir.path(), "a", "A", Some("id\n1"))])
                .unwrap();

        let mut pipeline = Pipeline::new(&registry);
        assert_eq!(pipeline.phase(), RunPhase::Idle);
        pipeline.run();
        assert_eq!(pipeline.phase(), RunPhase::Done);
    }

    #[test]
    fn test_load_enters_loading_registry() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("acme.csv"), "id,fname\n1,john").unwrap();
        let registry_path = dir.path().join("partners.json");
        fs::write(
            &registry_path,
            r#"{ "acme": { "partner_code": "ACME", "file_path": "acme.csv",
                 "column_mapping": { "id": "external_id" } } }"#,
        )
        .unwrap();

        let mut pipeline = Pipeline::load(&registry_path).unwrap();
        assert_eq!(pipeline.phase(), RunPhase::LoadingRegistry);
        assert_eq!(pipeline.registry().len(), 1);

        let result = pipeline.run();
        assert_eq!(pipeline.phase(), RunPhase::Done);
        assert_eq!(result.accepted(), 1);
    }

    #[test]
    fn test_load_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Pipeline::load(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_partner_order_then_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let registry = PartnerRegistry::from_partners(vec![
            partner(dir.path(), "b", "B", Some("id,fname\n3,x\n1,y")),
            partner(dir.path(), "a", "A", Some("id,fname\n2,z")),
        ])
        .unwrap();

        let result = Pipeline::new(&registry).run();
        let ids: Vec<&str> = result.records.iter().map(|r| r.external_id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
        assert_eq!(result.records[2].partner_code, "A");
    }

    #[test]
    fn test_missing_source_does_not_abort() {
        let dir = tempfile::tempdir().unwrap();
        let registry = PartnerRegistry::from_partners(vec![
            partner(dir.path(), "gone", "GONE", None),
            partner(dir.path(), "ok", "OK", Some("id,fname\n1,ann")),
        ])
        .unwrap();

        let result = Pipeline::new(&registry).run();
        assert_eq!(result.accepted(), 1);
        assert!(matches!(
            result.partners[0].status,
            PartnerStatus::SourceUnavailable { .. }
        ));
        assert_eq!(result.partners[0].rows_read, 0);
        assert!(result.partners[1].is_available());
    }

    #[test]
    fn test_drops_counted_per_reason() {
        let dir = tempfile::tempdir().unwrap();
        let registry = PartnerRegistry::from_partners(vec![partner(
            dir.path(),
            "acme",
            "ACME",
            Some("id,fname\n1,ann\n2,bob,extra\n ,carl\n4,dee"),
        )])
        .unwrap();

        let result = Pipeline::new(&registry).run();
        let report = &result.partners[0];

        assert_eq!(report.rows_read, 4);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.count(DropReason::StructuralRowSkip), 1);
        assert_eq!(
            report.count(DropReason::Rejected(RejectReason::MissingExternalId)),
            1
        );

        let lines: Vec<u64> = result.rejected.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![3, 4]);
        assert!(result.rejected[0].record.is_none());
        assert_eq!(
            result.rejected[1].record.as_ref().map(|r| r.first_name.as_str()),
            Some("Carl")
        );
    }

    #[test]
    fn test_invalid_values_tallied() {
        let dir = tempfile::tempdir().unwrap();
        let config = partner(
            dir.path(),
            "acme",
            "ACME",
            Some("id,phone\n1,555-1234\n2,5551234567"),
        )
        .map("phone", CanonicalField::Phone);
        let registry = PartnerRegistry::from_partners(vec![config]).unwrap();

        let result = Pipeline::new(&registry).run();
        assert_eq!(result.accepted(), 2);
        assert_eq!(result.records[0].phone, "");
        assert_eq!(result.records[1].phone, "555-123-4567");
        assert_eq!(result.partners[0].coerced_invalid.get(&CanonicalField::Phone), Some(&1));
    }

    #[test]
    fn test_run_pipeline_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("acme.csv"), "id,fname\n1,john").unwrap();
        let registry_path = dir.path().join("partners.json");
        fs::write(
            &registry_path,
            r#"{ "acme": { "partner_code": "ACME", "file_path": "acme.csv",
                 "column_mapping": { "id": "external_id", "fname": "first_name" } } }"#,
        )
        .unwrap();

        let options = RunOptions::default().with_registry(&registry_path);
        let mut sink = MemorySink::default();
        let result = run_pipeline(&options, &mut sink, &mut NoopRejectSink).unwrap();

        assert_eq!(sink.batches, 1);
        assert_eq!(sink.records, result.records);
        assert_eq!(sink.records[0].first_name, "John");
    }

    #[test]
    fn test_run_pipeline_bad_registry_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let options = RunOptions::default().with_registry(dir.path().join("missing.json"));
        let mut sink = MemorySink::default();

        assert!(run_pipeline(&options, &mut sink, &mut NoopRejectSink).is_err());
        assert_eq!(sink.batches, 0);
    }
}
