//! Output sinks for accepted records and dropped rows.
//!
//! The unified table is a comma-separated file with the fixed header
//! `external_id,first_name,last_name,dob,email,phone,partner_code`; formatting
//! never depends on the partner.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{SinkError, SinkResult};
use crate::models::{CanonicalRecord, CANONICAL_HEADER};
use crate::report::{BatchResult, RejectedRow};

/// Default location of the unified table (relative to current dir)
pub const DEFAULT_OUTPUT_PATH: &str = "output/unified_eligibility.csv";

const REJECT_HEADER: [&str; 9] = [
    "partner_code",
    "line",
    "reason",
    "external_id",
    "first_name",
    "last_name",
    "dob",
    "email",
    "phone",
];

/// Receives the final ordered record set, once per run.
pub trait OutputSink {
    fn write_records(&mut self, records: &[CanonicalRecord]) -> SinkResult<()>;
}

/// Receives the rows dropped during a run.
pub trait RejectSink {
    fn divert(&mut self, rows: &[RejectedRow]) -> SinkResult<()>;
}

/// Where a CSV sink writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    File(PathBuf),
    Stdout,
}

impl Destination {
    /// `-` means stdout.
    pub fn parse(value: &Path) -> Self {
        if value.as_os_str() == "-" {
            Destination::Stdout
        } else {
            Destination::File(value.to_path_buf())
        }
    }

    fn open(&self) -> SinkResult<Box<dyn Write>> {
        match self {
            Destination::File(path) => {
                ensure_parent_dir(path)?;
                Ok(Box::new(BufWriter::new(File::create(path)?)))
            }
            Destination::Stdout => Ok(Box::new(io::stdout().lock())),
        }
    }
}

fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir),
        _ => Ok(()),
    }
}

fn csv_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer)
}

/// Serialize records as the unified CSV table.
pub fn write_csv<W: Write>(writer: W, records: &[CanonicalRecord]) -> SinkResult<()> {
    let mut wtr = csv_writer(writer);
    wtr.write_record(CANONICAL_HEADER)?;
    for record in records {
        wtr.write_record(record.values())?;
    }
    wtr.flush()?;
    Ok(())
}

/// Serialize dropped rows as an audit CSV.
pub fn write_rejects_csv<W: Write>(writer: W, rows: &[RejectedRow]) -> SinkResult<()> {
    let mut wtr = csv_writer(writer);
    wtr.write_record(REJECT_HEADER)?;
    for row in rows {
        let line = row.line.to_string();
        let mut fields = vec![row.partner_code.as_str(), line.as_str(), row.reason.code()];
        match &row.record {
            Some(record) => fields.extend_from_slice(&record.values()[..6]),
            None => fields.extend_from_slice(&[""; 6]),
        }
        wtr.write_record(&fields)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the run report (without records) as pretty JSON.
pub fn write_report(path: &Path, result: &BatchResult) -> SinkResult<()> {
    ensure_parent_dir(path)?;
    fs::write(path, result.to_json()?)?;
    Ok(())
}

// =============================================================================
// Record sinks
// =============================================================================

/// Writes the unified table as CSV; accepts a single batch.
#[derive(Debug)]
pub struct CsvSink {
    destination: Destination,
    written: bool,
}

impl CsvSink {
    pub fn new(destination: Destination) -> Self {
        Self {
            destination,
            written: false,
        }
    }

    pub fn to_path(path: impl Into<PathBuf>) -> Self {
        Self::new(Destination::File(path.into()))
    }
}

impl OutputSink for CsvSink {
    fn write_records(&mut self, records: &[CanonicalRecord]) -> SinkResult<()> {
        if self.written {
            return Err(SinkError::AlreadyWritten);
        }
        write_csv(self.destination.open()?, records)?;
        self.written = true;
        Ok(())
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<CanonicalRecord>,
    pub batches: usize,
}

impl OutputSink for MemorySink {
    fn write_records(&mut self, records: &[CanonicalRecord]) -> SinkResult<()> {
        self.records.extend_from_slice(records);
        self.batches += 1;
        Ok(())
    }
}

// =============================================================================
// Reject sinks
// =============================================================================

/// Discards dropped rows.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRejectSink;

impl RejectSink for NoopRejectSink {
    fn divert(&mut self, _rows: &[RejectedRow]) -> SinkResult<()> {
        Ok(())
    }
}

/// Writes dropped rows to an audit CSV.
#[derive(Debug)]
pub struct CsvRejectSink {
    destination: Destination,
}

impl CsvRejectSink {
    pub fn new(destination: Destination) -> Self {
        Self { destination }
    }

    pub fn to_path(path: impl Into<PathBuf>) -> Self {
        Self::new(Destination::File(path.into()))
    }
}

impl RejectSink for CsvRejectSink {
    fn divert(&mut self, rows: &[RejectedRow]) -> SinkResult<()> {
        write_rejects_csv(self.destination.open()?, rows)
    }
}

impl RejectSink for Vec<RejectedRow> {
    fn divert(&mut self, rows: &[RejectedRow]) -> SinkResult<()> {
        self.extend_from_slice(rows);
        Ok(())
    }
}
