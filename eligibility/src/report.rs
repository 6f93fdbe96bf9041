//! Run results and the per-partner summary.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, Table};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::models::{CanonicalField, CanonicalRecord};
use crate::validation::RejectReason;

/// Why a row did not reach the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DropReason {
    /// Field count did not match the header
    StructuralRowSkip,
    /// Failed validation
    Rejected(RejectReason),
}

impl DropReason {
    pub fn code(&self) -> &'static str {
        match self {
            DropReason::StructuralRowSkip => "structural_row_skip",
            DropReason::Rejected(reason) => reason.code(),
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for DropReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// A dropped row, kept for the audit sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRow {
    pub partner_code: String,
    pub line: u64,
    pub reason: DropReason,
    /// Normalized record, absent for structural skips
    pub record: Option<CanonicalRecord>,
}

/// Outcome of one partner's ingestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PartnerStatus {
    Completed,
    SourceUnavailable { reason: String },
}

/// Counts for one partner.
#[derive(Debug, Clone, Serialize)]
pub struct PartnerReport {
    pub partner_id: String,
    pub partner_code: String,
    pub file_path: PathBuf,
    #[serde(flatten)]
    pub status: PartnerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    /// Data lines seen, including dropped ones
    pub rows_read: usize,
    pub accepted: usize,
    pub dropped: BTreeMap<DropReason, usize>,
    /// Non-empty raw values that degraded to empty, per field
    pub coerced_invalid: BTreeMap<CanonicalField, usize>,
}

impl PartnerReport {
    pub fn new(partner_id: &str, partner_code: &str, file_path: PathBuf) -> Self {
        Self {
            partner_id: partner_id.to_string(),
            partner_code: partner_code.to_string(),
            file_path,
            status: PartnerStatus::Completed,
            encoding: None,
            rows_read: 0,
            accepted: 0,
            dropped: BTreeMap::new(),
            coerced_invalid: BTreeMap::new(),
        }
    }

    pub fn count(&self, reason: DropReason) -> usize {
        self.dropped.get(&reason).copied().unwrap_or(0)
    }

    /// All dropped rows, structural and validation.
    pub fn rejected(&self) -> usize {
        self.dropped.values().sum()
    }

    pub fn is_available(&self) -> bool {
        self.status == PartnerStatus::Completed
    }

    pub(crate) fn record_drop(&mut self, reason: DropReason) {
        *self.dropped.entry(reason).or_insert(0) += 1;
    }

    pub(crate) fn record_invalid(&mut self, field: CanonicalField) {
        *self.coerced_invalid.entry(field).or_insert(0) += 1;
    }

    /// Human-readable reason breakdown, e.g. `missing_external_id=2`.
    pub fn breakdown(&self) -> String {
        if self.dropped.is_empty() {
            return "-".to_string();
        }
        self.dropped
            .iter()
            .map(|(reason, n)| format!("{}={}", reason, n))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Everything one run produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    /// Accepted records in partner order, then file order
    #[serde(skip)]
    pub records: Vec<CanonicalRecord>,
    /// Dropped rows in the same order
    #[serde(skip)]
    pub rejected: Vec<RejectedRow>,
    pub partners: Vec<PartnerReport>,
}

impl BatchResult {
    pub fn accepted(&self) -> usize {
        self.records.len()
    }

    pub fn rejected_count(&self) -> usize {
        self.partners.iter().map(PartnerReport::rejected).sum()
    }

    pub fn unavailable(&self) -> impl Iterator<Item = &PartnerReport> {
        self.partners.iter().filter(|p| !p.is_available())
    }

    /// Report (without records) as pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Build the per-partner summary table.
pub fn summary_table(result: &BatchResult) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            header_cell("Partner"),
            header_cell("Code"),
            header_cell("Status"),
            header_cell("Rows"),
            header_cell("Accepted"),
            header_cell("Rejected"),
            header_cell("Reasons"),
            header_cell("Invalid values"),
        ]);

    for partner in &result.partners {
        let status = match &partner.status {
            PartnerStatus::Completed => Cell::new("ok").fg(Color::Green),
            PartnerStatus::SourceUnavailable { .. } => {
                Cell::new("source unavailable").fg(Color::Red)
            }
        };
        let invalid = if partner.coerced_invalid.is_empty() {
            "-".to_string()
        } else {
            partner
                .coerced_invalid
                .iter()
                .map(|(field, n)| format!("{}={}", field, n))
                .collect::<Vec<_>>()
                .join(", ")
        };

        table.add_row(vec![
            Cell::new(&partner.partner_id),
            Cell::new(&partner.partner_code),
            status,
            Cell::new(partner.rows_read).set_alignment(CellAlignment::Right),
            Cell::new(partner.accepted).set_alignment(CellAlignment::Right),
            count_cell(partner.rejected()),
            Cell::new(partner.breakdown()),
            Cell::new(invalid),
        ]);
    }

    let rows: usize = result.partners.iter().map(|p| p.rows_read).sum();
    table.add_row(vec![
        Cell::new("TOTAL").add_attribute(Attribute::Bold),
        Cell::new("-"),
        Cell::new(format!(
            "{}/{} ok",
            result.partners.iter().filter(|p| p.is_available()).count(),
            result.partners.len()
        )),
        Cell::new(rows).set_alignment(CellAlignment::Right),
        Cell::new(result.accepted())
            .set_alignment(CellAlignment::Right)
            .add_attribute(Attribute::Bold),
        count_cell(result.rejected_count()).add_attribute(Attribute::Bold),
        Cell::new("-"),
        Cell::new("-"),
    ]);

    table
}

/// Print the summary table to stdout.
pub fn print_summary(result: &BatchResult) {
    println!("{}", summary_table(result));
    for partner in result.unavailable() {
        if let PartnerStatus::SourceUnavailable { reason } = &partner.status {
            eprintln!("- {}: {}", partner.partner_id, reason);
        }
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label).add_attribute(Attribute::Bold)
}

fn count_cell(value: usize) -> Cell {
    let cell = Cell::new(value).set_alignment(CellAlignment::Right);
    if value > 0 {
        cell.fg(Color::Yellow)
    } else {
        cell
    }
}
