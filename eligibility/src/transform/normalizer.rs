//! Field Normalizer
//!
//! Builds a [`CanonicalRecord`] from one raw row and the owning partner's
//! column mapping. The partner config is a parameter object: the same code
//! path serves every partner.

use crate::models::{CanonicalField, CanonicalRecord};
use crate::parser::RawRow;
use crate::registry::PartnerConfig;

use super::operations::rules_for;

/// Why a field ended up empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionKind {
    /// No mapped column, column absent from the file, or blank raw value
    Missing,
    /// Non-empty raw value that could not be normalized
    Invalid,
}

/// A field that degraded to an empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoercionNote {
    pub field: CanonicalField,
    pub kind: CoercionKind,
}

/// Normalize one raw row into the canonical shape.
///
/// Never fails: anything that cannot be normalized becomes an empty string.
pub fn normalize(row: &RawRow, config: &PartnerConfig) -> CanonicalRecord {
    normalize_detailed(row, config).0
}

/// Like [`normalize`], also returning a note for every field left empty.
pub fn normalize_detailed(
    row: &RawRow,
    config: &PartnerConfig,
) -> (CanonicalRecord, Vec<CoercionNote>) {
    let mut record = CanonicalRecord::for_partner(config.partner_code.clone());
    let mut notes = Vec::new();

    for field in CanonicalField::ALL {
        let raw = config.source_for(field).and_then(|column| row.get(column));

        match normalize_value(field, raw) {
            Ok(value) => record.set(field, value),
            Err(kind) => notes.push(CoercionNote { field, kind }),
        }
    }

    (record, notes)
}

/// Run a field's coercion chain over a raw value.
pub fn normalize_value(field: CanonicalField, raw: Option<&str>) -> Result<String, CoercionKind> {
    let raw = match raw {
        Some(v) if !v.trim().is_empty() => v,
        _ => return Err(CoercionKind::Missing),
    };

    let mut value = raw.to_string();
    for op in rules_for(field) {
        value = op.apply(&value).ok_or(CoercionKind::Invalid)?;
    }

    if value.is_empty() {
        return Err(CoercionKind::Missing);
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{read_str, RowEvent};

    fn first_row(content: &str) -> RawRow {
        match read_str(content, ',').unwrap().next() {
            Some(RowEvent::Row(row)) => row,
            other => panic!("expected a row, got {:?}", other),
        }
    }

    fn acme() -> PartnerConfig {
        PartnerConfig::new("acme", "ACME", "acme.csv")
            .map("id", CanonicalField::ExternalId)
            .map("fname", CanonicalField::FirstName)
    }

    #[test]
    fn test_minimal_mapping() {
        let row = first_row("id,fname\n1234567890A,john");
        let record = normalize(&row, &acme());

        assert_eq!(
            record,
            CanonicalRecord {
                external_id: "1234567890A".into(),
                first_name: "John".into(),
                partner_code: "ACME".into(),
                ..CanonicalRecord::default()
            }
        );
    }

    #[test]
    fn test_full_mapping() {
        let config = PartnerConfig::new("beta", "BETA", "beta.csv")
            .map("Member", CanonicalField::ExternalId)
            .map("First", CanonicalField::FirstName)
            .map("Last", CanonicalField::LastName)
            .map("Birth", CanonicalField::Dob)
            .map("Mail", CanonicalField::Email)
            .map("Tel", CanonicalField::Phone);
        let row = first_row(
            "Member,First,Last,Birth,Mail,Tel,Extra\n \
             M-77 ,mARY ann,VAN dyke,03/15/1955, Mary@Example.COM ,(555) 123-4567,ignored",
        );

        let (record, notes) = normalize_detailed(&row, &config);
        assert!(notes.is_empty());
        assert_eq!(record.external_id, "M-77");
        assert_eq!(record.first_name, "Mary Ann");
        assert_eq!(record.last_name, "Van Dyke");
        assert_eq!(record.dob, "1955-03-15");
        assert_eq!(record.email, "mary@example.com");
        assert_eq!(record.phone, "555-123-4567");
        assert_eq!(record.partner_code, "BETA");
    }

    #[test]
    fn test_partner_code_not_from_row() {
        let row = first_row("id,partner_code\n1,EVIL");
        let record = normalize(&row, &acme());
        assert_eq!(record.partner_code, "ACME");
    }

    #[test]
    fn test_mapped_column_absent_from_row() {
        let config = acme().map("birth_date", CanonicalField::Dob);
        let row = first_row("id\n42");

        let (record, notes) = normalize_detailed(&row, &config);
        assert_eq!(record.external_id, "42");
        assert_eq!(record.first_name, "");
        assert_eq!(record.dob, "");
        assert!(notes.contains(&CoercionNote {
            field: CanonicalField::Dob,
            kind: CoercionKind::Missing,
        }));
    }

    #[test]
    fn test_invalid_values_degrade_to_empty() {
        let config = acme()
            .map("dob", CanonicalField::Dob)
            .map("phone", CanonicalField::Phone);
        let row = first_row("id,fname,dob,phone\n9,al,not-a-date,555-1234");

        let (record, notes) = normalize_detailed(&row, &config);
        assert_eq!(record.dob, "");
        assert_eq!(record.phone, "");
        let invalid: Vec<CanonicalField> = notes
            .iter()
            .filter(|n| n.kind == CoercionKind::Invalid)
            .map(|n| n.field)
            .collect();
        assert_eq!(invalid, vec![CanonicalField::Dob, CanonicalField::Phone]);
    }

    #[test]
    fn test_blank_id_left_empty() {
        let row = first_row("id,fname\n   ,john");
        let record = normalize(&row, &acme());
        assert_eq!(record.external_id, "");
        assert_eq!(record.first_name, "John");
    }

    #[test]
    fn test_normalize_value_missing() {
        assert_eq!(
            normalize_value(CanonicalField::Email, None),
            Err(CoercionKind::Missing)
        );
        assert_eq!(
            normalize_value(CanonicalField::Email, Some("  ")),
            Err(CoercionKind::Missing)
        );
    }
}
