//! Domain models for the eligibility pipeline.
//!
//! - [`CanonicalField`] - Fields a partner column may be mapped onto
//! - [`CanonicalRecord`] - The unified seven-field member record
//! - [`CANONICAL_HEADER`] - Column order of the unified output

use std::fmt;

use serde::{Deserialize, Serialize};

/// Column order of the unified output table.
pub const CANONICAL_HEADER: [&str; 7] = [
    "external_id",
    "first_name",
    "last_name",
    "dob",
    "email",
    "phone",
    "partner_code",
];

// =============================================================================
// Canonical Field
// =============================================================================

/// A canonical field that can be fed from a partner column.
///
/// `partner_code` is deliberately absent: it always comes from the partner
/// configuration, never from row data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    ExternalId,
    FirstName,
    LastName,
    Dob,
    Email,
    Phone,
}

impl CanonicalField {
    /// All mappable fields, in output column order.
    pub const ALL: [CanonicalField; 6] = [
        Self::ExternalId,
        Self::FirstName,
        Self::LastName,
        Self::Dob,
        Self::Email,
        Self::Phone,
    ];

    /// Output column name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExternalId => "external_id",
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::Dob => "dob",
            Self::Email => "email",
            Self::Phone => "phone",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Canonical Record
// =============================================================================

/// One member in the unified schema.
///
/// Absent or uncoercible values are empty strings, never a sentinel.
/// Field declaration order matches [`CANONICAL_HEADER`] so serde-based writers
/// emit columns in output order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub external_id: String,
    pub first_name: String,
    pub last_name: String,
    pub dob: String,
    pub email: String,
    pub phone: String,
    pub partner_code: String,
}

impl CanonicalRecord {
    /// Empty record owned by the given partner.
    pub fn for_partner(partner_code: impl Into<String>) -> Self {
        Self {
            partner_code: partner_code.into(),
            ..Self::default()
        }
    }

    /// Value of a mappable field.
    pub fn get(&self, field: CanonicalField) -> &str {
        match field {
            CanonicalField::ExternalId => &self.external_id,
            CanonicalField::FirstName => &self.first_name,
            CanonicalField::LastName => &self.last_name,
            CanonicalField::Dob => &self.dob,
            CanonicalField::Email => &self.email,
            CanonicalField::Phone => &self.phone,
        }
    }

    /// Replace the value of a mappable field.
    pub fn set(&mut self, field: CanonicalField, value: String) {
        let slot = match field {
            CanonicalField::ExternalId => &mut self.external_id,
            CanonicalField::FirstName => &mut self.first_name,
            CanonicalField::LastName => &mut self.last_name,
            CanonicalField::Dob => &mut self.dob,
            CanonicalField::Email => &mut self.email,
            CanonicalField::Phone => &mut self.phone,
        };
        *slot = value;
    }

    /// Values in [`CANONICAL_HEADER`] order.
    pub fn values(&self) -> [&str; 7] {
        [
            self.external_id.as_str(),
            self.first_name.as_str(),
            self.last_name.as_str(),
            self.dob.as_str(),
            self.email.as_str(),
            self.phone.as_str(),
            self.partner_code.as_str(),
        ]
    }
}
