//! Partner Registry - static partner definitions driving the pipeline.
//!
//! The registry is pure data: a JSON object keyed by partner identifier.
//! Entry order in the document is the processing order.
//!
//! ```json
//! {
//!   "acme": {
//!     "partner_code": "ACME",
//!     "file_path": "data/acme.txt",
//!     "delimiter": "|",
//!     "column_mapping": { "MemberID": "external_id", "FName": "first_name" }
//!   }
//! }
//! ```
//!
//! Onboarding a partner is an edit to this document; no code branches on
//! partner identity.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RegistryError, RegistryResult};
use crate::models::CanonicalField;

/// Default registry location (relative to current dir)
pub const DEFAULT_REGISTRY_PATH: &str = "partners.json";

const REGISTRY_SCHEMA: &str = include_str!("../../schemas/partner-registry.json");

fn default_delimiter() -> char {
    ','
}

/// Ingestion configuration for one partner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerConfig {
    /// Registry key (set from the document key, not from the value)
    #[serde(skip)]
    pub partner_id: String,

    /// Code stamped on every record from this partner
    pub partner_code: String,

    /// Location of the partner file
    pub file_path: PathBuf,

    /// Field separator (explicit, never auto-detected)
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Forced file encoding; detected when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,

    /// Source column name -> canonical field
    pub column_mapping: BTreeMap<String, CanonicalField>,
}

impl PartnerConfig {
    /// Create a config with the default delimiter and no forced encoding.
    pub fn new(
        partner_id: impl Into<String>,
        partner_code: impl Into<String>,
        file_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            partner_id: partner_id.into(),
            partner_code: partner_code.into(),
            file_path: file_path.into(),
            delimiter: default_delimiter(),
            encoding: None,
            column_mapping: BTreeMap::new(),
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    /// Map a source column onto a canonical field.
    pub fn map(mut self, column: impl Into<String>, field: CanonicalField) -> Self {
        self.column_mapping.insert(column.into(), field);
        self
    }

    /// Source column feeding the given canonical field, if any.
    pub fn source_for(&self, field: CanonicalField) -> Option<&str> {
        self.column_mapping
            .iter()
            .find(|(_, target)| **target == field)
            .map(|(column, _)| column.as_str())
    }

    /// Source column feeding `external_id`.
    pub fn id_column(&self) -> Option<&str> {
        self.source_for(CanonicalField::ExternalId)
    }

    fn check(&self) -> RegistryResult<()> {
        if self.partner_code.trim().is_empty() {
            return Err(RegistryError::EmptyPartnerCode {
                partner: self.partner_id.clone(),
            });
        }

        if !self.delimiter.is_ascii() || matches!(self.delimiter, '"' | '\n' | '\r') {
            return Err(RegistryError::InvalidDelimiter {
                partner: self.partner_id.clone(),
                delimiter: self.delimiter.to_string(),
            });
        }

        let mut seen: HashMap<CanonicalField, &str> = HashMap::new();
        for (column, field) in &self.column_mapping {
            if let Some(first) = seen.insert(*field, column) {
                return Err(RegistryError::DuplicateTarget {
                    partner: self.partner_id.clone(),
                    field: field.to_string(),
                    first: first.to_string(),
                    second: column.clone(),
                });
            }
        }

        if self.id_column().is_none() {
            return Err(RegistryError::MissingIdMapping {
                partner: self.partner_id.clone(),
            });
        }

        Ok(())
    }
}

/// Ordered, read-only collection of partner configurations.
#[derive(Debug, Clone)]
pub struct PartnerRegistry {
    partners: Vec<PartnerConfig>,
}

impl PartnerRegistry {
    /// Build a registry from already-constructed configs, keeping their order.
    pub fn from_partners(partners: Vec<PartnerConfig>) -> RegistryResult<Self> {
        if partners.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut codes: HashMap<&str, &str> = HashMap::new();
        for partner in &partners {
            partner.check()?;
            if let Some(first) = codes.insert(&partner.partner_code, &partner.partner_id) {
                return Err(RegistryError::DuplicatePartnerCode {
                    code: partner.partner_code.clone(),
                    first: first.to_string(),
                    second: partner.partner_id.clone(),
                });
            }
        }

        Ok(Self { partners })
    }

    /// Parse a registry document.
    pub fn from_json(json: &str) -> RegistryResult<Self> {
        let document: Value = serde_json::from_str(json)?;

        if document.as_object().is_some_and(|o| o.is_empty()) {
            return Err(RegistryError::Empty);
        }
        check_schema(&document)?;

        let Value::Object(entries) = document else {
            return Err(RegistryError::Schema {
                errors: vec!["registry must be an object".to_string()],
            });
        };

        let mut partners = Vec::with_capacity(entries.len());
        for (partner_id, value) in entries {
            let mut config: PartnerConfig = serde_json::from_value(value)?;
            config.partner_id = partner_id;
            partners.push(config);
        }

        Self::from_partners(partners)
    }

    /// Load a registry file; relative partner paths resolve against its directory.
    pub fn load(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut registry = Self::from_json(&content)?;
        if let Some(base) = path.parent() {
            for partner in &mut registry.partners {
                if partner.file_path.is_relative() {
                    partner.file_path = base.join(&partner.file_path);
                }
            }
        }

        Ok(registry)
    }

    /// Partners in processing order.
    pub fn iter(&self) -> impl Iterator<Item = &PartnerConfig> {
        self.partners.iter()
    }

    /// Look up a partner by registry key.
    pub fn get(&self, partner_id: &str) -> Option<&PartnerConfig> {
        self.partners.iter().find(|p| p.partner_id == partner_id)
    }

    pub fn len(&self) -> usize {
        self.partners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }
}

impl<'a> IntoIterator for &'a PartnerRegistry {
    type Item = &'a PartnerConfig;
    type IntoIter = std::slice::Iter<'a, PartnerConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.partners.iter()
    }
}

/// Validate the raw document against the embedded registry schema.
fn check_schema(document: &Value) -> RegistryResult<()> {
    let schema: Value = serde_json::from_str(REGISTRY_SCHEMA)?;
    let validator = jsonschema::draft7::new(&schema).map_err(|e| RegistryError::Schema {
        errors: vec![format!("invalid registry schema: {}", e)],
    })?;

    let errors: Vec<String> = validator
        .iter_errors(document)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(RegistryError::Schema { errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_PARTNERS: &str = r#"{
        "zeta": {
            "partner_code": "ZETA",
            "file_path": "zeta.csv",
            "column_mapping": { "id": "external_id" }
        },
        "acme": {
            "partner_code": "ACME",
            "file_path": "/data/acme.txt",
            "delimiter": "|",
            "column_mapping": { "MemberID": "external_id", "FName": "first_name" }
        }
    }"#;

    #[test]
    fn test_document_order_preserved() {
        let registry = PartnerRegistry::from_json(TWO_PARTNERS).unwrap();
        let ids: Vec<&str> = registry.iter().map(|p| p.partner_id.as_str()).collect();
        assert_eq!(ids, vec!["zeta", "acme"]);
    }

    #[test]
    fn test_default_delimiter() {
        let registry = PartnerRegistry::from_json(TWO_PARTNERS).unwrap();
        assert_eq!(registry.get("zeta").unwrap().delimiter, ',');
        assert_eq!(registry.get("acme").unwrap().delimiter, '|');
    }

    #[test]
    fn test_id_column_lookup() {
        let registry = PartnerRegistry::from_json(TWO_PARTNERS).unwrap();
        let acme = registry.get("acme").unwrap();
        assert_eq!(acme.id_column(), Some("MemberID"));
        assert_eq!(acme.source_for(CanonicalField::FirstName), Some("FName"));
        assert_eq!(acme.source_for(CanonicalField::Dob), None);
    }

    #[test]
    fn test_empty_registry_rejected() {
        assert!(matches!(
            PartnerRegistry::from_json("{}"),
            Err(RegistryError::Empty)
        ));
        assert!(matches!(
            PartnerRegistry::from_partners(Vec::new()),
            Err(RegistryError::Empty)
        ));
    }

    #[test]
    fn test_schema_violation_reported() {
        let json = r#"{ "acme": { "partner_code": "ACME", "column_mapping": { "id": "member_no" } } }"#;
        match PartnerRegistry::from_json(json) {
            Err(RegistryError::Schema { errors }) => assert!(errors.len() >= 2),
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_partner_code_not_mappable() {
        let json = r#"{ "acme": { "partner_code": "ACME", "file_path": "a.csv",
            "column_mapping": { "id": "external_id", "src": "partner_code" } } }"#;
        assert!(PartnerRegistry::from_json(json).is_err());
    }

    #[test]
    fn test_missing_id_mapping() {
        let json = r#"{ "acme": { "partner_code": "ACME", "file_path": "a.csv",
            "column_mapping": { "fname": "first_name" } } }"#;
        assert!(matches!(
            PartnerRegistry::from_json(json),
            Err(RegistryError::MissingIdMapping { .. })
        ));
    }

    #[test]
    fn test_duplicate_partner_code() {
        let partners = vec![
            PartnerConfig::new("a", "SAME", "a.csv").map("id", CanonicalField::ExternalId),
            PartnerConfig::new("b", "SAME", "b.csv").map("id", CanonicalField::ExternalId),
        ];
        assert!(matches!(
            PartnerRegistry::from_partners(partners),
            Err(RegistryError::DuplicatePartnerCode { .. })
        ));
    }

    #[test]
    fn test_duplicate_target() {
        let partner = PartnerConfig::new("a", "A", "a.csv")
            .map("id", CanonicalField::ExternalId)
            .map("member", CanonicalField::ExternalId);
        assert!(matches!(
            PartnerRegistry::from_partners(vec![partner]),
            Err(RegistryError::DuplicateTarget { .. })
        ));
    }

    #[test]
    fn test_quote_delimiter_rejected() {
        let partner = PartnerConfig::new("a", "A", "a.csv")
            .with_delimiter('"')
            .map("id", CanonicalField::ExternalId);
        assert!(matches!(
            PartnerRegistry::from_partners(vec![partner]),
            Err(RegistryError::InvalidDelimiter { .. })
        ));
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partners.json");
        fs::write(&path, TWO_PARTNERS).unwrap();

        let registry = PartnerRegistry::load(&path).unwrap();
        assert_eq!(registry.get("zeta").unwrap().file_path, dir.path().join("zeta.csv"));
        assert_eq!(
            registry.get("acme").unwrap().file_path,
            PathBuf::from("/data/acme.txt")
        );
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = PartnerRegistry::load(dir.path().join("nope.json"));
        assert!(matches!(result, Err(RegistryError::Io { .. })));
    }
}
