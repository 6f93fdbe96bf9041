//! Field coercions applied by the normalizer.
//!
//! Each canonical field has a fixed chain of [`Coercion`]s. A coercion either
//! produces the next value or reports that the value cannot be normalized, in
//! which case the field degrades to an empty string.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::models::CanonicalField;

/// Whitespace-separated name token.
static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+").expect("Invalid token regex"));

/// Date-only input formats, tried in order. Slash dates are month-first.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y%m%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%d-%b-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%B %d, %Y",
];

/// Date-time input formats; the time part is dropped.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// A single value coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// Remove leading and trailing whitespace
    Trim,
    /// Uppercase the first letter of each whitespace-separated token, lowercase the rest
    TitleCase,
    /// Convert to lowercase
    Lowercase,
    /// Parse a calendar date and render it as `YYYY-MM-DD`
    IsoDate,
    /// Exactly ten digits rendered as `XXX-XXX-XXXX`
    UsPhone,
}

impl Coercion {
    /// Apply this coercion; `None` means the value cannot be normalized.
    pub fn apply(&self, value: &str) -> Option<String> {
        match self {
            Coercion::Trim => Some(value.trim().to_string()),
            Coercion::TitleCase => Some(title_case(value)),
            Coercion::Lowercase => Some(value.to_lowercase()),
            Coercion::IsoDate => parse_date(value).map(|d| d.format("%Y-%m-%d").to_string()),
            Coercion::UsPhone => format_phone(value),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Coercion::Trim => "trim",
            Coercion::TitleCase => "title_case",
            Coercion::Lowercase => "lowercase",
            Coercion::IsoDate => "iso_date",
            Coercion::UsPhone => "us_phone",
        }
    }
}

/// Coercion chain for a canonical field.
pub fn rules_for(field: CanonicalField) -> &'static [Coercion] {
    match field {
        CanonicalField::ExternalId => &[Coercion::Trim],
        CanonicalField::FirstName | CanonicalField::LastName => {
            &[Coercion::Trim, Coercion::TitleCase]
        }
        CanonicalField::Dob => &[Coercion::Trim, Coercion::IsoDate],
        CanonicalField::Email => &[Coercion::Trim, Coercion::Lowercase],
        CanonicalField::Phone => &[Coercion::UsPhone],
    }
}

fn title_case(value: &str) -> String {
    TOKEN
        .replace_all(value.trim(), |caps: &Captures| {
            let mut chars = caps[0].chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.as_str().to_lowercase().chars())
                    .collect(),
                None => String::new(),
            }
        })
        .into_owned()
}

/// Parse a calendar date from the accepted input forms.
///
/// Impossible dates, two-digit years and years outside 1000..=9999 fail.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let plausible = |d: &NaiveDate| (1000..=9999).contains(&d.year());

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok().filter(plausible))
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
                .filter(plausible)
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.date_naive())
                .filter(plausible)
        })
}

/// Format a phone number as `XXX-XXX-XXXX` when it holds exactly ten digits.
pub fn format_phone(value: &str) -> Option<String> {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 10 {
        Some(format!("{}-{}-{}", &digits[..3], &digits[3..6], &digits[6..]))
    } else {
        None
    }
}

/// When a field ends up empty.
fn empty_when(field: CanonicalField) -> &'static str {
    match field {
        CanonicalField::ExternalId => "blank; the row is rejected by validation",
        CanonicalField::FirstName | CanonicalField::LastName | CanonicalField::Email => "blank",
        CanonicalField::Dob => "unparseable or impossible date",
        CanonicalField::Phone => "not exactly 10 digits",
    }
}

/// Get a description of the per-field rules for display
pub fn rules_description() -> String {
    let mut out = String::from("Normalization rules (source column -> canonical field):\n\n");
    out.push_str("| Field        | Chain                  | Empty when |\n");
    out.push_str("|--------------|------------------------|------------|\n");

    for field in CanonicalField::ALL {
        let chain = rules_for(field)
            .iter()
            .map(Coercion::name)
            .collect::<Vec<_>>()
            .join(" -> ");
        out.push_str(&format!(
            "| {:<12} | {:<22} | {} |\n",
            field.as_str(),
            chain,
            empty_when(field)
        ));
    }
    out.push_str(&format!(
        "| {:<12} | {:<22} | {} |\n",
        "partner_code", "partner config", "never"
    ));

    out.push_str(
        "\nUnmapped source columns are ignored. Mapped columns missing from the file\n\
         produce empty values.",
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim() {
        assert_eq!(Coercion::Trim.apply("  A12  ").as_deref(), Some("A12"));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("john"), "John");
        assert_eq!(title_case("mARY   ann "), "Mary   Ann");
        assert_eq!(title_case("o'BRIEN"), "O'brien");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_lowercase() {
        assert_eq!(
            Coercion::Lowercase.apply("John.Doe@Example.COM").as_deref(),
            Some("john.doe@example.com")
        );
    }

    #[test]
    fn test_iso_date_inputs() {
        let iso = |v: &str| Coercion::IsoDate.apply(v);
        assert_eq!(iso("1955-03-15").as_deref(), Some("1955-03-15"));
        assert_eq!(iso("03/15/1955").as_deref(), Some("1955-03-15"));
        assert_eq!(iso("3/5/1955").as_deref(), Some("1955-03-05"));
        assert_eq!(iso("1955/03/15").as_deref(), Some("1955-03-15"));
        assert_eq!(iso("19550315").as_deref(), Some("1955-03-15"));
        assert_eq!(iso("15-Mar-1955").as_deref(), Some("1955-03-15"));
        assert_eq!(iso("March 15, 1955").as_deref(), Some("1955-03-15"));
        assert_eq!(iso("1955-03-15 08:30:00").as_deref(), Some("1955-03-15"));
        assert_eq!(iso("1955-03-15T08:30:00Z").as_deref(), Some("1955-03-15"));
    }

    #[test]
    fn test_iso_date_failures() {
        let iso = |v: &str| Coercion::IsoDate.apply(v);
        assert_eq!(iso("not-a-date"), None);
        assert_eq!(iso(""), None);
        assert_eq!(iso("02/30/1980"), None);
        assert_eq!(iso("1980-13-01"), None);
        assert_eq!(iso("03/15/55"), None);
        assert_eq!(iso("1/2/3"), None);
    }

    #[test]
    fn test_phone_ten_digits() {
        assert_eq!(format_phone("5551234567").as_deref(), Some("555-123-4567"));
        assert_eq!(format_phone("(555) 123-4567").as_deref(), Some("555-123-4567"));
        assert_eq!(format_phone("555.123.4567").as_deref(), Some("555-123-4567"));
    }

    #[test]
    fn test_phone_wrong_digit_count() {
        assert_eq!(format_phone("+1 (555) 123-4567"), None);
        assert_eq!(format_phone("123-4567"), None);
        assert_eq!(format_phone("call me"), None);
        assert_eq!(format_phone(""), None);
    }

    #[test]
    fn test_rules_end_with_field_specific_step() {
        assert_eq!(rules_for(CanonicalField::Dob).last(), Some(&Coercion::IsoDate));
        assert_eq!(rules_for(CanonicalField::Phone), &[Coercion::UsPhone]);
    }

    #[test]
    fn test_rules_description_lists_each_chain() {
        let text = rules_description();
        assert!(text.contains("| dob          | trim -> iso_date "));
        assert!(text.contains("| email        | trim -> lowercase "));
        assert!(text.contains("| phone        | us_phone "));
        for field in CanonicalField::ALL {
            let chain: Vec<&str> = rules_for(field).iter().map(Coercion::name).collect();
            let row = text
                .lines()
                .find(|l| l.starts_with(&format!("| {:<12} |", field.as_str())))
                .unwrap();
            assert!(row.contains(&chain.join(" -> ")), "{}", row);
        }
        assert!(text.contains("partner_code"));
    }
}
