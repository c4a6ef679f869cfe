//! # Domain Types
//!
//! Shared domain types: document kinds, date ranges and the textual date
//! formats accepted by field reads and migration.
//!
//! ## Accepted Date Spellings
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  "17.07.2013"                 single day (zero-length range)            │
//! │  "2013-07-17"                 single day, ISO spelling                  │
//! │  "17-18.07.2013"              legacy range token                        │
//! │  "17.-18.07.2013"             legacy range token, dotted day            │
//! │  "17.07.2013 - 18.07.2013"    explicit range                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

// =============================================================================
// Document Type
// =============================================================================

/// The document kinds a project can be validated for.
///
/// Each kind has a static required-field set; see the ledger module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// A quote sent to the client before the event.
    Offer,
    /// The bill sent after the event.
    Invoice,
    /// A paid, archived project.
    Archive,
}

// =============================================================================
// Date Range
// =============================================================================

/// An inclusive begin/end date pair.
///
/// A single day is represented as a zero-length range (`begin == end`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub begin: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a zero-length range covering one day.
    #[inline]
    pub fn single(day: NaiveDate) -> Self {
        DateRange {
            begin: day,
            end: day,
        }
    }

    /// Returns true if the range covers exactly one day.
    #[inline]
    pub fn is_single_day(&self) -> bool {
        self.begin == self.end
    }
}

// =============================================================================
// Date Parsing
// =============================================================================

/// Textual single-date formats accepted by field reads.
const DATE_FORMATS: &[&str] = &["%d.%m.%Y", "%Y-%m-%d"];

/// Parses a single date against the accepted textual formats.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Parses a date or date-range token.
///
/// Handles every accepted spelling listed in the module docs. A single date
/// becomes a zero-length range. Returns `None` for anything unparsable or
/// for a range whose end precedes its begin.
pub fn parse_date_range(raw: &str) -> Option<DateRange> {
    let raw = raw.trim();

    if let Some(day) = parse_date(raw) {
        return Some(DateRange::single(day));
    }

    // Every remaining spelling carries exactly one range dash.
    let (left, right) = raw.split_once('-')?;
    let left = left.trim().trim_end_matches('.');
    let right = right.trim();

    let end = parse_date(right)?;
    let begin = if let Some(begin) = parse_date(left) {
        // "17.07.2013 - 18.07.2013"
        begin
    } else {
        // "17-18.07.2013" / "17.-18.07.2013": the left side is a bare day
        // in the end date's month.
        let day: u32 = left.parse().ok()?;
        NaiveDate::from_ymd_opt(end.year(), end.month(), day)?
    };

    if begin > end {
        return None;
    }
    Some(DateRange { begin, end })
}

/// Renders a date in the canonical ISO spelling used inside the document.
#[inline]
pub fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_single_date() {
        assert_eq!(parse_date("17.07.2013"), Some(d(2013, 7, 17)));
        assert_eq!(parse_date("2013-07-17"), Some(d(2013, 7, 17)));
        assert_eq!(parse_date("17.13.2013"), None);
        assert_eq!(parse_date("tomorrow"), None);
    }

    #[test]
    fn test_single_date_is_zero_length_range() {
        let range = parse_date_range("17.07.2013").unwrap();
        assert_eq!(range.begin, d(2013, 7, 17));
        assert_eq!(range.end, d(2013, 7, 17));
        assert!(range.is_single_day());
    }

    #[test]
    fn test_parse_legacy_range_token() {
        let range = parse_date_range("17-18.07.2013").unwrap();
        assert_eq!(range.begin, d(2013, 7, 17));
        assert_eq!(range.end, d(2013, 7, 18));

        let range = parse_date_range("20.-26.07.2013").unwrap();
        assert_eq!(range.begin, d(2013, 7, 20));
        assert_eq!(range.end, d(2013, 7, 26));
    }

    #[test]
    fn test_parse_explicit_range() {
        let range = parse_date_range("20.07.2013 - 26.07.2013").unwrap();
        assert_eq!(range.begin, d(2013, 7, 20));
        assert_eq!(range.end, d(2013, 7, 26));
    }

    #[test]
    fn test_reversed_range_is_rejected() {
        assert!(parse_date_range("26-20.07.2013").is_none());
        assert!(parse_date_range("26.07.2013 - 20.07.2013").is_none());
    }

    #[test]
    fn test_year_zero_sentinel_parses() {
        // Migration stamps "01.01.0000" as the created sentinel.
        assert_eq!(parse_date("01.01.0000"), Some(d(0, 1, 1)));
    }

    #[test]
    fn test_iso_rendering() {
        assert_eq!(iso(d(2013, 7, 17)), "2013-07-17");
    }
}
