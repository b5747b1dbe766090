//! Date handling for analytics.
//!
//! Parses the publication dates found in raw rows and formats dates and year
//! buckets for payload labels.

use chrono::{NaiveDate, NaiveDateTime};

/// Formats accepted for a publication date cell, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse a publication date cell.
///
/// Returns `Ok(None)` for blank cells (unknown date) and an error message when
/// the cell has content that is not a recognizable date.
pub fn parse_publication_date(raw: &str) -> Result<Option<NaiveDate>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") || trimmed == "NaT" {
        return Ok(None);
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(Some(dt.date()));
        }
    }
    // RFC 3339 timestamps ("2021-03-02T00:00:00Z") as written by JSON exporters.
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Ok(Some(dt.date_naive()));
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(Some(d));
        }
    }
    Err(format!("'{trimmed}' is not a recognizable date"))
}

/// Format a date as ISO (`YYYY-MM-DD`).
pub fn date_to_iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Format an optional date, rendering unknown as `N/A`.
pub fn date_label(date: Option<NaiveDate>) -> String {
    date.map(date_to_iso).unwrap_or_else(|| "N/A".to_string())
}

/// Inclusive range check where either bound may be open.
pub fn within(date: NaiveDate, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    start.is_none_or(|s| date >= s) && end.is_none_or(|e| date <= e)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
