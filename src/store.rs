//! Immutable record store.
//!
//! Raw rows arrive as loosely-typed cells (the source sheet mixes numbers,
//! strings and blanks). [`RecordStore::load`] normalizes every row into a
//! [`Record`] once; after that the store is frozen and shared by reference
//! across any number of concurrent filter cycles.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analytics::bucketing::parse_publication_date;
use crate::analytics::types::{AnalyticsResult, DataFormatError, Dim, GroupKey};
use crate::model::{FictionFlag, Record, normalize_media};

// ---------------------------------------------------------------------------
// Raw input
// ---------------------------------------------------------------------------

/// One spreadsheet cell as it arrives in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCell {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Whole-number float that fits in an `i64` without saturating.
fn is_whole_i64(v: f64) -> bool {
    v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64
}

impl RawCell {
    /// String coercion. Blank strings are treated as absent.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawCell::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            RawCell::Int(v) => Some(v.to_string()),
            RawCell::Float(v) if is_whole_i64(*v) => Some(format!("{}", *v as i64)),
            RawCell::Float(v) => Some(v.to_string()),
            RawCell::Bool(b) => Some(b.to_string()),
        }
    }

    /// Integer coercion; floats must be whole numbers.
    pub fn as_int(&self) -> Result<i64, String> {
        match self {
            RawCell::Int(v) => Ok(*v),
            RawCell::Float(v) if is_whole_i64(*v) => Ok(*v as i64),
            RawCell::Float(v) if v.is_finite() && v.fract() == 0.0 => {
                Err(format!("{v} is out of range"))
            }
            RawCell::Float(v) => Err(format!("{v} is not a whole number")),
            RawCell::Text(s) => {
                let trimmed = s.trim();
                if let Ok(v) = trimmed.parse::<i64>() {
                    return Ok(v);
                }
                match trimmed.parse::<f64>() {
                    Ok(v) if is_whole_i64(v) => Ok(v as i64),
                    _ => Err(format!("'{trimmed}' is not an integer")),
                }
            }
            RawCell::Bool(b) => Err(format!("{b} is not an integer")),
        }
    }
}

/// A raw lending row. Field names follow the dataset's column headers; the
/// snake_case names are accepted as aliases. Unknown columns are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    #[serde(rename = "Title", alias = "title", default)]
    pub title: Option<RawCell>,
    #[serde(rename = "Title Native Name", alias = "native_name", default)]
    pub native_name: Option<RawCell>,
    #[serde(rename = "Title Author", alias = "author", default)]
    pub author: Option<RawCell>,
    #[serde(rename = "Title Publisher", alias = "publisher", default)]
    pub publisher: Option<RawCell>,
    #[serde(rename = "Subject", alias = "subject", default)]
    pub subject: Option<RawCell>,
    #[serde(rename = "Item Media", alias = "media_type", default)]
    pub media_type: Option<RawCell>,
    #[serde(rename = "Title Publication Date", alias = "publication_date", default)]
    pub publication_date: Option<RawCell>,
    #[serde(rename = "Txn Calendar Year", alias = "transaction_year", default)]
    pub transaction_year: Option<RawCell>,
    #[serde(rename = "Rank", alias = "rank", default)]
    pub rank: Option<RawCell>,
    #[serde(rename = "Title Fiction Tag", alias = "fiction", default)]
    pub fiction: Option<RawCell>,
}

// ---------------------------------------------------------------------------
// Load policy
// ---------------------------------------------------------------------------

/// What to do with a row that fails normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnInvalidRow {
    /// Drop the row, log it and keep loading.
    Skip,
    /// Reject the whole load with the row's [`DataFormatError`].
    #[default]
    Fail,
}

impl std::fmt::Display for OnInvalidRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    pub on_invalid_row: OnInvalidRow,
}

/// Outcome of a load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub rows_read: usize,
    pub rows_loaded: usize,
    /// Rows dropped under [`OnInvalidRow::Skip`].
    pub skipped: Vec<DataFormatError>,
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

fn required_text(
    row: usize,
    field: &'static str,
    cell: &Option<RawCell>,
) -> Result<String, DataFormatError> {
    cell.as_ref()
        .and_then(RawCell::as_text)
        .ok_or_else(|| DataFormatError {
            row,
            field,
            reason: "is missing".into(),
        })
}

fn required_int(
    row: usize,
    field: &'static str,
    cell: &Option<RawCell>,
) -> Result<i64, DataFormatError> {
    let cell = cell.as_ref().ok_or_else(|| DataFormatError {
        row,
        field,
        reason: "is missing".into(),
    })?;
    if matches!(cell, RawCell::Text(s) if s.trim().is_empty()) {
        return Err(DataFormatError {
            row,
            field,
            reason: "is missing".into(),
        });
    }
    cell.as_int().map_err(|reason| DataFormatError { row, field, reason })
}

/// Normalize one raw row. `row` is the zero-based input position, used only
/// for error reporting.
pub fn normalize_row(row: usize, raw: &RawRow) -> Result<Record, DataFormatError> {
    let title = required_text(row, "title", &raw.title)?;
    let native_name = required_text(row, "native_name", &raw.native_name)?;
    let author = required_text(row, "author", &raw.author)?;
    let publisher = required_text(row, "publisher", &raw.publisher)?;
    let subject = required_text(row, "subject", &raw.subject)?;
    let media_type = normalize_media(&required_text(row, "media_type", &raw.media_type)?);

    let transaction_year = required_int(row, "transaction_year", &raw.transaction_year)?;
    let transaction_year = i32::try_from(transaction_year)
        .ok()
        .filter(|y| *y > 0)
        .ok_or_else(|| DataFormatError {
            row,
            field: "transaction_year",
            reason: format!("{transaction_year} is not a valid year"),
        })?;

    let rank = required_int(row, "rank", &raw.rank)?;
    let rank = u32::try_from(rank)
        .ok()
        .filter(|r| *r >= 1)
        .ok_or_else(|| DataFormatError {
            row,
            field: "rank",
            reason: format!("{rank} is not a rank (must be >= 1)"),
        })?;

    let publication_date = match raw.publication_date.as_ref().and_then(RawCell::as_text) {
        None => None,
        Some(text) => parse_publication_date(&text).map_err(|reason| DataFormatError {
            row,
            field: "publication_date",
            reason,
        })?,
    };

    let fiction = match &raw.fiction {
        None => FictionFlag::Unknown,
        Some(RawCell::Bool(true)) => FictionFlag::Fiction,
        Some(RawCell::Bool(false)) => FictionFlag::NonFiction,
        Some(cell) => {
            let text = cell.as_text().unwrap_or_default();
            FictionFlag::parse(&text).ok_or_else(|| DataFormatError {
                row,
                field: "fiction",
                reason: format!("'{text}' is not a fiction tag"),
            })?
        }
    };

    Ok(Record {
        title,
        native_name,
        author,
        publisher,
        subject,
        media_type,
        publication_date,
        transaction_year,
        rank,
        fiction,
    })
}

// ---------------------------------------------------------------------------
// RecordStore
// ---------------------------------------------------------------------------

/// The frozen, normalized dataset. Cloning is cheap (shared `Arc`).
#[derive(Debug, Clone)]
pub struct RecordStore {
    records: Arc<[Record]>,
    report: Arc<LoadReport>,
}

impl RecordStore {
    /// Normalize `rows` into a store.
    ///
    /// Under [`OnInvalidRow::Fail`] the first bad row aborts the load with its
    /// [`DataFormatError`]; under [`OnInvalidRow::Skip`] bad rows are logged,
    /// recorded in the [`LoadReport`] and dropped.
    pub fn load<I>(rows: I, options: &LoadOptions) -> AnalyticsResult<Self>
    where
        I: IntoIterator<Item = RawRow>,
    {
        let mut records = Vec::new();
        let mut report = LoadReport::default();

        for (idx, raw) in rows.into_iter().enumerate() {
            report.rows_read += 1;
            match normalize_row(idx, &raw) {
                Ok(record) => records.push(record),
                Err(err) => match options.on_invalid_row {
                    OnInvalidRow::Fail => return Err(err.into()),
                    OnInvalidRow::Skip => {
                        warn!(
                            row = err.row,
                            field = err.field,
                            reason = %err.reason,
                            "Skipping invalid row"
                        );
                        report.skipped.push(err);
                    }
                },
            }
        }

        report.rows_loaded = records.len();
        info!(
            rows_read = report.rows_read,
            rows_loaded = report.rows_loaded,
            skipped = report.skipped.len(),
            policy = %options.on_invalid_row,
            "Loaded record store"
        );

        Ok(Self {
            records: records.into(),
            report: Arc::new(report),
        })
    }

    /// Build a store from already-normalized records.
    pub fn from_records(records: Vec<Record>) -> Self {
        let report = LoadReport {
            rows_read: records.len(),
            rows_loaded: records.len(),
            skipped: Vec::new(),
        };
        Self {
            records: records.into(),
            report: Arc::new(report),
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    /// Sorted distinct keys of `dim`, the option list a control surface
    /// offers for that dimension.
    pub fn distinct_values(&self, dim: Dim) -> Vec<GroupKey> {
        let keys: BTreeSet<_> = self.records.iter().filter_map(|r| dim.key_ref(r)).collect();
        keys.into_iter().map(|k| k.to_owned_key()).collect()
    }

    /// `(earliest, latest)` known publication date, the limits of a date
    /// picker. `None` when no record has a date.
    pub fn publication_date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let mut dates = self.records.iter().filter_map(|r| r.publication_date);
        let first = dates.next()?;
        Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::types::AnalyticsError;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawRow {
        serde_json::from_value(value).expect("raw row")
    }

    fn good_row() -> serde_json::Value {
        json!({
            "Title": "T100",
            "Title Native Name": "The Midnight Library",
            "Title Author": "Haig, Matt",
            "Title Publisher": "Canongate",
            "Subject": "Fiction",
            "Item Media": "EBOOK",
            "Title Publication Date": "2020-08-13",
            "Txn Calendar Year": 2021,
            "Rank": 3,
            "Title Fiction Tag": "Yes"
        })
    }

    #[test]
    fn normalizes_dataset_headers() {
        let record = normalize_row(0, &raw(good_row())).expect("normalize");
        assert_eq!(record.media_type, "Ebook");
        assert_eq!(record.transaction_year, 2021);
        assert_eq!(record.rank, 3);
        assert_eq!(record.fiction, FictionFlag::Fiction);
        assert_eq!(record.publication_year(), Some(2020));
    }

    #[test]
    fn accepts_snake_case_aliases_and_coerces_strings() {
        let row = raw(json!({
            "title": 42,
            "native_name": "Dune",
            "author": "Herbert, Frank",
            "publisher": "Ace",
            "subject": "Science Fiction",
            "media_type": "audiobook",
            "transaction_year": "2022",
            "rank": 7.0
        }));
        let record = normalize_row(0, &row).expect("normalize");
        assert_eq!(record.title, "42");
        assert_eq!(record.media_type, "Audiobook");
        assert_eq!(record.transaction_year, 2022);
        assert_eq!(record.rank, 7);
        assert_eq!(record.publication_date, None);
        assert_eq!(record.fiction, FictionFlag::Unknown);
    }

    #[test]
    fn huge_whole_floats_do_not_saturate() {
        assert_eq!(
            RawCell::Float(1e20).as_text().as_deref(),
            Some("100000000000000000000")
        );
        assert_eq!(RawCell::Float(42.0).as_text().as_deref(), Some("42"));
        assert!(RawCell::Float(1e20).as_int().is_err());

        let mut value = good_row();
        value["Title"] = json!(1e20);
        let record = normalize_row(0, &raw(value)).expect("normalize");
        assert_eq!(record.title, "100000000000000000000");
    }

    #[test]
    fn missing_required_field_is_data_format_error() {
        let mut value = good_row();
        value.as_object_mut().unwrap().remove("Title Author");
        let err = normalize_row(5, &raw(value)).unwrap_err();
        assert_eq!(err.row, 5);
        assert_eq!(err.field, "author");
    }

    #[test]
    fn zero_rank_is_rejected() {
        let mut value = good_row();
        value["Rank"] = json!(0);
        let err = normalize_row(0, &raw(value)).unwrap_err();
        assert_eq!(err.field, "rank");
    }

    #[test]
    fn unparsable_date_is_rejected_not_defaulted() {
        let mut value = good_row();
        value["Title Publication Date"] = json!("sometime");
        let err = normalize_row(0, &raw(value)).unwrap_err();
        assert_eq!(err.field, "publication_date");
    }

    #[test]
    fn blank_date_is_unknown() {
        let mut value = good_row();
        value["Title Publication Date"] = json!("");
        let record = normalize_row(0, &raw(value)).expect("normalize");
        assert_eq!(record.publication_date, None);
        assert_eq!(record.publication_year(), None);
    }

    #[test]
    fn fail_policy_rejects_whole_load() {
        let mut bad = good_row();
        bad["Rank"] = json!("first");
        let rows = vec![raw(good_row()), raw(bad)];
        let err = RecordStore::load(rows, &LoadOptions::default()).unwrap_err();
        match err {
            AnalyticsError::DataFormat(e) => {
                assert_eq!(e.row, 1);
                assert_eq!(e.field, "rank");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn skip_policy_keeps_valid_rows() {
        let mut bad = good_row();
        bad["Txn Calendar Year"] = json!(null);
        let rows = vec![raw(good_row()), raw(bad), raw(good_row())];
        let options = LoadOptions {
            on_invalid_row: OnInvalidRow::Skip,
        };
        let store = RecordStore::load(rows, &options).expect("load");
        assert_eq!(store.len(), 2);
        assert_eq!(store.report().rows_read, 3);
        assert_eq!(store.report().skipped.len(), 1);
        assert_eq!(store.report().skipped[0].field, "transaction_year");
    }

    #[test]
    fn distinct_values_are_sorted_and_skip_unknown_years() {
        let mut undated = good_row();
        undated["Title Publication Date"] = json!(null);
        undated["Txn Calendar Year"] = json!(2020);
        let store =
            RecordStore::load(vec![raw(good_row()), raw(undated)], &LoadOptions::default())
                .expect("load");
        assert_eq!(
            store.distinct_values(Dim::TransactionYear),
            vec![GroupKey::Int(2020), GroupKey::Int(2021)]
        );
        assert_eq!(store.distinct_values(Dim::PublicationYear), vec![GroupKey::Int(2020)]);
        let (lo, hi) = store.publication_date_bounds().expect("bounds");
        assert_eq!(lo, hi);
    }

    #[test]
    fn load_options_deserialize_from_toml_words() {
        let opts: LoadOptions = toml::from_str("on_invalid_row = \"skip\"").expect("toml");
        assert_eq!(opts.on_invalid_row, OnInvalidRow::Skip);
        let defaults: LoadOptions = toml::from_str("").expect("toml");
        assert_eq!(defaults.on_invalid_row, OnInvalidRow::Fail);
    }
}
