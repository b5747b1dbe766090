//! Shared types for the analytics library.
//!
//! Dimensions, group keys, the error type and every aggregation result shape
//! live here so the filter engine, the operators and the projection formatter
//! agree on one vocabulary.

use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::model::Record;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// A raw row that could not be normalized into a [`Record`].
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("row {row}: field `{field}` {reason}")]
pub struct DataFormatError {
    /// Zero-based position of the row in the input sequence.
    pub row: usize,
    pub field: &'static str,
    pub reason: String,
}

/// Analytics-specific error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    /// Malformed or missing required field while loading the store.
    #[error("data format error: {0}")]
    DataFormat(#[from] DataFormatError),

    /// A caller supplied a parameter outside an operator's contract.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl AnalyticsError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Stable machine-readable kind, used in JSON payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DataFormat(_) => "data_format",
            Self::InvalidParameter(_) => "invalid_parameter",
        }
    }
}

/// Convenience alias.
pub type AnalyticsResult<T> = std::result::Result<T, AnalyticsError>;

/// Validate a caller-supplied N (top-N, top-K). Zero and negatives are a
/// contract violation, never clamped.
pub fn positive_n(n: i64, what: &str) -> AnalyticsResult<usize> {
    if n <= 0 {
        return Err(AnalyticsError::invalid(format!(
            "{what} must be a positive integer, got {n}"
        )));
    }
    usize::try_from(n).map_err(|_| AnalyticsError::invalid(format!("{what} is out of range: {n}")))
}

// ---------------------------------------------------------------------------
// Dimensions and group keys
// ---------------------------------------------------------------------------

/// A record attribute that can be filtered on or grouped by.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dim {
    TransactionYear,
    PublicationYear,
    Subject,
    MediaType,
    Author,
    Publisher,
    /// Fiction / Non-Fiction / Unknown.
    Category,
    /// Display title (`native_name`).
    Title,
    /// Catalogue title id.
    TitleId,
}

impl Dim {
    pub fn all() -> &'static [Dim] {
        &[
            Dim::TransactionYear,
            Dim::PublicationYear,
            Dim::Subject,
            Dim::MediaType,
            Dim::Author,
            Dim::Publisher,
            Dim::Category,
            Dim::Title,
            Dim::TitleId,
        ]
    }

    /// Year dimensions key on integers and chart along an ordered axis.
    pub fn is_year(&self) -> bool {
        matches!(self, Self::TransactionYear | Self::PublicationYear)
    }

    /// Human label used in summaries and payload titles.
    pub fn label(&self) -> &'static str {
        match self {
            Self::TransactionYear => "Transaction Year",
            Self::PublicationYear => "Publication Year",
            Self::Subject => "Subject",
            Self::MediaType => "Media Type",
            Self::Author => "Author",
            Self::Publisher => "Publisher",
            Self::Category => "Category",
            Self::Title => "Title",
            Self::TitleId => "Title Id",
        }
    }

    /// Borrowed group key of `record` on this dimension. `None` only for
    /// publication year when the publication date is unknown.
    pub fn key_ref<'a>(&self, record: &'a Record) -> Option<KeyRef<'a>> {
        match self {
            Self::TransactionYear => Some(KeyRef::Int(i64::from(record.transaction_year))),
            Self::PublicationYear => record.publication_year().map(|y| KeyRef::Int(i64::from(y))),
            Self::Subject => Some(KeyRef::Text(&record.subject)),
            Self::MediaType => Some(KeyRef::Text(&record.media_type)),
            Self::Author => Some(KeyRef::Text(&record.author)),
            Self::Publisher => Some(KeyRef::Text(&record.publisher)),
            Self::Category => Some(KeyRef::Text(record.fiction.label())),
            Self::Title => Some(KeyRef::Text(&record.native_name)),
            Self::TitleId => Some(KeyRef::Text(&record.title)),
        }
    }

}

impl std::fmt::Display for Dim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TransactionYear => write!(f, "transaction_year"),
            Self::PublicationYear => write!(f, "publication_year"),
            Self::Subject => write!(f, "subject"),
            Self::MediaType => write!(f, "media_type"),
            Self::Author => write!(f, "author"),
            Self::Publisher => write!(f, "publisher"),
            Self::Category => write!(f, "category"),
            Self::Title => write!(f, "title"),
            Self::TitleId => write!(f, "title_id"),
        }
    }
}

impl FromStr for Dim {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transaction_year" | "year" | "txn_year" => Ok(Self::TransactionYear),
            "publication_year" | "pub_year" => Ok(Self::PublicationYear),
            "subject" => Ok(Self::Subject),
            "media_type" | "media" => Ok(Self::MediaType),
            "author" => Ok(Self::Author),
            "publisher" => Ok(Self::Publisher),
            "category" | "fiction" => Ok(Self::Category),
            "title" | "native_name" => Ok(Self::Title),
            "title_id" => Ok(Self::TitleId),
            other => Err(AnalyticsError::invalid(format!("unknown dimension '{other}'"))),
        }
    }
}

/// Owned grouping key. Year dimensions produce `Int`, everything else `Text`;
/// integer keys sort numerically and before text keys.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum GroupKey {
    Int(i64),
    Text(String),
}

impl GroupKey {
    pub fn as_ref_key(&self) -> KeyRef<'_> {
        match self {
            Self::Int(v) => KeyRef::Int(*v),
            Self::Text(s) => KeyRef::Text(s),
        }
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for GroupKey {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for GroupKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// Borrowed form of [`GroupKey`] used while accumulating, so grouping does
/// not clone a string per record. Ordering matches `GroupKey`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyRef<'a> {
    Int(i64),
    Text(&'a str),
}

impl KeyRef<'_> {
    pub fn to_owned_key(self) -> GroupKey {
        match self {
            KeyRef::Int(v) => GroupKey::Int(v),
            KeyRef::Text(s) => GroupKey::Text(s.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Measures and ordering
// ---------------------------------------------------------------------------

/// Numeric field a mean is computed over.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    #[default]
    Rank,
    PublicationYear,
}

impl Measure {
    /// Value of the measure for `record`; `None` means the record does not
    /// contribute to a mean.
    pub fn value(&self, record: &Record) -> Option<f64> {
        match self {
            Self::Rank => Some(f64::from(record.rank)),
            Self::PublicationYear => record.publication_year().map(f64::from),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Rank => "mean rank",
            Self::PublicationYear => "mean publication year",
        }
    }
}

impl std::fmt::Display for Measure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rank => write!(f, "rank"),
            Self::PublicationYear => write!(f, "publication_year"),
        }
    }
}

impl FromStr for Measure {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rank" => Ok(Self::Rank),
            "publication_year" | "pub_year" => Ok(Self::PublicationYear),
            other => Err(AnalyticsError::invalid(format!("unknown value field '{other}'"))),
        }
    }
}

/// Sort direction for mean rankings.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Lowest mean first ("better" for rank).
    #[default]
    Ascending,
    Descending,
}

impl FromStr for SortOrder {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Ascending),
            "desc" | "descending" => Ok(Self::Descending),
            other => Err(AnalyticsError::invalid(format!("unknown sort order '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Result shapes
// ---------------------------------------------------------------------------

/// One `(key, count)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountRow {
    pub key: GroupKey,
    pub count: u64,
}

/// Result of count-by-key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountsResult {
    pub dim: Dim,
    /// Ordered by count descending, ties by key ascending.
    pub rows: Vec<CountRow>,
    /// Records with no key on `dim` (publication year unknown).
    pub unbucketed: u64,
}

impl CountsResult {
    pub fn get(&self, key: &GroupKey) -> Option<u64> {
        self.rows.iter().find(|r| &r.key == key).map(|r| r.count)
    }

    /// Sum of all bucket counts (excludes `unbucketed`).
    pub fn total(&self) -> u64 {
        self.rows.iter().map(|r| r.count).sum()
    }

    /// Mapping view of the rows.
    pub fn to_map(&self) -> std::collections::BTreeMap<GroupKey, u64> {
        self.rows.iter().map(|r| (r.key.clone(), r.count)).collect()
    }
}

/// Result of top-N-by-count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopCounts {
    pub dim: Dim,
    pub n: usize,
    /// At most `n` rows, count descending, ties by key ascending.
    pub rows: Vec<CountRow>,
}

/// One row of a mean ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeanRow {
    pub key: GroupKey,
    pub mean: f64,
    /// Number of records contributing to `mean` (always `>= 1`).
    pub count: u64,
    pub min: f64,
    pub max: f64,
}

/// Result of rank-by-mean.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeanRanking {
    pub dim: Dim,
    pub measure: Measure,
    pub order: SortOrder,
    pub n: usize,
    pub rows: Vec<MeanRow>,
}

/// Two-key sparse matrix. `cells[r][c]` is `None` when no record falls in
/// `(row_keys[r], col_keys[c])`, which is distinct from a computed zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Matrix<T> {
    pub row_dim: Dim,
    pub col_dim: Dim,
    pub row_keys: Vec<GroupKey>,
    pub col_keys: Vec<GroupKey>,
    pub cells: Vec<Vec<Option<T>>>,
}

impl<T: Copy> Matrix<T> {
    pub fn empty(row_dim: Dim, col_dim: Dim) -> Self {
        Self {
            row_dim,
            col_dim,
            row_keys: Vec::new(),
            col_keys: Vec::new(),
            cells: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.row_keys.is_empty() || self.col_keys.is_empty()
    }

    pub fn get(&self, row: &GroupKey, col: &GroupKey) -> Option<T> {
        let r = self.row_keys.iter().position(|k| k == row)?;
        let c = self.col_keys.iter().position(|k| k == col)?;
        self.cells.get(r).and_then(|cells| cells.get(c)).copied().flatten()
    }

    /// `(column key, value)` pairs of one row that carry data.
    pub fn row_entries(&self, row: usize) -> Vec<(&GroupKey, T)> {
        let Some(cells) = self.cells.get(row) else {
            return Vec::new();
        };
        self.col_keys
            .iter()
            .zip(cells.iter())
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect()
    }
}

/// Result of pivot-mean.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotResult {
    pub measure: Measure,
    /// Column restriction that was applied (`None` = all columns).
    pub top_k: Option<usize>,
    pub matrix: Matrix<f64>,
}

/// Node of a hierarchical count tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyNode {
    /// `None` for the root.
    pub key: Option<GroupKey>,
    /// Dimension this node's key belongs to; `None` for the root.
    pub dim: Option<Dim>,
    pub count: u64,
    /// Ordered by count descending, ties by key ascending.
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Check the sum invariant recursively.
    pub fn sums_consistent(&self) -> bool {
        if self.is_leaf() {
            return true;
        }
        let child_total: u64 = self.children.iter().map(|c| c.count).sum();
        child_total == self.count && self.children.iter().all(HierarchyNode::sums_consistent)
    }

    pub fn leaf_count(&self) -> usize {
        if self.is_leaf() {
            1
        } else {
            self.children.iter().map(HierarchyNode::leaf_count).sum()
        }
    }
}

/// Result of hierarchical-count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hierarchy {
    pub path: Vec<Dim>,
    pub root: HierarchyNode,
    /// Records excluded because they lack a key at some level of `path`.
    pub unbucketed: u64,
}

/// How the entities of a trend were chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum TrendSelection {
    /// The caller listed the entities.
    Explicit,
    /// No entities were given: the `k` entities with the lowest mean rank in
    /// the view were selected.
    AutoTopByMeanRank { k: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub x: i64,
    pub y: f64,
}

/// Points of one entity, ascending by `x`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub entity: GroupKey,
    pub points: Vec<TrendPoint>,
}

/// Result of entity-trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendResult {
    pub entity_dim: Dim,
    pub x_dim: Dim,
    pub measure: Measure,
    pub selection: TrendSelection,
    pub series: Vec<TrendSeries>,
    /// Requested entities with no records in the view.
    pub missing: Vec<String>,
}

/// Headline figures for the KPI tiles.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KpiSummary {
    pub records: u64,
    pub unique_titles: u64,
    pub unique_authors: u64,
    pub unique_publishers: u64,
    pub earliest_publication: Option<chrono::NaiveDate>,
    pub latest_publication: Option<chrono::NaiveDate>,
    /// Mode of publication year; ties resolve to the earliest year.
    pub most_common_publication_year: Option<i32>,
    pub mean_rank: Option<f64>,
}

/// Tagged union of every operator's output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AggregationResult {
    Counts(CountsResult),
    TopCounts(TopCounts),
    MeanRanking(MeanRanking),
    Pivot(PivotResult),
    CrossCounts(Matrix<u64>),
    Hierarchy(Hierarchy),
    Trend(TrendResult),
    Summary(KpiSummary),
}

impl AggregationResult {
    /// True when the operator ran but found nothing to aggregate.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Counts(r) => r.rows.is_empty(),
            Self::TopCounts(r) => r.rows.is_empty(),
            Self::MeanRanking(r) => r.rows.is_empty(),
            Self::Pivot(r) => r.matrix.is_empty(),
            Self::CrossCounts(m) => m.is_empty(),
            Self::Hierarchy(h) => h.root.count == 0,
            Self::Trend(t) => t.series.is_empty(),
            Self::Summary(s) => s.records == 0,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Counts(_) => "counts",
            Self::TopCounts(_) => "top_counts",
            Self::MeanRanking(_) => "mean_ranking",
            Self::Pivot(_) => "pivot",
            Self::CrossCounts(_) => "cross_counts",
            Self::Hierarchy(_) => "hierarchy",
            Self::Trend(_) => "trend",
            Self::Summary(_) => "summary",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dim_display_roundtrip() {
        for dim in Dim::all() {
            let parsed: Dim = dim.to_string().parse().expect("parse dim");
            assert_eq!(parsed, *dim);
        }
    }

    #[test]
    fn dim_aliases_parse() {
        assert_eq!("year".parse::<Dim>().unwrap(), Dim::TransactionYear);
        assert_eq!("Media".parse::<Dim>().unwrap(), Dim::MediaType);
        assert_eq!("fiction".parse::<Dim>().unwrap(), Dim::Category);
    }

    #[test]
    fn unknown_dim_is_invalid_parameter() {
        let err = "colour".parse::<Dim>().unwrap_err();
        assert_eq!(err.kind(), "invalid_parameter");
        assert!(err.to_string().contains("colour"));
    }

    #[test]
    fn group_key_ordering_is_numeric_for_years() {
        let mut keys = vec![GroupKey::Int(2023), GroupKey::Int(999), GroupKey::Int(2020)];
        keys.sort();
        assert_eq!(keys, vec![GroupKey::Int(999), GroupKey::Int(2020), GroupKey::Int(2023)]);
        assert!(GroupKey::Int(5) < GroupKey::Text("a".into()));
    }

    #[test]
    fn key_ref_ordering_matches_owned() {
        let a = KeyRef::Text("alpha");
        let b = KeyRef::Text("beta");
        assert_eq!(a.cmp(&b), a.to_owned_key().cmp(&b.to_owned_key()));
    }

    #[test]
    fn positive_n_rejects_zero_and_negative() {
        assert!(positive_n(0, "n").is_err());
        assert!(positive_n(-3, "n").is_err());
        assert_eq!(positive_n(7, "n").unwrap(), 7);
    }

    #[test]
    fn hierarchy_sum_check_detects_mismatch() {
        let leaf = |k: &str, c| HierarchyNode {
            key: Some(k.into()),
            dim: Some(Dim::Author),
            count: c,
            children: vec![],
        };
        let mut root = HierarchyNode {
            key: None,
            dim: None,
            count: 3,
            children: vec![leaf("a", 2), leaf("b", 1)],
        };
        assert!(root.sums_consistent());
        root.count = 4;
        assert!(!root.sums_consistent());
    }

    #[test]
    fn data_format_error_display() {
        let err = AnalyticsError::from(DataFormatError {
            row: 3,
            field: "rank",
            reason: "is missing".into(),
        });
        assert_eq!(err.to_string(), "data format error: row 3: field `rank` is missing");
        assert_eq!(err.kind(), "data_format");
    }
}
