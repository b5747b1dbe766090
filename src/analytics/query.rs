//! Aggregation operators over a [`FilteredView`].
//!
//! Every operator is a pure function of the view and its parameters. Groups
//! are accumulated in `FxHashMap`s keyed by borrowed [`KeyRef`]s and only the
//! surviving keys are cloned into the owned result. An empty view always
//! produces the empty variant of the operator's result, never an error.

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};

use super::derive::{MeanAccumulator, round2};
use super::types::*;
use crate::filter::FilteredView;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Count records per key of `dim`. Returns the tallies and the number of
/// records with no key.
fn tally<'a>(view: &FilteredView<'a>, dim: Dim) -> (FxHashMap<KeyRef<'a>, u64>, u64) {
    let mut counts: FxHashMap<KeyRef<'a>, u64> = FxHashMap::default();
    let mut unbucketed = 0u64;
    for record in view.iter() {
        match dim.key_ref(record) {
            Some(key) => *counts.entry(key).or_insert(0) += 1,
            None => unbucketed += 1,
        }
    }
    (counts, unbucketed)
}

/// Count descending, ties by key ascending.
fn ranked_counts<'a>(counts: FxHashMap<KeyRef<'a>, u64>) -> Vec<(KeyRef<'a>, u64)> {
    let mut rows: Vec<_> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows
}

fn to_count_rows(rows: Vec<(KeyRef<'_>, u64)>) -> Vec<CountRow> {
    rows.into_iter()
        .map(|(key, count)| CountRow {
            key: key.to_owned_key(),
            count,
        })
        .collect()
}

/// Mean accumulators per key of `dim`, skipping records where either the key
/// or the measure is absent.
fn group_means<'a>(
    view: &FilteredView<'a>,
    dim: Dim,
    measure: Measure,
) -> FxHashMap<KeyRef<'a>, MeanAccumulator> {
    let mut groups: FxHashMap<KeyRef<'a>, MeanAccumulator> = FxHashMap::default();
    for record in view.iter() {
        let (Some(key), Some(value)) = (dim.key_ref(record), measure.value(record)) else {
            continue;
        };
        groups.entry(key).or_default().push(value);
    }
    groups
}

// ---------------------------------------------------------------------------
// count-by-key / top-N-by-count
// ---------------------------------------------------------------------------

/// Number of records per distinct key of `dim`.
///
/// `sum(rows) + unbucketed == view.len()` always holds.
pub fn count_by_key(view: &FilteredView<'_>, dim: Dim) -> CountsResult {
    let (counts, unbucketed) = tally(view, dim);
    CountsResult {
        dim,
        rows: to_count_rows(ranked_counts(counts)),
        unbucketed,
    }
}

/// The `n` most frequent keys of `dim`.
pub fn top_n_by_count(view: &FilteredView<'_>, dim: Dim, n: i64) -> AnalyticsResult<TopCounts> {
    let n = positive_n(n, "n")?;
    let (counts, _) = tally(view, dim);
    let mut rows = ranked_counts(counts);
    rows.truncate(n);
    Ok(TopCounts {
        dim,
        n,
        rows: to_count_rows(rows),
    })
}

// ---------------------------------------------------------------------------
// rank-by-mean
// ---------------------------------------------------------------------------

/// Keys of `dim` ordered by the mean of `measure`, truncated to `n`.
///
/// Ascending order puts the best (lowest) rank first. Ties break on the key.
pub fn rank_by_mean(
    view: &FilteredView<'_>,
    dim: Dim,
    measure: Measure,
    n: i64,
    order: SortOrder,
) -> AnalyticsResult<MeanRanking> {
    let n = positive_n(n, "n")?;
    let mut rows: Vec<MeanRow> = group_means(view, dim, measure)
        .into_iter()
        .filter_map(|(key, acc)| {
            let mean = acc.mean()?;
            let (min, max) = acc.bounds()?;
            Some(MeanRow {
                key: key.to_owned_key(),
                mean,
                count: acc.count,
                min,
                max,
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        let by_mean = match order {
            SortOrder::Ascending => a.mean.total_cmp(&b.mean),
            SortOrder::Descending => b.mean.total_cmp(&a.mean),
        };
        by_mean.then_with(|| a.key.cmp(&b.key))
    });
    rows.truncate(n);

    Ok(MeanRanking {
        dim,
        measure,
        order,
        n,
        rows,
    })
}

// ---------------------------------------------------------------------------
// pivot-mean
// ---------------------------------------------------------------------------

/// Sparse matrix of the mean of `measure` per `(row, column)` key pair.
///
/// With `top_k`, columns are limited to the `k` column keys contributing the
/// most records across the whole view, so every row shares one column set.
/// Columns follow that ranking; rows ascend and only rows with data appear.
pub fn pivot_mean(
    view: &FilteredView<'_>,
    row_dim: Dim,
    col_dim: Dim,
    measure: Measure,
    top_k: Option<i64>,
) -> AnalyticsResult<PivotResult> {
    let top_k = top_k.map(|k| positive_n(k, "top_k")).transpose()?;

    let mut cells: FxHashMap<(KeyRef<'_>, KeyRef<'_>), MeanAccumulator> = FxHashMap::default();
    let mut col_counts: FxHashMap<KeyRef<'_>, u64> = FxHashMap::default();
    for record in view.iter() {
        let (Some(row), Some(col), Some(value)) = (
            row_dim.key_ref(record),
            col_dim.key_ref(record),
            measure.value(record),
        ) else {
            continue;
        };
        cells.entry((row, col)).or_default().push(value);
        *col_counts.entry(col).or_insert(0) += 1;
    }

    let col_keys: Vec<KeyRef<'_>> = match top_k {
        Some(k) => {
            let mut ranked = ranked_counts(col_counts);
            ranked.truncate(k);
            ranked.into_iter().map(|(key, _)| key).collect()
        }
        None => {
            let mut keys: Vec<_> = col_counts.into_keys().collect();
            keys.sort();
            keys
        }
    };
    let selected: FxHashSet<KeyRef<'_>> = col_keys.iter().copied().collect();

    let mut row_keys: Vec<KeyRef<'_>> = cells
        .keys()
        .filter(|(_, col)| selected.contains(col))
        .map(|(row, _)| *row)
        .collect::<FxHashSet<_>>()
        .into_iter()
        .collect();
    row_keys.sort();

    let grid = row_keys
        .iter()
        .map(|row| {
            col_keys
                .iter()
                .map(|col| cells.get(&(*row, *col)).and_then(MeanAccumulator::mean))
                .collect()
        })
        .collect();

    Ok(PivotResult {
        measure,
        top_k,
        matrix: Matrix {
            row_dim,
            col_dim,
            row_keys: row_keys.into_iter().map(KeyRef::to_owned_key).collect(),
            col_keys: col_keys.into_iter().map(KeyRef::to_owned_key).collect(),
            cells: grid,
        },
    })
}

// ---------------------------------------------------------------------------
// cross-count
// ---------------------------------------------------------------------------

/// Record counts per `(row, column)` key pair. Rows and columns ascend.
pub fn cross_count(view: &FilteredView<'_>, row_dim: Dim, col_dim: Dim) -> Matrix<u64> {
    let mut cells: FxHashMap<(KeyRef<'_>, KeyRef<'_>), u64> = FxHashMap::default();
    for record in view.iter() {
        if let (Some(row), Some(col)) = (row_dim.key_ref(record), col_dim.key_ref(record)) {
            *cells.entry((row, col)).or_insert(0) += 1;
        }
    }
    if cells.is_empty() {
        return Matrix::empty(row_dim, col_dim);
    }

    let mut row_keys: Vec<_> = cells.keys().map(|(r, _)| *r).collect();
    let mut col_keys: Vec<_> = cells.keys().map(|(_, c)| *c).collect();
    row_keys.sort();
    row_keys.dedup();
    col_keys.sort();
    col_keys.dedup();

    let grid = row_keys
        .iter()
        .map(|row| {
            col_keys
                .iter()
                .map(|col| cells.get(&(*row, *col)).copied())
                .collect()
        })
        .collect();

    Matrix {
        row_dim,
        col_dim,
        row_keys: row_keys.into_iter().map(KeyRef::to_owned_key).collect(),
        col_keys: col_keys.into_iter().map(KeyRef::to_owned_key).collect(),
        cells: grid,
    }
}

// ---------------------------------------------------------------------------
// hierarchical-count
// ---------------------------------------------------------------------------

fn build_level<'a>(path: &[Dim], depth: usize, rows: &[&[KeyRef<'a>]]) -> Vec<HierarchyNode> {
    let Some(&dim) = path.get(depth) else {
        return Vec::new();
    };
    let mut groups: FxHashMap<KeyRef<'a>, Vec<&[KeyRef<'a>]>> = FxHashMap::default();
    for &keys in rows {
        groups.entry(keys[depth]).or_default().push(keys);
    }

    let mut nodes: Vec<(KeyRef<'a>, HierarchyNode)> = groups
        .into_iter()
        .map(|(key, members)| {
            let node = HierarchyNode {
                key: Some(key.to_owned_key()),
                dim: Some(dim),
                count: members.len() as u64,
                children: build_level(path, depth + 1, &members),
            };
            (key, node)
        })
        .collect();
    nodes.sort_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(&b.0)));
    nodes.into_iter().map(|(_, node)| node).collect()
}

/// Nested record counts along `path` (outermost dimension first).
///
/// Internal node counts always equal the sum of their children. Records
/// missing a key at any level are left out of the tree and counted in
/// `unbucketed`.
pub fn hierarchical_count(view: &FilteredView<'_>, path: &[Dim]) -> AnalyticsResult<Hierarchy> {
    if path.is_empty() {
        return Err(AnalyticsError::invalid("hierarchy path must name at least one dimension"));
    }

    let mut paths: Vec<Vec<KeyRef<'_>>> = Vec::with_capacity(view.len());
    let mut unbucketed = 0u64;
    for record in view.iter() {
        match path.iter().map(|dim| dim.key_ref(record)).collect::<Option<Vec<_>>>() {
            Some(keys) => paths.push(keys),
            None => unbucketed += 1,
        }
    }

    let rows: Vec<&[KeyRef<'_>]> = paths.iter().map(Vec::as_slice).collect();
    let root = HierarchyNode {
        key: None,
        dim: None,
        count: rows.len() as u64,
        children: build_level(path, 0, &rows),
    };
    Ok(Hierarchy {
        path: path.to_vec(),
        root,
        unbucketed,
    })
}

// ---------------------------------------------------------------------------
// entity-trend
// ---------------------------------------------------------------------------

/// Parameters for [`entity_trend`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrendParams {
    pub entity_dim: Dim,
    /// Explicit entities. `None` or an empty list selects the fallback.
    pub entities: Option<Vec<String>>,
    pub x_dim: Dim,
    pub measure: Measure,
    /// Number of entities picked by the fallback policy.
    pub fallback_top_k: i64,
}

impl Default for TrendParams {
    fn default() -> Self {
        Self {
            entity_dim: Dim::Title,
            entities: None,
            x_dim: Dim::TransactionYear,
            measure: Measure::Rank,
            fallback_top_k: 5,
        }
    }
}

/// Per-entity `(x, y)` series.
///
/// Without an explicit entity list the `fallback_top_k` entities with the
/// lowest mean rank are used, and the result says so in `selection`.
/// Points ascend by `x`, then by `y`. Requested entities with no points are
/// reported in `missing`.
pub fn entity_trend(view: &FilteredView<'_>, params: &TrendParams) -> AnalyticsResult<TrendResult> {
    if !params.x_dim.is_year() {
        return Err(AnalyticsError::invalid(format!(
            "trend x dimension must be a year dimension, got '{}'",
            params.x_dim
        )));
    }

    let explicit = params.entities.as_ref().filter(|list| !list.is_empty());
    let (selection, wanted): (TrendSelection, Vec<GroupKey>) = match explicit {
        Some(list) => {
            let mut seen = FxHashSet::default();
            let keys = list
                .iter()
                .filter(|name| seen.insert(name.as_str()))
                .map(|name| entity_key(params.entity_dim, name))
                .collect();
            (TrendSelection::Explicit, keys)
        }
        None => {
            let k = positive_n(params.fallback_top_k, "fallback_top_k")?;
            let best = rank_by_mean(
                view,
                params.entity_dim,
                Measure::Rank,
                k as i64,
                SortOrder::Ascending,
            )?;
            let keys = best.rows.into_iter().map(|row| row.key).collect();
            (TrendSelection::AutoTopByMeanRank { k }, keys)
        }
    };

    let mut points: FxHashMap<KeyRef<'_>, Vec<TrendPoint>> = wanted
        .iter()
        .map(|key| (key.as_ref_key(), Vec::new()))
        .collect();
    for record in view.iter() {
        let Some(entity) = params.entity_dim.key_ref(record) else {
            continue;
        };
        let Some(series) = points.get_mut(&entity) else {
            continue;
        };
        let x = params.x_dim.key_ref(record).and_then(|k| match k {
            KeyRef::Int(v) => Some(v),
            KeyRef::Text(_) => None,
        });
        if let (Some(x), Some(y)) = (x, params.measure.value(record)) {
            series.push(TrendPoint { x, y });
        }
    }

    let mut series = Vec::with_capacity(wanted.len());
    let mut missing = Vec::new();
    for key in &wanted {
        let mut pts = points.remove(&key.as_ref_key()).unwrap_or_default();
        if pts.is_empty() {
            missing.push(key.to_string());
            continue;
        }
        pts.sort_by(|a, b| a.x.cmp(&b.x).then_with(|| a.y.total_cmp(&b.y)));
        series.push(TrendSeries {
            entity: key.clone(),
            points: pts,
        });
    }

    Ok(TrendResult {
        entity_dim: params.entity_dim,
        x_dim: params.x_dim,
        measure: params.measure,
        selection,
        series,
        missing,
    })
}

/// Key of a caller-named entity. Year dimensions compare numerically.
fn entity_key(dim: Dim, name: &str) -> GroupKey {
    if dim.is_year()
        && let Ok(year) = name.trim().parse::<i64>()
    {
        return GroupKey::Int(year);
    }
    GroupKey::Text(name.to_string())
}

// ---------------------------------------------------------------------------
// summary
// ---------------------------------------------------------------------------

/// Headline KPI figures for the view.
pub fn summary(view: &FilteredView<'_>) -> KpiSummary {
    let mut titles: FxHashSet<&str> = FxHashSet::default();
    let mut authors: FxHashSet<&str> = FxHashSet::default();
    let mut publishers: FxHashSet<&str> = FxHashSet::default();
    let mut year_counts: FxHashMap<i32, u64> = FxHashMap::default();
    let mut earliest: Option<NaiveDate> = None;
    let mut latest: Option<NaiveDate> = None;
    let mut ranks = MeanAccumulator::default();

    for record in view.iter() {
        titles.insert(&record.native_name);
        authors.insert(&record.author);
        publishers.insert(&record.publisher);
        ranks.push(f64::from(record.rank));
        if let Some(date) = record.publication_date {
            earliest = Some(earliest.map_or(date, |e| e.min(date)));
            latest = Some(latest.map_or(date, |l| l.max(date)));
        }
        if let Some(year) = record.publication_year() {
            *year_counts.entry(year).or_insert(0) += 1;
        }
    }

    let most_common_publication_year = year_counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(year, _)| year);

    KpiSummary {
        records: view.len() as u64,
        unique_titles: titles.len() as u64,
        unique_authors: authors.len() as u64,
        unique_publishers: publishers.len() as u64,
        earliest_publication: earliest,
        latest_publication: latest,
        most_common_publication_year,
        mean_rank: ranks.mean().map(round2),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterSpec, apply};
    use crate::model::{FictionFlag, Record};
    use crate::store::RecordStore;

    fn rec(title: &str, author: &str, year: i32, rank: u32) -> Record {
        Record {
            title: format!("id-{title}"),
            native_name: title.into(),
            author: author.into(),
            publisher: format!("{author} Press"),
            subject: "Fiction".into(),
            media_type: "Ebook".into(),
            publication_date: NaiveDate::from_ymd_opt(2015, 1, 1),
            transaction_year: year,
            rank,
            fiction: FictionFlag::Fiction,
        }
    }

    /// Records A, B, C from the worked example.
    fn abc() -> RecordStore {
        RecordStore::from_records(vec![
            rec("A", "X", 2020, 1),
            rec("B", "Y", 2020, 1),
            rec("C", "X", 2021, 4),
        ])
    }

    fn key(s: &str) -> GroupKey {
        GroupKey::Text(s.into())
    }

    #[test]
    fn counts_sum_to_view_size() {
        let store = abc();
        let view = FilteredView::all(&store);
        let counts = count_by_key(&view, Dim::Author);
        assert_eq!(counts.total() + counts.unbucketed, 3);
        assert_eq!(counts.get(&key("X")), Some(2));
        assert_eq!(counts.rows[0].key, key("X"));
    }

    #[test]
    fn counts_track_unknown_publication_years() {
        let mut records = vec![rec("A", "X", 2020, 1), rec("B", "Y", 2020, 2)];
        records[1].publication_date = None;
        let store = RecordStore::from_records(records);
        let view = FilteredView::all(&store);
        let counts = count_by_key(&view, Dim::PublicationYear);
        assert_eq!(counts.rows.len(), 1);
        assert_eq!(counts.unbucketed, 1);
    }

    #[test]
    fn top_n_breaks_ties_by_key() {
        let store = RecordStore::from_records(vec![
            rec("A", "Zed", 2020, 1),
            rec("B", "Amy", 2020, 1),
            rec("C", "Moe", 2020, 1),
            rec("D", "Moe", 2020, 1),
        ]);
        let view = FilteredView::all(&store);
        let top = top_n_by_count(&view, Dim::Author, 2).unwrap();
        assert_eq!(top.rows.len(), 2);
        assert_eq!(top.rows[0], CountRow { key: key("Moe"), count: 2 });
        assert_eq!(top.rows[1], CountRow { key: key("Amy"), count: 1 });
    }

    #[test]
    fn top_n_rejects_zero() {
        let store = abc();
        let view = FilteredView::all(&store);
        let err = top_n_by_count(&view, Dim::Author, 0).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidParameter(_)));
    }

    #[test]
    fn rank_by_mean_orders_best_first() {
        let store = abc();
        let view = FilteredView::all(&store);
        let ranking =
            rank_by_mean(&view, Dim::Author, Measure::Rank, 2, SortOrder::Ascending).unwrap();
        let pairs: Vec<_> = ranking.rows.iter().map(|r| (r.key.clone(), r.mean)).collect();
        assert_eq!(pairs, vec![(key("Y"), 1.0), (key("X"), 2.5)]);
        assert_eq!(ranking.rows[1].min, 1.0);
        assert_eq!(ranking.rows[1].max, 4.0);
    }

    #[test]
    fn rank_by_mean_descending() {
        let store = abc();
        let view = FilteredView::all(&store);
        let ranking =
            rank_by_mean(&view, Dim::Author, Measure::Rank, 1, SortOrder::Descending).unwrap();
        assert_eq!(ranking.rows.len(), 1);
        assert_eq!(ranking.rows[0].key, key("X"));
    }

    #[test]
    fn filtered_year_counts_only_c() {
        let store = abc();
        let view = apply(&store, &FilterSpec::default().with_years([2021])).unwrap();
        let titles: Vec<_> = view.iter().map(|r| r.native_name.as_str()).collect();
        assert_eq!(titles, vec!["C"]);
        let counts = count_by_key(&view, Dim::Author);
        assert_eq!(counts.to_map().into_iter().collect::<Vec<_>>(), vec![(key("X"), 1)]);
    }

    #[test]
    fn pivot_marks_missing_cells_as_none() {
        let store = abc();
        let view = FilteredView::all(&store);
        let pivot =
            pivot_mean(&view, Dim::TransactionYear, Dim::Author, Measure::Rank, None).unwrap();
        let m = &pivot.matrix;
        assert_eq!(m.row_keys, vec![GroupKey::Int(2020), GroupKey::Int(2021)]);
        assert_eq!(m.get(&GroupKey::Int(2020), &key("X")), Some(1.0));
        assert_eq!(m.get(&GroupKey::Int(2021), &key("X")), Some(4.0));
        assert_eq!(m.get(&GroupKey::Int(2021), &key("Y")), None);
    }

    #[test]
    fn pivot_columns_are_global_top_k() {
        let store = RecordStore::from_records(vec![
            rec("A", "X", 2020, 1),
            rec("B", "X", 2021, 3),
            rec("C", "Y", 2021, 2),
            rec("D", "Z", 2020, 5),
            rec("E", "Z", 2020, 7),
            rec("F", "Z", 2021, 9),
        ]);
        let view = FilteredView::all(&store);
        let pivot =
            pivot_mean(&view, Dim::TransactionYear, Dim::Author, Measure::Rank, Some(2)).unwrap();
        assert_eq!(pivot.matrix.col_keys, vec![key("Z"), key("X")]);
        assert_eq!(pivot.matrix.get(&GroupKey::Int(2020), &key("Z")), Some(6.0));
        for row in &pivot.matrix.cells {
            assert_eq!(row.len(), 2);
        }
        assert!(pivot_mean(&view, Dim::TransactionYear, Dim::Author, Measure::Rank, Some(0)).is_err());
    }

    #[test]
    fn cross_count_matrix() {
        let store = abc();
        let view = FilteredView::all(&store);
        let m = cross_count(&view, Dim::TransactionYear, Dim::Author);
        assert_eq!(m.col_keys, vec![key("X"), key("Y")]);
        assert_eq!(m.get(&GroupKey::Int(2020), &key("X")), Some(1));
        assert_eq!(m.get(&GroupKey::Int(2021), &key("Y")), None);
    }

    #[test]
    fn hierarchy_sums_are_consistent() {
        let store = abc();
        let view = FilteredView::all(&store);
        let tree =
            hierarchical_count(&view, &[Dim::Publisher, Dim::Author, Dim::Subject]).unwrap();
        assert_eq!(tree.root.count, 3);
        assert!(tree.root.sums_consistent());
        assert_eq!(tree.root.children[0].key, Some(key("X Press")));
        assert_eq!(tree.root.children[0].count, 2);
        assert_eq!(tree.root.leaf_count(), 2);
    }

    #[test]
    fn hierarchy_excludes_records_missing_a_level() {
        let mut records = vec![rec("A", "X", 2020, 1), rec("B", "Y", 2020, 2)];
        records[0].publication_date = None;
        let store = RecordStore::from_records(records);
        let view = FilteredView::all(&store);
        let tree = hierarchical_count(&view, &[Dim::Author, Dim::PublicationYear]).unwrap();
        assert_eq!(tree.root.count, 1);
        assert_eq!(tree.unbucketed, 1);
        assert!(hierarchical_count(&view, &[]).is_err());
    }

    #[test]
    fn trend_explicit_entities_report_missing() {
        let store = abc();
        let view = FilteredView::all(&store);
        let params = TrendParams {
            entities: Some(vec!["C".into(), "Nope".into()]),
            ..TrendParams::default()
        };
        let trend = entity_trend(&view, &params).unwrap();
        assert_eq!(trend.selection, TrendSelection::Explicit);
        assert_eq!(trend.series.len(), 1);
        assert_eq!(trend.series[0].points, vec![TrendPoint { x: 2021, y: 4.0 }]);
        assert_eq!(trend.missing, vec!["Nope".to_string()]);
    }

    #[test]
    fn trend_fallback_selects_best_mean_rank() {
        let store = abc();
        let view = FilteredView::all(&store);
        let params = TrendParams {
            fallback_top_k: 2,
            ..TrendParams::default()
        };
        let trend = entity_trend(&view, &params).unwrap();
        assert_eq!(trend.selection, TrendSelection::AutoTopByMeanRank { k: 2 });
        let names: Vec<_> = trend.series.iter().map(|s| s.entity.clone()).collect();
        assert_eq!(names, vec![key("A"), key("B")]);
    }

    #[test]
    fn trend_points_sorted_by_year() {
        let store = RecordStore::from_records(vec![
            rec("A", "X", 2022, 3),
            rec("A", "X", 2020, 9),
            rec("A", "X", 2021, 1),
        ]);
        let view = FilteredView::all(&store);
        let params = TrendParams {
            entities: Some(vec!["A".into()]),
            ..TrendParams::default()
        };
        let trend = entity_trend(&view, &params).unwrap();
        let xs: Vec<_> = trend.series[0].points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![2020, 2021, 2022]);
    }

    #[test]
    fn trend_rejects_non_year_axis() {
        let store = abc();
        let view = FilteredView::all(&store);
        let params = TrendParams {
            x_dim: Dim::Author,
            ..TrendParams::default()
        };
        assert!(entity_trend(&view, &params).is_err());
    }

    #[test]
    fn summary_kpis() {
        let mut records = vec![
            rec("A", "X", 2020, 1),
            rec("B", "Y", 2020, 2),
            rec("C", "X", 2021, 4),
        ];
        records[1].publication_date = NaiveDate::from_ymd_opt(2010, 5, 1);
        let store = RecordStore::from_records(records);
        let kpis = summary(&FilteredView::all(&store));
        assert_eq!(kpis.records, 3);
        assert_eq!(kpis.unique_titles, 3);
        assert_eq!(kpis.unique_authors, 2);
        assert_eq!(kpis.earliest_publication, NaiveDate::from_ymd_opt(2010, 5, 1));
        assert_eq!(kpis.most_common_publication_year, Some(2015));
        assert_eq!(kpis.mean_rank, Some(2.33));
    }

    #[test]
    fn summary_mode_ties_pick_earliest_year() {
        let mut records = vec![rec("A", "X", 2020, 1), rec("B", "Y", 2020, 2)];
        records[0].publication_date = NaiveDate::from_ymd_opt(2019, 1, 1);
        records[1].publication_date = NaiveDate::from_ymd_opt(2011, 1, 1);
        let store = RecordStore::from_records(records);
        let kpis = summary(&FilteredView::all(&store));
        assert_eq!(kpis.most_common_publication_year, Some(2011));
    }

    #[test]
    fn empty_view_yields_empty_results() {
        let store = abc();
        let view = apply(&store, &FilterSpec::default().with_authors(["Nobody"])).unwrap();
        assert!(count_by_key(&view, Dim::Author).rows.is_empty());
        assert!(top_n_by_count(&view, Dim::Author, 3).unwrap().rows.is_empty());
        assert!(
            rank_by_mean(&view, Dim::Author, Measure::Rank, 3, SortOrder::Ascending)
                .unwrap()
                .rows
                .is_empty()
        );
        assert!(
            pivot_mean(&view, Dim::TransactionYear, Dim::Author, Measure::Rank, Some(3))
                .unwrap()
                .matrix
                .is_empty()
        );
        assert!(cross_count(&view, Dim::TransactionYear, Dim::MediaType).is_empty());
        assert_eq!(hierarchical_count(&view, &[Dim::Author]).unwrap().root.count, 0);
        assert!(entity_trend(&view, &TrendParams::default()).unwrap().series.is_empty());
        let kpis = summary(&view);
        assert_eq!(kpis.records, 0);
        assert_eq!(kpis.mean_rank, None);
    }
}
