//! Analytics validation library.
//!
//! Deterministic consistency checks between an [`Evaluation`] and the
//! filtered view it was computed from:
//! - **Count totals**: bucket counts plus unbucketed equal the view size.
//! - **Ordering**: count and mean rankings follow their documented order.
//! - **Subset**: top-N rows agree with a fresh count-by-key.
//! - **Mean bounds**: every mean lies within its group's `[min, max]`.
//! - **Matrix shape**: pivot grids are rectangular and column sets respect
//!   `top_k`.
//! - **Hierarchy sums**: every internal node equals the sum of its children.
//!
//! Output is a structured [`ValidationReport`] that serialises to JSON for
//! `lendash evaluate --validate`.

use std::cmp::Ordering;
use std::time::Instant;

use serde::Serialize;

use super::pipeline::Evaluation;
use super::query;
use super::types::*;
use crate::filter::FilteredView;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Severity level for a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A single validation check result.
#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub id: String,
    pub ok: bool,
    pub severity: Severity,
    pub details: String,
}

impl Check {
    fn new(id: String, ok: bool, severity: Severity, details: String) -> Self {
        Self {
            id,
            ok,
            severity,
            details,
        }
    }
}

/// Report metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    pub elapsed_ms: u64,
    pub view_size: usize,
    pub results_checked: usize,
    /// Requests that failed and therefore had nothing to check.
    pub results_skipped: usize,
}

/// Full validation report.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub checks: Vec<Check>,
    pub _meta: ReportMeta,
}

impl ValidationReport {
    /// True if every check passed.
    pub fn all_ok(&self) -> bool {
        self.checks.iter().all(|c| c.ok)
    }

    /// Count of checks that failed with a given severity.
    pub fn count_failures(&self, sev: Severity) -> usize {
        self.checks
            .iter()
            .filter(|c| !c.ok && c.severity == sev)
            .count()
    }

    /// Produce the JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::json!({"error": "serialization failed"}))
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ValidateConfig {
    /// Tolerance for floating-point comparisons of means.
    pub epsilon: f64,
    /// Recount the view to cross-check top-N rows against count-by-key.
    pub cross_check_counts: bool,
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-9,
            cross_check_counts: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Check every successful result of `eval` against `view`.
pub fn run_validation(
    view: &FilteredView<'_>,
    eval: &Evaluation,
    config: &ValidateConfig,
) -> ValidationReport {
    let start = Instant::now();
    let mut checks = Vec::new();
    let mut checked = 0usize;
    let mut skipped = 0usize;

    checks.push(Check::new(
        "view.size".into(),
        eval.matched == view.len(),
        Severity::Error,
        format!("evaluation matched {} records, view has {}", eval.matched, view.len()),
    ));

    for (name, result) in &eval.results {
        let Ok(result) = result else {
            skipped += 1;
            continue;
        };
        checked += 1;
        match result {
            AggregationResult::Counts(r) => checks.extend(validate_counts(name, r, view)),
            AggregationResult::TopCounts(r) => {
                checks.extend(validate_top_counts(name, r, view, config));
            }
            AggregationResult::MeanRanking(r) => {
                checks.extend(validate_mean_ranking(name, r, config));
            }
            AggregationResult::Pivot(r) => checks.extend(validate_pivot(name, r)),
            AggregationResult::CrossCounts(m) => checks.push(validate_cross_counts(name, m, view)),
            AggregationResult::Hierarchy(h) => checks.extend(validate_hierarchy(name, h, view)),
            AggregationResult::Trend(t) => checks.push(validate_trend(name, t)),
            AggregationResult::Summary(s) => checks.push(Check::new(
                format!("summary.records:{name}"),
                s.records == view.len() as u64,
                Severity::Error,
                format!("summary reports {} records, view has {}", s.records, view.len()),
            )),
        }
    }

    ValidationReport {
        checks,
        _meta: ReportMeta {
            elapsed_ms: start.elapsed().as_millis() as u64,
            view_size: view.len(),
            results_checked: checked,
            results_skipped: skipped,
        },
    }
}

// ---------------------------------------------------------------------------
// Per-shape checks
// ---------------------------------------------------------------------------

fn count_order_ok(rows: &[CountRow]) -> bool {
    rows.windows(2).all(|w| {
        w[0].count > w[1].count || (w[0].count == w[1].count && w[0].key < w[1].key)
    })
}

fn validate_counts(name: &str, r: &CountsResult, view: &FilteredView<'_>) -> Vec<Check> {
    let total = r.total() + r.unbucketed;
    vec![
        Check::new(
            format!("counts.total:{name}"),
            total == view.len() as u64,
            Severity::Error,
            format!(
                "sum(counts)={} + unbucketed={} vs view={}",
                r.total(),
                r.unbucketed,
                view.len()
            ),
        ),
        Check::new(
            format!("counts.order:{name}"),
            count_order_ok(&r.rows),
            Severity::Warning,
            "rows ordered by count desc, key asc".into(),
        ),
    ]
}

fn validate_top_counts(
    name: &str,
    r: &TopCounts,
    view: &FilteredView<'_>,
    config: &ValidateConfig,
) -> Vec<Check> {
    let mut checks = vec![
        Check::new(
            format!("top_counts.len:{name}"),
            r.rows.len() <= r.n,
            Severity::Error,
            format!("{} rows for n={}", r.rows.len(), r.n),
        ),
        Check::new(
            format!("top_counts.order:{name}"),
            count_order_ok(&r.rows),
            Severity::Error,
            "rows ordered by count desc, key asc".into(),
        ),
    ];

    if config.cross_check_counts {
        let full = query::count_by_key(view, r.dim);
        let mismatched: Vec<String> = r
            .rows
            .iter()
            .filter(|row| full.get(&row.key) != Some(row.count))
            .map(|row| row.key.to_string())
            .collect();
        checks.push(Check::new(
            format!("top_counts.subset:{name}"),
            mismatched.is_empty(),
            Severity::Error,
            if mismatched.is_empty() {
                "every row matches count-by-key".into()
            } else {
                format!("rows disagree with count-by-key: {}", mismatched.join(", "))
            },
        ));
    }
    checks
}

fn validate_mean_ranking(name: &str, r: &MeanRanking, config: &ValidateConfig) -> Vec<Check> {
    let eps = config.epsilon;
    let out_of_bounds = r
        .rows
        .iter()
        .filter(|row| row.count == 0 || row.mean < row.min - eps || row.mean > row.max + eps)
        .count();
    let ordered = r.rows.windows(2).all(|w| {
        let by_mean = match r.order {
            SortOrder::Ascending => w[0].mean.total_cmp(&w[1].mean),
            SortOrder::Descending => w[1].mean.total_cmp(&w[0].mean),
        };
        by_mean.then_with(|| w[0].key.cmp(&w[1].key)) != Ordering::Greater
    });
    vec![
        Check::new(
            format!("mean_ranking.bounds:{name}"),
            out_of_bounds == 0,
            Severity::Error,
            format!("{out_of_bounds} rows with no records or a mean outside [min, max]"),
        ),
        Check::new(
            format!("mean_ranking.order:{name}"),
            ordered && r.rows.len() <= r.n,
            Severity::Error,
            format!("{} rows, order {:?}", r.rows.len(), r.order),
        ),
    ]
}

fn validate_pivot(name: &str, r: &PivotResult) -> Vec<Check> {
    let m = &r.matrix;
    let rectangular =
        m.cells.len() == m.row_keys.len() && m.cells.iter().all(|row| row.len() == m.col_keys.len());
    let rows_have_data = m.cells.iter().all(|row| row.iter().any(Option::is_some));
    let rows_ascending = m.row_keys.windows(2).all(|w| w[0] < w[1]);
    let within_k = r.top_k.is_none_or(|k| m.col_keys.len() <= k);
    vec![
        Check::new(
            format!("pivot.shape:{name}"),
            rectangular && rows_have_data,
            Severity::Error,
            format!("{}x{} grid", m.row_keys.len(), m.col_keys.len()),
        ),
        Check::new(
            format!("pivot.columns:{name}"),
            within_k && rows_ascending,
            Severity::Error,
            format!("{} columns, top_k {:?}", m.col_keys.len(), r.top_k),
        ),
    ]
}

fn validate_cross_counts(name: &str, m: &Matrix<u64>, view: &FilteredView<'_>) -> Check {
    let total: u64 = m.cells.iter().flatten().flatten().sum();
    Check::new(
        format!("cross_counts.total:{name}"),
        total <= view.len() as u64,
        Severity::Error,
        format!("matrix total {total} vs view {}", view.len()),
    )
}

fn validate_hierarchy(name: &str, h: &Hierarchy, view: &FilteredView<'_>) -> Vec<Check> {
    vec![
        Check::new(
            format!("hierarchy.sums:{name}"),
            h.root.sums_consistent(),
            Severity::Error,
            "every internal node equals the sum of its children".into(),
        ),
        Check::new(
            format!("hierarchy.total:{name}"),
            h.root.count + h.unbucketed == view.len() as u64,
            Severity::Error,
            format!(
                "root={} + unbucketed={} vs view={}",
                h.root.count,
                h.unbucketed,
                view.len()
            ),
        ),
    ]
}

fn validate_trend(name: &str, t: &TrendResult) -> Check {
    let unsorted: Vec<String> = t
        .series
        .iter()
        .filter(|s| s.points.windows(2).any(|w| w[0].x > w[1].x))
        .map(|s| s.entity.to_string())
        .collect();
    Check::new(
        format!("trend.order:{name}"),
        unsorted.is_empty(),
        Severity::Warning,
        if unsorted.is_empty() {
            "points ascend by x".into()
        } else {
            format!("unsorted series: {}", unsorted.join(", "))
        },
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
