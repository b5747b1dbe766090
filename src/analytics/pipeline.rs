//! Named operator requests and the evaluation cycle.
//!
//! One cycle filters the store once, then runs every requested operator
//! against the shared view in parallel. Each request gets its own `Result`,
//! so a bad parameter in one request never hides the others.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::query::{self, TrendParams};
use super::types::*;
use crate::filter::{self, FilterSpec, FilteredView};
use crate::store::RecordStore;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Parameter values used when a request leaves them out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorDefaults {
    pub top_n: i64,
    pub pivot_top_k: i64,
    pub trend_fallback_top_k: i64,
}

impl Default for OperatorDefaults {
    fn default() -> Self {
        Self {
            top_n: 10,
            pivot_top_k: 10,
            trend_fallback_top_k: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// One operator invocation. Dimension, measure and order names are plain
/// strings so that a bad name fails only the request that carries it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum OperatorRequest {
    CountByKey {
        dimension: String,
    },
    TopNByCount {
        dimension: String,
        #[serde(default)]
        n: Option<i64>,
    },
    RankByMean {
        dimension: String,
        #[serde(default)]
        n: Option<i64>,
        /// Measure name, `rank` when absent.
        #[serde(default)]
        value: Option<String>,
        /// `ascending` (default) or `descending`.
        #[serde(default)]
        order: Option<String>,
    },
    PivotMean {
        row: String,
        column: String,
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        top_k: Option<i64>,
        /// Keep every column key instead of the top-K.
        #[serde(default)]
        all_columns: bool,
    },
    CrossCount {
        row: String,
        column: String,
    },
    HierarchicalCount {
        path: Vec<String>,
    },
    EntityTrend {
        #[serde(default)]
        entities: Option<Vec<String>>,
        #[serde(default)]
        entity_dimension: Option<String>,
        #[serde(default)]
        x: Option<String>,
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        fallback_top_k: Option<i64>,
    },
    Summary,
}

fn parse_measure(value: Option<&str>) -> AnalyticsResult<Measure> {
    value.map_or(Ok(Measure::Rank), str::parse)
}

impl OperatorRequest {
    /// Wire name of the operator.
    pub fn op_name(&self) -> &'static str {
        match self {
            Self::CountByKey { .. } => "count_by_key",
            Self::TopNByCount { .. } => "top_n_by_count",
            Self::RankByMean { .. } => "rank_by_mean",
            Self::PivotMean { .. } => "pivot_mean",
            Self::CrossCount { .. } => "cross_count",
            Self::HierarchicalCount { .. } => "hierarchical_count",
            Self::EntityTrend { .. } => "entity_trend",
            Self::Summary => "summary",
        }
    }

    /// Run this request against `view`.
    pub fn run(
        &self,
        view: &FilteredView<'_>,
        defaults: &OperatorDefaults,
    ) -> AnalyticsResult<AggregationResult> {
        match self {
            Self::CountByKey { dimension } => {
                let dim: Dim = dimension.parse()?;
                Ok(AggregationResult::Counts(query::count_by_key(view, dim)))
            }
            Self::TopNByCount { dimension, n } => {
                let dim: Dim = dimension.parse()?;
                let n = n.unwrap_or(defaults.top_n);
                query::top_n_by_count(view, dim, n).map(AggregationResult::TopCounts)
            }
            Self::RankByMean {
                dimension,
                n,
                value,
                order,
            } => {
                let dim: Dim = dimension.parse()?;
                let measure = parse_measure(value.as_deref())?;
                let order = order
                    .as_deref()
                    .map_or(Ok(SortOrder::Ascending), str::parse)?;
                let n = n.unwrap_or(defaults.top_n);
                query::rank_by_mean(view, dim, measure, n, order)
                    .map(AggregationResult::MeanRanking)
            }
            Self::PivotMean {
                row,
                column,
                value,
                top_k,
                all_columns,
            } => {
                let row_dim: Dim = row.parse()?;
                let col_dim: Dim = column.parse()?;
                let measure = parse_measure(value.as_deref())?;
                let top_k = if *all_columns {
                    None
                } else {
                    Some(top_k.unwrap_or(defaults.pivot_top_k))
                };
                query::pivot_mean(view, row_dim, col_dim, measure, top_k)
                    .map(AggregationResult::Pivot)
            }
            Self::CrossCount { row, column } => {
                let row_dim: Dim = row.parse()?;
                let col_dim: Dim = column.parse()?;
                Ok(AggregationResult::CrossCounts(query::cross_count(
                    view, row_dim, col_dim,
                )))
            }
            Self::HierarchicalCount { path } => {
                let dims = path
                    .iter()
                    .map(|name| name.parse::<Dim>())
                    .collect::<AnalyticsResult<Vec<_>>>()?;
                query::hierarchical_count(view, &dims).map(AggregationResult::Hierarchy)
            }
            Self::EntityTrend {
                entities,
                entity_dimension,
                x,
                value,
                fallback_top_k,
            } => {
                let params = TrendParams {
                    entity_dim: entity_dimension
                        .as_deref()
                        .map_or(Ok(Dim::Title), str::parse)?,
                    entities: entities.clone(),
                    x_dim: x.as_deref().map_or(Ok(Dim::TransactionYear), str::parse)?,
                    measure: parse_measure(value.as_deref())?,
                    fallback_top_k: fallback_top_k.unwrap_or(defaults.trend_fallback_top_k),
                };
                query::entity_trend(view, &params).map(AggregationResult::Trend)
            }
            Self::Summary => Ok(AggregationResult::Summary(query::summary(view))),
        }
    }
}

/// A request plus the name its result is reported under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamedRequest {
    pub name: String,
    pub request: OperatorRequest,
}

impl NamedRequest {
    pub fn new(name: impl Into<String>, request: OperatorRequest) -> Self {
        Self {
            name: name.into(),
            request,
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Output of one evaluation cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Records in the filtered view.
    pub matched: usize,
    /// Records in the store.
    pub total: usize,
    /// Result per request name. Names that were not requested are absent.
    pub results: BTreeMap<String, AnalyticsResult<AggregationResult>>,
}

impl Evaluation {
    pub fn get(&self, name: &str) -> Option<&AnalyticsResult<AggregationResult>> {
        self.results.get(name)
    }

    /// Names of the requests that failed.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &AnalyticsError)> {
        self.results
            .iter()
            .filter_map(|(name, r)| r.as_ref().err().map(|e| (name.as_str(), e)))
    }
}

/// Run one cycle with the built-in defaults.
pub fn evaluate(
    store: &RecordStore,
    spec: &FilterSpec,
    requests: &[NamedRequest],
) -> AnalyticsResult<Evaluation> {
    evaluate_with(store, spec, requests, &OperatorDefaults::default())
}

/// Run one cycle: filter once, then run every request against the view.
///
/// An invalid filter spec or a repeated request name fails the whole cycle.
/// Operator errors are reported per request.
pub fn evaluate_with(
    store: &RecordStore,
    spec: &FilterSpec,
    requests: &[NamedRequest],
    defaults: &OperatorDefaults,
) -> AnalyticsResult<Evaluation> {
    let mut seen = BTreeSet::new();
    for req in requests {
        if !seen.insert(req.name.as_str()) {
            return Err(AnalyticsError::invalid(format!(
                "duplicate request name '{}'",
                req.name
            )));
        }
    }

    let started = Instant::now();
    let view = filter::apply(store, spec)?;

    let results: BTreeMap<String, AnalyticsResult<AggregationResult>> = requests
        .par_iter()
        .map(|req| {
            let op_started = Instant::now();
            let result = req.request.run(&view, defaults);
            debug!(
                name = %req.name,
                op = req.request.op_name(),
                ok = result.is_ok(),
                elapsed_us = op_started.elapsed().as_micros() as u64,
                "Evaluated operator"
            );
            (req.name.clone(), result)
        })
        .collect();

    let failed = results.values().filter(|r| r.is_err()).count();
    info!(
        requests = requests.len(),
        failed,
        matched = view.len(),
        total = store.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Evaluation cycle complete"
    );

    Ok(Evaluation {
        matched: view.len(),
        total: store.len(),
        results,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
