//! Chart-agnostic payloads.
//!
//! A [`Payload`] carries everything a renderer needs for one figure: labels,
//! values in operator order, explicit `null` markers for missing matrix
//! cells, and pre-rendered hover summaries. It never names a chart type.

use serde::Serialize;

use super::FormatConfig;
use super::summary::{cell_summary, format_count, format_mean, list_summary, truncate_with_ellipsis};
use crate::analytics::bucketing::date_label;
use crate::analytics::types::*;

// ---------------------------------------------------------------------------
// Payload types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    /// Display label (possibly truncated).
    pub label: String,
    pub key: GroupKey,
    pub value: f64,
    /// Records behind the value.
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dim: Option<Dim>,
    pub weight: u64,
    pub summary: String,
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Line {
    pub name: String,
    pub entity: GroupKey,
    /// `[x, y]` pairs ascending by `x`.
    pub points: Vec<(i64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiTile {
    pub label: &'static str,
    pub value: String,
}

/// Shape-specific part of a payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum PayloadBody {
    Series {
        dim: Dim,
        value_label: String,
        points: Vec<SeriesPoint>,
        #[serde(skip_serializing_if = "Option::is_none")]
        unbucketed: Option<u64>,
    },
    Matrix {
        row_dim: Dim,
        col_dim: Dim,
        value_label: String,
        row_keys: Vec<GroupKey>,
        col_keys: Vec<GroupKey>,
        /// `null` means no record falls in the cell.
        values: Vec<Vec<Option<f64>>>,
        row_summaries: Vec<String>,
        cell_summaries: Vec<Vec<String>>,
    },
    Tree {
        path: Vec<Dim>,
        root: TreeNode,
        unbucketed: u64,
    },
    Lines {
        entity_dim: Dim,
        x_dim: Dim,
        value_label: String,
        selection: TrendSelection,
        lines: Vec<Line>,
        missing: Vec<String>,
    },
    Kpis {
        tiles: Vec<KpiTile>,
    },
}

/// Formatted output of one operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payload {
    pub kind: &'static str,
    pub title: String,
    /// The operator ran but found nothing to aggregate.
    pub empty: bool,
    #[serde(flatten)]
    pub body: PayloadBody,
}

impl Payload {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::json!({"error": "serialization failed"}))
    }
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Format one aggregation result.
pub fn to_payload(result: &AggregationResult, config: &FormatConfig) -> Payload {
    let body = match result {
        AggregationResult::Counts(r) => PayloadBody::Series {
            dim: r.dim,
            value_label: "count".into(),
            points: year_ordered(r.dim, count_points(&r.rows, config)),
            unbucketed: (r.unbucketed > 0).then_some(r.unbucketed),
        },
        AggregationResult::TopCounts(r) => PayloadBody::Series {
            dim: r.dim,
            value_label: "count".into(),
            points: count_points(&r.rows, config),
            unbucketed: None,
        },
        AggregationResult::MeanRanking(r) => PayloadBody::Series {
            dim: r.dim,
            value_label: r.measure.label().into(),
            points: r
                .rows
                .iter()
                .map(|row| SeriesPoint {
                    label: truncate_with_ellipsis(&row.key.to_string(), config.max_label_length),
                    key: row.key.clone(),
                    value: row.mean,
                    count: row.count,
                })
                .collect(),
            unbucketed: None,
        },
        AggregationResult::Pivot(r) => {
            matrix_body(&r.matrix, r.measure.label(), |v| v, format_mean, config)
        }
        AggregationResult::CrossCounts(m) => {
            matrix_body(m, "count", |v| v as f64, format_count, config)
        }
        AggregationResult::Hierarchy(h) => PayloadBody::Tree {
            path: h.path.clone(),
            root: tree_node(&h.root, config),
            unbucketed: h.unbucketed,
        },
        AggregationResult::Trend(t) => PayloadBody::Lines {
            entity_dim: t.entity_dim,
            x_dim: t.x_dim,
            value_label: t.measure.label().into(),
            selection: t.selection.clone(),
            lines: t
                .series
                .iter()
                .map(|s| Line {
                    name: truncate_with_ellipsis(&s.entity.to_string(), config.max_label_length),
                    entity: s.entity.clone(),
                    points: s.points.iter().map(|p| (p.x, p.y)).collect(),
                })
                .collect(),
            missing: t.missing.clone(),
        },
        AggregationResult::Summary(s) => PayloadBody::Kpis {
            tiles: kpi_tiles(s),
        },
    };

    Payload {
        kind: result.kind(),
        title: title_for(result),
        empty: result.is_empty(),
        body,
    }
}

fn title_for(result: &AggregationResult) -> String {
    match result {
        AggregationResult::Counts(r) => format!("Records by {}", r.dim.label()),
        AggregationResult::TopCounts(r) => format!("Top {} by {}", r.n, r.dim.label()),
        AggregationResult::MeanRanking(r) => {
            format!("Top {} {} by {}", r.n, r.dim.label(), r.measure.label())
        }
        AggregationResult::Pivot(r) => format!(
            "{} by {} and {}",
            r.measure.label(),
            r.matrix.row_dim.label(),
            r.matrix.col_dim.label()
        ),
        AggregationResult::CrossCounts(m) => {
            format!("Records by {} and {}", m.row_dim.label(), m.col_dim.label())
        }
        AggregationResult::Hierarchy(h) => h
            .path
            .iter()
            .map(Dim::label)
            .collect::<Vec<_>>()
            .join(" > "),
        AggregationResult::Trend(t) => format!(
            "{} over {} by {}",
            t.measure.label(),
            t.x_dim.label(),
            t.entity_dim.label()
        ),
        AggregationResult::Summary(_) => "Summary".into(),
    }
}

fn count_points(rows: &[CountRow], config: &FormatConfig) -> Vec<SeriesPoint> {
    rows.iter()
        .map(|row| SeriesPoint {
            label: truncate_with_ellipsis(&row.key.to_string(), config.max_label_length),
            key: row.key.clone(),
            value: row.count as f64,
            count: row.count,
        })
        .collect()
}

/// Full per-year counts chart along the year axis, so they are re-ordered by
/// ascending year. Top-N selections keep their ranking order.
fn year_ordered(dim: Dim, mut points: Vec<SeriesPoint>) -> Vec<SeriesPoint> {
    if dim.is_year() {
        points.sort_by(|a, b| a.key.cmp(&b.key));
    }
    points
}

fn matrix_body<T: Copy>(
    m: &Matrix<T>,
    value_label: &str,
    to_value: fn(T) -> f64,
    render: fn(T) -> String,
    config: &FormatConfig,
) -> PayloadBody {
    let col_labels: Vec<String> = m.col_keys.iter().map(GroupKey::to_string).collect();
    let mut row_summaries = Vec::with_capacity(m.row_keys.len());
    let mut cell_summaries = Vec::with_capacity(m.row_keys.len());

    for (r, row_key) in m.row_keys.iter().enumerate() {
        let row_label = row_key.to_string();
        let entries: Vec<(String, String)> = m
            .row_entries(r)
            .into_iter()
            .map(|(k, v)| (k.to_string(), render(v)))
            .collect();
        row_summaries.push(list_summary(&row_label, &entries, config));

        let cells = m.cells.get(r).map(Vec::as_slice).unwrap_or_default();
        cell_summaries.push(
            col_labels
                .iter()
                .zip(cells)
                .map(|(col, v)| {
                    cell_summary(&row_label, col, (*v).map(render).as_deref(), config)
                })
                .collect(),
        );
    }

    PayloadBody::Matrix {
        row_dim: m.row_dim,
        col_dim: m.col_dim,
        value_label: value_label.into(),
        row_keys: m.row_keys.clone(),
        col_keys: m.col_keys.clone(),
        values: m
            .cells
            .iter()
            .map(|row| row.iter().map(|v| (*v).map(to_value)).collect())
            .collect(),
        row_summaries,
        cell_summaries,
    }
}

fn tree_node(node: &HierarchyNode, config: &FormatConfig) -> TreeNode {
    let label = match &node.key {
        Some(key) => key.to_string(),
        None => "All".to_string(),
    };
    let entries: Vec<(String, String)> = node
        .children
        .iter()
        .filter_map(|c| c.key.as_ref().map(|k| (k.to_string(), format_count(c.count))))
        .collect();
    let summary = if node.is_leaf() {
        format!(
            "{}: {}",
            truncate_with_ellipsis(&label, config.max_label_length),
            format_count(node.count)
        )
    } else {
        list_summary(&format!("{label} ({})", node.count), &entries, config)
    };
    TreeNode {
        label: truncate_with_ellipsis(&label, config.max_label_length),
        dim: node.dim,
        weight: node.count,
        summary,
        children: node.children.iter().map(|c| tree_node(c, config)).collect(),
    }
}

fn kpi_tiles(s: &KpiSummary) -> Vec<KpiTile> {
    let tile = |label, value| KpiTile { label, value };
    vec![
        tile("Total Records", format_count(s.records)),
        tile("Total Titles", format_count(s.unique_titles)),
        tile("Total Authors", format_count(s.unique_authors)),
        tile("Total Publishers", format_count(s.unique_publishers)),
        tile("Earliest Publication Date", date_label(s.earliest_publication)),
        tile("Latest Publication Date", date_label(s.latest_publication)),
        tile(
            "Most Common Publication Year",
            s.most_common_publication_year
                .map_or_else(|| "N/A".to_string(), |y| y.to_string()),
        ),
        tile(
            "Average Rank",
            s.mean_rank.map_or_else(|| "N/A".to_string(), format_mean),
        ),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
