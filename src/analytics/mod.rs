//! Aggregation library.
//!
//! Operators, result shapes and the evaluation cycle consumed by the
//! `lendash` binary and by library callers.
//!
//! # Module structure
//!
//! - [`types`] — dimensions, group keys, result structs, error type
//! - [`bucketing`] — publication date parsing and date labels
//! - [`derive`] — mean accumulators and safe division
//! - [`query`] — the aggregation operators over a filtered view
//! - [`pipeline`] — named operator requests and `evaluate`
//! - [`validate`] — invariant checks over an evaluation

pub mod bucketing;
pub mod derive;
pub mod pipeline;
pub mod query;
pub mod types;
pub mod validate;

// Re-export the most commonly used items at the crate::analytics level.
pub use pipeline::{Evaluation, NamedRequest, OperatorDefaults, OperatorRequest, evaluate, evaluate_with};
pub use query::TrendParams;
pub use types::{
    AggregationResult, AnalyticsError, AnalyticsResult, CountRow, CountsResult, DataFormatError,
    Dim, GroupKey, Hierarchy, HierarchyNode, KpiSummary, Matrix, MeanRanking, MeanRow, Measure,
    PivotResult, SortOrder, TopCounts, TrendPoint, TrendResult, TrendSelection, TrendSeries,
};
pub use validate::{ValidateConfig, ValidationReport};
