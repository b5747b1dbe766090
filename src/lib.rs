//! Filter-and-aggregate analytics core for a library lending dashboard.
//!
//! Raw lending rows are normalized once into a [`store::RecordStore`]. Each
//! interaction applies a [`filter::FilterSpec`] to get a read-only view, runs
//! any number of named aggregation requests against it in parallel, and
//! formats the results as chart-agnostic payloads.
//!
//! ```no_run
//! use lending_analytics::analytics::{NamedRequest, OperatorRequest, evaluate};
//! use lending_analytics::filter::FilterSpec;
//! use lending_analytics::projection::{FormatConfig, render_evaluation};
//! use lending_analytics::store::{LoadOptions, RawRow, RecordStore};
//!
//! # fn main() -> anyhow::Result<()> {
//! let rows: Vec<RawRow> = serde_json::from_str(&std::fs::read_to_string("rows.json")?)?;
//! let store = RecordStore::load(rows, &LoadOptions::default())?;
//! let spec = FilterSpec::default().with_years([2022, 2023]);
//! let requests = vec![NamedRequest::new("kpi", OperatorRequest::Summary)];
//! let eval = evaluate(&store, &spec, &requests)?;
//! println!("{}", render_evaluation(&eval, &FormatConfig::default()));
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod cli;
pub mod config;
pub mod filter;
pub mod model;
pub mod projection;
pub mod store;

pub use cli::{Cli, Commands, run};
