//! `lendash` command line.
//!
//! Reads raw rows and a request document as JSON files, runs one evaluation
//! cycle and prints the formatted payloads to stdout. Logs go to stderr.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use tracing::debug;

use crate::analytics::types::Dim;
use crate::analytics::validate::{ValidateConfig, run_validation};
use crate::analytics::{NamedRequest, evaluate_with};
use crate::config::DashboardConfig;
use crate::filter::{self, FilterSpec};
use crate::projection::render_evaluation;
use crate::store::{OnInvalidRow, RawRow, RecordStore};

#[derive(Parser, Debug)]
#[command(name = "lendash", version, about = "Library lending dashboard analytics", long_about = None)]
pub struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/lendash/config.toml)
    #[arg(long, global = true, env = "LENDASH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose logging to stderr (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Filter the rows and run every request in the request document
    Evaluate {
        /// JSON array of raw lending rows
        #[arg(long)]
        rows: PathBuf,

        /// JSON request document: {"filter": {...}, "requests": [...]}
        #[arg(long)]
        request: PathBuf,

        #[command(flatten)]
        load: LoadArgs,

        /// Entries listed per summary before "…and N more"
        #[arg(long)]
        max_display_items: Option<usize>,

        /// Maximum label length in summaries
        #[arg(long)]
        max_label_length: Option<usize>,

        /// Attach an invariant validation report to the output
        #[arg(long)]
        validate: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// List the distinct values of every filterable dimension
    Options {
        /// JSON array of raw lending rows
        #[arg(long)]
        rows: PathBuf,

        #[command(flatten)]
        load: LoadArgs,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct LoadArgs {
    /// What to do with rows that fail validation
    #[arg(long, value_enum)]
    pub on_invalid_row: Option<InvalidRowArg>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum InvalidRowArg {
    Skip,
    Fail,
}

impl From<InvalidRowArg> for OnInvalidRow {
    fn from(value: InvalidRowArg) -> Self {
        match value {
            InvalidRowArg::Skip => OnInvalidRow::Skip,
            InvalidRowArg::Fail => OnInvalidRow::Fail,
        }
    }
}

/// Request document read by `lendash evaluate`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestDocument {
    #[serde(default)]
    pub filter: serde_json::Value,
    pub requests: Vec<NamedRequest>,
}

impl RequestDocument {
    pub fn filter_spec(&self) -> crate::analytics::AnalyticsResult<FilterSpec> {
        if self.filter.is_null() {
            return Ok(FilterSpec::default());
        }
        FilterSpec::from_json(self.filter.clone())
    }
}

fn load_config(path: Option<&Path>) -> Result<DashboardConfig> {
    let config = match path {
        Some(p) => DashboardConfig::load_from(p),
        None => DashboardConfig::load(),
    };
    config.context("loading configuration")
}

fn load_store(rows: &Path, config: &DashboardConfig, args: &LoadArgs) -> Result<RecordStore> {
    let content = std::fs::read_to_string(rows)
        .with_context(|| format!("reading rows from {}", rows.display()))?;
    let raw: Vec<RawRow> = serde_json::from_str(&content)
        .with_context(|| format!("parsing rows from {}", rows.display()))?;
    let mut options = config.load.clone();
    if let Some(policy) = args.on_invalid_row {
        options.on_invalid_row = policy.into();
    }
    RecordStore::load(raw, &options).context("loading record store")
}

fn print_json(value: &serde_json::Value, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}

/// Run a parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    debug!(?config, "Resolved configuration");

    match cli.command {
        Commands::Evaluate {
            rows,
            request,
            load,
            max_display_items,
            max_label_length,
            validate,
            pretty,
        } => {
            if let Some(n) = max_display_items {
                config.format.max_display_items = n;
            }
            if let Some(n) = max_label_length {
                config.format.max_label_length = n;
            }
            config.validate().context("invalid formatting options")?;

            let store = load_store(&rows, &config, &load)?;
            let content = std::fs::read_to_string(&request)
                .with_context(|| format!("reading request from {}", request.display()))?;
            let doc: RequestDocument = serde_json::from_str(&content)
                .with_context(|| format!("parsing request from {}", request.display()))?;
            let spec = doc.filter_spec().context("invalid filter")?;

            let eval = evaluate_with(&store, &spec, &doc.requests, &config.defaults)
                .context("evaluation failed")?;
            let mut output = render_evaluation(&eval, &config.format);
            if validate {
                let view = filter::apply(&store, &spec)?;
                let report = run_validation(&view, &eval, &ValidateConfig::default());
                output["validation"] = report.to_json();
            }
            if !store.report().skipped.is_empty() {
                output["skipped_rows"] = serde_json::to_value(&store.report().skipped)?;
            }
            print_json(&output, pretty)
        }
        Commands::Options { rows, load, pretty } => {
            let store = load_store(&rows, &config, &load)?;
            let dimensions: serde_json::Map<String, serde_json::Value> = Dim::all()
                .iter()
                .filter(|d| !matches!(d, Dim::Title | Dim::TitleId))
                .map(|d| {
                    let values = serde_json::to_value(store.distinct_values(*d))
                        .unwrap_or(serde_json::Value::Null);
                    (d.to_string(), values)
                })
                .collect();
            let dates = store.publication_date_bounds();
            let output = serde_json::json!({
                "records": store.len(),
                "dimensions": dimensions,
                "publication_dates": {
                    "earliest": dates.map(|(lo, _)| lo),
                    "latest": dates.map(|(_, hi)| hi),
                },
                "load": store.report(),
            });
            print_json(&output, pretty)
        }
    }
}
