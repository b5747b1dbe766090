//! Projection formatter.
//!
//! Turns aggregation results into rendering-agnostic [`Payload`]s and
//! bounded-length summary strings.

pub mod payload;
pub mod summary;

use serde::{Deserialize, Serialize};

use crate::analytics::pipeline::Evaluation;

pub use payload::{Payload, PayloadBody, to_payload};
pub use summary::truncate_with_ellipsis;

/// Limits applied to summary strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// Entries listed in one summary before the "…and N more" marker.
    pub max_display_items: usize,
    /// Characters kept from one label, ellipsis included.
    pub max_label_length: usize,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            max_display_items: 10,
            max_label_length: 55,
        }
    }
}

/// Format every result of `eval` as one JSON document.
///
/// Failed requests become `{"error": {"kind", "message"}}` entries under
/// their name, next to the payloads of the requests that succeeded.
pub fn render_evaluation(eval: &Evaluation, config: &FormatConfig) -> serde_json::Value {
    let results: serde_json::Map<String, serde_json::Value> = eval
        .results
        .iter()
        .map(|(name, result)| {
            let value = match result {
                Ok(result) => to_payload(result, config).to_json(),
                Err(err) => serde_json::json!({
                    "error": { "kind": err.kind(), "message": err.to_string() }
                }),
            };
            (name.clone(), value)
        })
        .collect();

    serde_json::json!({
        "matched": eval.matched,
        "total": eval.total,
        "results": results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::pipeline::{NamedRequest, OperatorRequest, evaluate};
    use crate::filter::FilterSpec;
    use crate::model::{FictionFlag, Record};
    use crate::store::RecordStore;

    #[test]
    fn format_config_defaults_and_overrides() {
        let cfg = FormatConfig::default();
        assert_eq!((cfg.max_display_items, cfg.max_label_length), (10, 55));
        let cfg: FormatConfig = toml::from_str("max_label_length = 20").unwrap();
        assert_eq!((cfg.max_display_items, cfg.max_label_length), (10, 20));
    }

    #[test]
    fn render_mixes_payloads_and_errors() {
        let store = RecordStore::from_records(vec![Record {
            title: "t1".into(),
            native_name: "Only".into(),
            author: "X".into(),
            publisher: "P".into(),
            subject: "S".into(),
            media_type: "Ebook".into(),
            publication_date: None,
            transaction_year: 2020,
            rank: 1,
            fiction: FictionFlag::Unknown,
        }]);
        let reqs = vec![
            NamedRequest::new("kpi", OperatorRequest::Summary),
            NamedRequest::new(
                "bad",
                OperatorRequest::TopNByCount {
                    dimension: "author".into(),
                    n: Some(-1),
                },
            ),
        ];
        let eval = evaluate(&store, &FilterSpec::default(), &reqs).unwrap();
        let json = render_evaluation(&eval, &FormatConfig::default());
        assert_eq!(json["matched"], 1);
        assert_eq!(json["results"]["kpi"]["shape"], "kpis");
        assert_eq!(json["results"]["bad"]["error"]["kind"], "invalid_parameter");
    }
}
