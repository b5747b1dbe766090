//! Bounded-length hover summaries.

use super::FormatConfig;

/// Cut `input` to at most `width` characters, marking the cut with `…`.
pub fn truncate_with_ellipsis(input: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    let char_count = input.chars().count();
    if char_count <= width {
        return input.to_string();
    }
    if width == 1 {
        return "\u{2026}".to_string();
    }
    let mut out: String = input.chars().take(width - 1).collect();
    out.push('\u{2026}');
    out
}

pub fn format_count(value: u64) -> String {
    value.to_string()
}

pub fn format_mean(value: f64) -> String {
    format!("{value:.2}")
}

/// `"{heading}: a (1), b (2), …and N more"` with at most
/// `max_display_items` entries and every label cut to `max_label_length`.
pub fn list_summary(heading: &str, items: &[(String, String)], config: &FormatConfig) -> String {
    let heading = truncate_with_ellipsis(heading, config.max_label_length);
    if items.is_empty() {
        return format!("{heading}: no data");
    }
    let shown: Vec<String> = items
        .iter()
        .take(config.max_display_items)
        .map(|(label, value)| {
            format!(
                "{} ({value})",
                truncate_with_ellipsis(label, config.max_label_length)
            )
        })
        .collect();
    let mut out = format!("{heading}: {}", shown.join(", "));
    let hidden = items.len().saturating_sub(config.max_display_items);
    if hidden > 0 {
        out.push_str(&format!(", \u{2026}and {hidden} more"));
    }
    out
}

/// One matrix cell: `"{col} in {row}: {value}"`, or `no data`.
pub fn cell_summary(row: &str, col: &str, value: Option<&str>, config: &FormatConfig) -> String {
    let row = truncate_with_ellipsis(row, config.max_label_length);
    let col = truncate_with_ellipsis(col, config.max_label_length);
    match value {
        Some(v) => format!("{col} in {row}: {v}"),
        None => format!("{col} in {row}: no data"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
