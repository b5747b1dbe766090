//! Derived-metric helpers for aggregation buckets.
//!
//! All division operations are safe against zero denominators and produce
//! `None` rather than NaN / Infinity.

/// Running sum / count / min / max for one group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanAccumulator {
    pub sum: f64,
    pub count: u64,
    pub min: f64,
    pub max: f64,
}

impl Default for MeanAccumulator {
    fn default() -> Self {
        Self {
            sum: 0.0,
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl MeanAccumulator {
    pub fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn mean(&self) -> Option<f64> {
        safe_div(self.sum, self.count)
    }

    /// `(min, max)` when at least one value was pushed.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        (self.count > 0).then_some((self.min, self.max))
    }
}

/// Safe division returning `None` when the denominator is zero.
pub fn safe_div(numerator: f64, denominator: u64) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator / denominator as f64)
    }
}

/// Round to 2 decimal places (`(v * 100.0).round() / 100.0`).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
