use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Multi-metric window aligned by position, ready for a chart.
///
/// Each metric is windowed on its own and its values become one row; the
/// timestamp axis is borrowed from the first metric. Rows are assumed, not
/// verified, to line up index for index. Metrics whose window is empty emit
/// no row, so `values[i]` belongs to `metrics[i]`, not to the i-th metric
/// that was asked for. Metrics logged at different rates silently misalign.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PositionalWindow {
    pub metrics: Vec<String>,
    pub values: Vec<Vec<f64>>,
    pub timestamps: Vec<String>,
}

impl PositionalWindow {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn row(&self, metric: &str) -> Option<&[f64]> {
        self.metrics
            .iter()
            .position(|m| m == metric)
            .map(|i| self.values[i].as_slice())
    }

    /// Splits into the bare `(values, timestamps)` pair charts consume.
    pub fn into_parts(self) -> (Vec<Vec<f64>>, Vec<String>) {
        (self.values, self.timestamps)
    }
}

/// Per-line outcome counts of one scan of the log.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanStats {
    pub lines: usize,
    pub matched: usize,
    pub no_match: usize,
    pub unknown_metric: usize,
    pub bad_timestamp: usize,
    pub bad_number: usize,
}

impl ScanStats {
    /// Lines that looked like stats lines but were still dropped.
    pub fn malformed(&self) -> usize {
        self.unknown_metric + self.bad_timestamp + self.bad_number
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Empty,
    Loaded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub source: String,
    pub state: EngineState,
    pub samples_count: usize,
    pub metrics_count: usize,
    pub stats: ScanStats,
    pub oldest_ts: Option<DateTime<Utc>>,
    pub newest_ts: Option<DateTime<Utc>>,
    pub loaded_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_lookup_uses_emitted_metrics() {
        let window = PositionalWindow {
            metrics: vec!["b".into(), "d".into()],
            values: vec![vec![1.0], vec![2.0, 3.0]],
            timestamps: vec![],
        };
        assert_eq!(window.row("d"), Some([2.0, 3.0].as_slice()));
        assert_eq!(window.row("a"), None);
    }

    #[test]
    fn malformed_excludes_plain_mismatches() {
        let stats = ScanStats {
            lines: 10,
            matched: 4,
            no_match: 3,
            unknown_metric: 1,
            bad_timestamp: 1,
            bad_number: 1,
        };
        assert_eq!(stats.malformed(), 3);
    }
}
