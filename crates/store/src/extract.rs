use std::sync::OnceLock;

use dcvstat_core::catalog::Catalog;
use dcvstat_core::model::Sample;
use dcvstat_core::model::sample::avg_metric_name;
use dcvstat_core::time::{DisplayZone, parse_log_timestamp};
use regex::Regex;
use thiserror::Error;
use tracing::debug;

/// Stats line emitted by the DCV server's QUIC transport, e.g.
///
/// ```text
/// 2025-09-26 10:39:33,895159 [ 1139:1139 ] INFO quictransport - Connection 3 - Stats (1): quic_lost_packets: [sum: 221, last: 221, max: 221, avg: 221.00]
/// ```
///
/// Only the integer digits of `last` and `avg` are captured; `avg: 221.00`
/// yields 221.
pub const STATS_LINE_PATTERN: &str =
    r"^(\S+\s+\S+),.*Stats \(\d+\): (\S+):.*last: ([0-9]+).*avg: ([0-9]+)";

fn stats_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(STATS_LINE_PATTERN).expect("stats line pattern compiles"))
}

/// Why a line produced no samples.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineRejection {
    #[error("line does not match the stats pattern")]
    NoMatch,
    #[error("metric {0} is not in the catalog")]
    UnknownMetric(String),
    #[error("bad timestamp {0}")]
    BadTimestamp(String),
    #[error("bad numeric field {0}")]
    BadNumber(String),
}

/// Turns one stats line into its `(last, avg)` sample pair.
#[derive(Debug, Clone)]
pub struct Extractor {
    catalog: Catalog,
    zone: DisplayZone,
}

impl Extractor {
    pub fn new(catalog: Catalog, zone: DisplayZone) -> Self {
        Self { catalog, zone }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Both samples of a line, or `None` when the line is dropped.
    pub fn extract(&self, line: &str) -> Option<[Sample; 2]> {
        self.classify(line).ok()
    }

    pub fn classify(&self, line: &str) -> Result<[Sample; 2], LineRejection> {
        let caps = stats_line_regex()
            .captures(line)
            .ok_or(LineRejection::NoMatch)?;

        let raw_ts = &caps[1];
        let metric = &caps[2];
        let last = &caps[3];
        let avg = &caps[4];

        if !self.catalog.contains(metric) {
            return Err(LineRejection::UnknownMetric(metric.to_string()));
        }

        let ts = parse_log_timestamp(raw_ts).map_err(|e| {
            debug!(error = %e, "dropping stats line");
            LineRejection::BadTimestamp(raw_ts.to_string())
        })?;
        let time = self.zone.clock_label(ts);

        let last = parse_value(last)?;
        let avg = parse_value(avg)?;

        Ok([
            Sample {
                ts,
                time: time.clone(),
                metric: metric.to_string(),
                value: last,
            },
            Sample {
                ts,
                time,
                metric: avg_metric_name(metric),
                value: avg,
            },
        ])
    }
}

fn parse_value(raw: &str) -> Result<f64, LineRejection> {
    raw.parse::<f64>()
        .map_err(|_| LineRejection::BadNumber(raw.to_string()))
}
