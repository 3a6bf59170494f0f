use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Suffix of the synthetic companion metric carrying a line's `avg` field.
pub const AVG_SUFFIX: &str = "_avg";

/// One observed value for one metric at one point in time.
///
/// `time` is the `HH:MM:SS` rendering of `ts` in the display zone. The date
/// is dropped, so a log crossing midnight yields labels that go backwards;
/// `ts` keeps the full instant for anything that needs to disambiguate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sample {
    pub ts: DateTime<Utc>,
    pub time: String,
    pub metric: String,
    pub value: f64,
}

impl Sample {
    pub fn is_avg(&self) -> bool {
        self.metric.ends_with(AVG_SUFFIX)
    }
}

pub fn avg_metric_name(metric: &str) -> String {
    format!("{metric}{AVG_SUFFIX}")
}
