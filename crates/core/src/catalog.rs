use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{DcvstatError, Result};

/// Metric identifiers reported in the DCV server's QUIC transport stats
/// blocks, in display order.
pub const DEFAULT_METRICS: &[&str] = &[
    "active_streams",
    "stream_sent",
    "stream_recv",
    "dgram_sent",
    "dgram_recv",
    "sent_total_dgrams",
    "recv_total_dgrams",
    "recv_used_dgrams",
    "recv_lost_dgrams",
    "recv_malformed_dgrams",
    "recv_duplicate_dgrams",
    "recv_redundant_dgrams",
    "recv_late_dgrams",
    "recv_dgram_messages_lost",
    "recv_dgram_messages_incomplete",
    "recv_dgram_messages_timegraced",
    "recv_dgram_messages_complete",
    "recv_dgram_messages_inflight",
    "recv_dgram_messages_ready",
    "quic_sent_packets",
    "quic_sent_packets_avg",
    "quic_recv_packets",
    "quic_recv_packets_avg",
    "quic_lost_packets",
    "quic_lost_packets_avg",
    "quic_rtt_nanos",
    "quic_cwnd_size",
    "quic_delivery_rate",
    "intermediates_rtt_nanos",
];

/// Ordered allow-list of recognized metric identifiers.
///
/// Order is significant: it is the iteration order of full-catalog
/// snapshots. Membership checks go through a hash set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Catalog {
    ordered: Vec<String>,
    #[serde(skip)]
    index: HashSet<String>,
}

impl Catalog {
    pub fn new<I, S>(metrics: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ordered = metrics.into_iter().map(Into::into).collect::<Vec<_>>();
        if ordered.is_empty() {
            return Err(DcvstatError::Config(
                "metric catalog cannot be empty".to_string(),
            ));
        }

        let mut index = HashSet::with_capacity(ordered.len());
        for metric in &ordered {
            if metric.trim().is_empty() {
                return Err(DcvstatError::Config(
                    "metric catalog contains an empty name".to_string(),
                ));
            }
            if !index.insert(metric.clone()) {
                return Err(DcvstatError::Config(format!(
                    "metric catalog lists {metric} more than once"
                )));
            }
        }

        Ok(Self { ordered, index })
    }

    pub fn contains(&self, metric: &str) -> bool {
        self.index.contains(metric)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ordered.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            ordered: DEFAULT_METRICS.iter().map(|m| m.to_string()).collect(),
            index: DEFAULT_METRICS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl PartialEq for Catalog {
    fn eq(&self, other: &Self) -> bool {
        self.ordered == other.ordered
    }
}

impl TryFrom<Vec<String>> for Catalog {
    type Error = DcvstatError;

    fn try_from(value: Vec<String>) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Catalog> for Vec<String> {
    fn from(value: Catalog) -> Self {
        value.ordered
    }
}

/// A named group of metrics charted together.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartPreset {
    pub name: String,
    pub metrics: Vec<String>,
    pub enabled_by_default: bool,
}

impl ChartPreset {
    fn new(name: &str, metrics: &[&str], enabled_by_default: bool) -> Self {
        Self {
            name: name.to_string(),
            metrics: metrics.iter().map(|m| m.to_string()).collect(),
            enabled_by_default,
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(
                "QUICLostPktsGraph",
                &["quic_lost_packets", "quic_lost_packets_avg"],
                true,
            ),
            Self::new(
                "QUICSentRecvPktsGraph",
                &["quic_sent_packets_avg", "quic_recv_packets_avg"],
                true,
            ),
            Self::new(
                "QUICRttNanos",
                &["quic_rtt_nanos", "quic_rtt_nanos_avg"],
                true,
            ),
            Self::new(
                "QUICCwndSize",
                &["quic_cwnd_size", "quic_cwnd_size_avg"],
                true,
            ),
            Self::new(
                "QUICDeliveryRate",
                &["quic_delivery_rate", "quic_delivery_rate_avg"],
                false,
            ),
            Self::new(
                "DGrams",
                &["dgram_sent", "dgram_sent_avg", "dgram_recv", "dgram_recv_avg"],
                false,
            ),
            Self::new(
                "StreamsGraph",
                &["active_streams", "stream_sent", "stream_recv"],
                false,
            ),
            Self::new("ActiveStreamsGraph", &["active_streams"], false),
        ]
    }

    pub fn enabled() -> Vec<Self> {
        Self::defaults()
            .into_iter()
            .filter(|p| p.enabled_by_default)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_keeps_order() {
        let catalog = Catalog::default();
        assert_eq!(catalog.len(), 29);
        assert_eq!(catalog.iter().next(), Some("active_streams"));
        assert_eq!(catalog.iter().last(), Some("intermediates_rtt_nanos"));
        assert!(catalog.contains("quic_lost_packets"));
        assert!(!catalog.contains("quic_bogus"));
    }

    #[test]
    fn rejects_empty_and_duplicates() {
        assert!(Catalog::new(Vec::<String>::new()).is_err());
        assert!(Catalog::new(["a", "b", "a"]).is_err());
        assert!(Catalog::new(["a", " "]).is_err());
    }

    #[test]
    fn deserializes_from_list() {
        let catalog: Catalog = serde_json::from_str(r#"["b","a"]"#).unwrap();
        assert_eq!(catalog.as_slice(), ["b".to_string(), "a".to_string()]);
        assert!(catalog.contains("a"));
        assert!(serde_json::from_str::<Catalog>(r#"["a","a"]"#).is_err());
    }

    #[test]
    fn enabled_presets_are_the_quic_graphs() {
        let names = ChartPreset::enabled()
            .into_iter()
            .map(|p| p.name)
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            [
                "QUICLostPktsGraph",
                "QUICSentRecvPktsGraph",
                "QUICRttNanos",
                "QUICCwndSize"
            ]
        );
    }
}
