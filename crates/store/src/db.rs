use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use dcvstat_core::config::EngineConfig;
use dcvstat_core::model::Sample;
use dcvstat_core::query::{EngineState, ScanStats, StatusResponse};

use crate::extract::Extractor;

/// Samples of one full scan of the log, grouped by metric in line order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub(crate) series: HashMap<String, Vec<Sample>>,
    pub(crate) stats: ScanStats,
}

impl Snapshot {
    pub(crate) fn from_samples(samples: Vec<Sample>, stats: ScanStats) -> Self {
        let mut series: HashMap<String, Vec<Sample>> = HashMap::new();
        for sample in samples {
            series.entry(sample.metric.clone()).or_default().push(sample);
        }
        Self { series, stats }
    }

    pub fn samples_for(&self, metric: &str) -> &[Sample] {
        self.series.get(metric).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    pub fn samples_count(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }

    pub fn metrics_count(&self) -> usize {
        self.series.len()
    }

    fn ts_bounds(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        let all = self.series.values().flatten().map(|s| s.ts);
        let oldest = all.clone().min();
        let newest = all.max();
        (oldest, newest)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Published {
    pub(crate) snapshot: Arc<Snapshot>,
    pub(crate) loaded_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Slot {
    published: Option<Published>,
    /// Bumped by [`Store::discard_in_flight`]; a reload only publishes if
    /// this is unchanged since it started.
    fence: u64,
}

/// In-memory series store for one log file.
///
/// Starts empty. Every successful reload publishes a fresh [`Snapshot`] by
/// swapping a single `Arc`, so readers see either the previous or the new
/// snapshot in full. A failed reload publishes nothing.
#[derive(Clone)]
pub struct Store {
    source: PathBuf,
    extractor: Arc<Extractor>,
    window_size: usize,
    current: Arc<RwLock<Slot>>,
}

impl Store {
    pub fn open(path: &Path, engine: EngineConfig) -> Self {
        Self {
            source: path.to_path_buf(),
            extractor: Arc::new(Extractor::new(engine.catalog, engine.zone)),
            window_size: engine.window_size,
            current: Arc::new(RwLock::new(Slot::default())),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub fn state(&self) -> EngineState {
        if self.published().is_some() {
            EngineState::Loaded
        } else {
            EngineState::Empty
        }
    }

    /// The current snapshot; empty until the first successful reload.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.published()
            .map(|p| p.snapshot)
            .unwrap_or_default()
    }

    pub fn samples_for(&self, metric: &str) -> Vec<Sample> {
        self.snapshot().samples_for(metric).to_vec()
    }

    pub fn stats(&self) -> ScanStats {
        self.snapshot().stats()
    }

    pub fn status(&self) -> StatusResponse {
        let published = self.published();
        let state = if published.is_some() {
            EngineState::Loaded
        } else {
            EngineState::Empty
        };
        let loaded_at = published.as_ref().map(|p| p.loaded_at);
        let snapshot = published.map(|p| p.snapshot).unwrap_or_default();
        let (oldest_ts, newest_ts) = snapshot.ts_bounds();

        StatusResponse {
            source: self.source.display().to_string(),
            state,
            samples_count: snapshot.samples_count(),
            metrics_count: snapshot.metrics_count(),
            stats: snapshot.stats(),
            oldest_ts,
            newest_ts,
            loaded_at,
        }
    }

    /// Makes every reload already in progress finish without publishing.
    ///
    /// Once this returns no such reload can change what readers see; reloads
    /// started afterwards publish as usual.
    pub fn discard_in_flight(&self) {
        let mut slot = self.current.write().expect("store lock poisoned");
        slot.fence += 1;
    }

    pub(crate) fn published(&self) -> Option<Published> {
        self.current
            .read()
            .expect("store lock poisoned")
            .published
            .clone()
    }

    pub(crate) fn fence(&self) -> u64 {
        self.current.read().expect("store lock poisoned").fence
    }

    /// Swaps in `snapshot` unless [`Store::discard_in_flight`] ran since
    /// `fence` was read. Returns whether it was published.
    pub(crate) fn publish(&self, snapshot: Snapshot, fence: u64) -> bool {
        let mut slot = self.current.write().expect("store lock poisoned");
        if slot.fence != fence {
            return false;
        }
        slot.published = Some(Published {
            snapshot: Arc::new(snapshot),
            loaded_at: Utc::now(),
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample(metric: &str, secs: u32, value: f64) -> Sample {
        Sample {
            ts: Utc.with_ymd_and_hms(2025, 9, 26, 10, 0, secs).unwrap(),
            time: format!("10:00:{secs:02}"),
            metric: metric.to_string(),
            value,
        }
    }

    #[test]
    fn new_store_is_empty() {
        let store = Store::open(Path::new("/nonexistent"), EngineConfig::default());
        assert_eq!(store.state(), EngineState::Empty);
        assert!(store.samples_for("quic_lost_packets").is_empty());
        let status = store.status();
        assert_eq!(status.samples_count, 0);
        assert!(status.loaded_at.is_none());
    }

    #[test]
    fn snapshot_groups_by_metric_in_order() {
        let snap = Snapshot::from_samples(
            vec![
                sample("a", 1, 1.0),
                sample("b", 1, 10.0),
                sample("a", 2, 2.0),
                sample("a", 3, 3.0),
            ],
            ScanStats::default(),
        );
        let values = snap
            .samples_for("a")
            .iter()
            .map(|s| s.value)
            .collect::<Vec<_>>();
        assert_eq!(values, [1.0, 2.0, 3.0]);
        assert!(snap.samples_for("missing").is_empty());
        assert_eq!(snap.samples_count(), 4);
        assert_eq!(snap.metrics_count(), 2);
    }

    #[test]
    fn publish_replaces_whole_snapshot() {
        let store = Store::open(Path::new("/nonexistent"), EngineConfig::default());
        assert!(store.publish(
            Snapshot::from_samples(vec![sample("a", 1, 1.0)], ScanStats::default()),
            store.fence(),
        ));
        let before = store.snapshot();

        assert!(store.publish(
            Snapshot::from_samples(vec![sample("b", 2, 2.0)], ScanStats::default()),
            store.fence(),
        ));

        assert_eq!(store.state(), EngineState::Loaded);
        assert!(store.samples_for("a").is_empty());
        assert_eq!(store.samples_for("b").len(), 1);
        assert_eq!(before.samples_for("a").len(), 1);

        let status = store.status();
        assert_eq!(status.oldest_ts, status.newest_ts);
        assert!(status.loaded_at.is_some());
    }

    #[test]
    fn discarded_publish_leaves_store_untouched() {
        let store = Store::open(Path::new("/nonexistent"), EngineConfig::default());
        let started = store.fence();
        store.discard_in_flight();

        assert!(!store.publish(
            Snapshot::from_samples(vec![sample("a", 1, 1.0)], ScanStats::default()),
            started,
        ));
        assert_eq!(store.state(), EngineState::Empty);

        assert!(store.publish(
            Snapshot::from_samples(vec![sample("a", 1, 1.0)], ScanStats::default()),
            store.fence(),
        ));
        assert_eq!(store.state(), EngineState::Loaded);
    }
}
