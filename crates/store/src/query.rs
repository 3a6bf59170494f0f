use dcvstat_core::model::Sample;
use dcvstat_core::query::PositionalWindow;

use crate::Store;
use crate::db::Snapshot;

impl Store {
    /// The most recent `size` samples of `metric`, oldest first.
    pub fn window(&self, metric: &str, size: usize) -> Vec<Sample> {
        tail(self.snapshot().samples_for(metric), size).to_vec()
    }

    /// Windows each metric on its own and aligns the rows by position.
    ///
    /// Timestamps come from the first metric in `metrics` only. Metrics with
    /// nothing stored emit no row. See [`PositionalWindow`] for why rows of
    /// metrics logged at different rates do not line up.
    pub fn window_many<S: AsRef<str>>(&self, metrics: &[S], size: usize) -> PositionalWindow {
        window_many(&self.snapshot(), metrics, size)
    }

    /// Positional window over the whole catalog, in catalog order.
    ///
    /// The timestamp axis starts from the first catalog metric that has data
    /// and grows whenever a later metric has a longer window.
    pub fn latest_snapshot(&self, size: usize) -> PositionalWindow {
        let snapshot = self.snapshot();
        let mut out = PositionalWindow::default();

        for metric in self.extractor().catalog().iter() {
            let window = tail(snapshot.samples_for(metric), size);
            if window.is_empty() {
                continue;
            }
            if out.timestamps.len() < window.len() {
                let have = out.timestamps.len();
                out.timestamps
                    .extend(window[have..].iter().map(|s| s.time.clone()));
            }
            push_row(&mut out, metric, window);
        }

        out
    }
}

fn window_many<S: AsRef<str>>(snapshot: &Snapshot, metrics: &[S], size: usize) -> PositionalWindow {
    let mut out = PositionalWindow::default();
    for (i, metric) in metrics.iter().enumerate() {
        let metric = metric.as_ref();
        let window = tail(snapshot.samples_for(metric), size);
        if i == 0 {
            out.timestamps = window.iter().map(|s| s.time.clone()).collect();
        }
        if !window.is_empty() {
            push_row(&mut out, metric, window);
        }
    }
    out
}

fn push_row(out: &mut PositionalWindow, metric: &str, window: &[Sample]) {
    out.metrics.push(metric.to_string());
    out.values.push(window.iter().map(|s| s.value).collect());
}

fn tail(samples: &[Sample], size: usize) -> &[Sample] {
    &samples[samples.len().saturating_sub(size)..]
}
