use std::fs::File;
use std::io::{BufRead, BufReader};

use dcvstat_core::error::{DcvstatError, Result};
use dcvstat_core::query::ScanStats;
use tracing::{debug, instrument};

use crate::Store;
use crate::db::Snapshot;
use crate::extract::{Extractor, LineRejection};

impl Store {
    /// Re-reads the whole log file and publishes the result.
    ///
    /// The previous snapshot stays in place when the file cannot be opened
    /// or the read fails partway through.
    #[instrument(skip(self), fields(source = %self.source().display()))]
    pub fn reload(&self) -> Result<ScanStats> {
        let file = File::open(self.source()).map_err(|e| {
            DcvstatError::Io(format!(
                "failed to open {}: {e}",
                self.source().display()
            ))
        })?;
        self.reload_from(BufReader::new(file))
    }

    /// Same as [`Store::reload`] but scans an already open stream.
    ///
    /// Fails with [`DcvstatError::Discarded`] if
    /// [`Store::discard_in_flight`] ran while the scan was in progress.
    pub fn reload_from<R: BufRead>(&self, reader: R) -> Result<ScanStats> {
        let fence = self.fence();
        let snapshot = scan(reader, self.extractor())?;
        let stats = snapshot.stats();
        debug!(
            lines = stats.lines,
            matched = stats.matched,
            malformed = stats.malformed(),
            "log scan complete"
        );
        if !self.publish(snapshot, fence) {
            debug!("reload discarded before publish");
            return Err(DcvstatError::Discarded(format!(
                "reload of {} was abandoned",
                self.source().display()
            )));
        }
        Ok(stats)
    }
}

fn scan<R: BufRead>(mut reader: R, extractor: &Extractor) -> Result<Snapshot> {
    let mut samples = Vec::new();
    let mut stats = ScanStats::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf).map_err(|e| {
            DcvstatError::ScanIncomplete(format!("read failed after {} lines: {e}", stats.lines))
        })?;
        if read == 0 {
            break;
        }

        stats.lines += 1;
        let line = String::from_utf8_lossy(trim_line_end(&buf));
        match extractor.classify(&line) {
            Ok(pair) => {
                stats.matched += 1;
                samples.extend(pair);
            }
            Err(LineRejection::NoMatch) => stats.no_match += 1,
            Err(LineRejection::UnknownMetric(_)) => stats.unknown_metric += 1,
            Err(LineRejection::BadTimestamp(_)) => stats.bad_timestamp += 1,
            Err(LineRejection::BadNumber(_)) => stats.bad_number += 1,
        }
    }

    Ok(Snapshot::from_samples(samples, stats))
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
