use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};
use dcvstat_core::time::LOG_TIMESTAMP_FORMAT;

/// A DCV server QUIC stats line for `metric` at `ts` (`YYYY-MM-DD HH:MM:SS`).
pub fn stats_line(ts: &str, metric: &str, last: u64, avg: &str) -> String {
    format!(
        "{ts},895159 [  1139:1139  ] INFO  quictransport - Connection 3 - Stats (1): {metric}: [sum: {last}, last: {last}, max: {last}, avg: {avg}]"
    )
}

/// Builds a server log one line per second starting at `start`.
pub struct LogBuilder {
    next: NaiveDateTime,
    lines: Vec<String>,
}

impl LogBuilder {
    pub fn new(start: &str) -> Self {
        let next = NaiveDateTime::parse_from_str(start, LOG_TIMESTAMP_FORMAT)
            .expect("start uses the log timestamp layout");
        Self {
            next,
            lines: Vec::new(),
        }
    }

    pub fn stats(mut self, metric: &str, last: u64, avg: &str) -> Self {
        let ts = self.tick();
        self.lines.push(stats_line(&ts, metric, last, avg));
        self
    }

    pub fn noise(mut self, message: &str) -> Self {
        let ts = self.tick();
        self.lines
            .push(format!("{ts},000001 [  1139:1139  ] {message}"));
        self
    }

    pub fn build(self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }

    fn tick(&mut self) -> String {
        let ts = self.next.format(LOG_TIMESTAMP_FORMAT).to_string();
        self.next += Duration::seconds(1);
        ts
    }
}

pub fn write_log(dir: &Path, contents: &str) -> anyhow::Result<PathBuf> {
    let path = dir.join("server.log");
    fs::write(&path, contents)?;
    Ok(path)
}

pub fn append_log(path: &Path, contents: &str) -> anyhow::Result<()> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(contents.as_bytes())?;
    Ok(())
}
