use std::io::IsTerminal;

use chrono::{Local, SecondsFormat};
use dcvstat_core::catalog::{Catalog, ChartPreset};
use dcvstat_core::query::{EngineState, PositionalWindow, StatusResponse};
use dcvstat_refresh::{RefreshTrigger, RefreshUpdate};
use owo_colors::OwoColorize;
use serde::Serialize;

pub fn print_window_human(title: &str, window: &PositionalWindow) {
    println!("=== {title} ===");
    println!("timestamps: {}", format_labels(&window.timestamps));
    for (metric, row) in window.metrics.iter().zip(&window.values) {
        println!("{} {}", paint(&format!("{metric:<25}"), Paint::Metric), format_values(row));
    }
    if window.is_empty() {
        println!("(no samples)");
    }
}

pub fn print_update_human(update: &RefreshUpdate) {
    let at = update
        .finished_at
        .with_timezone(&Local)
        .format("%H:%M:%S");
    let status = match &update.result {
        Ok(stats) => format!(
            "{} lines={} matched={} malformed={}",
            paint("OK", Paint::Ok),
            stats.lines,
            stats.matched,
            stats.malformed()
        ),
        Err(err) => format!("{} {err} (showing last good data)", paint("FAILED", Paint::Failed)),
    };
    println!(
        "-- refresh #{} {} at {at}: {status} --",
        update.seq,
        trigger_label(update.trigger)
    );
    for group in &update.groups {
        print_window_human(&group.name, &group.window);
    }
}

pub fn print_status_human(v: &StatusResponse) {
    let state = match v.state {
        EngineState::Empty => "empty",
        EngineState::Loaded => "loaded",
    };
    println!("source: {}", v.source);
    println!("state: {state}");
    println!("samples: {} across {} metrics", v.samples_count, v.metrics_count);
    println!(
        "lines: {} matched={} no_match={} unknown_metric={} bad_timestamp={} bad_number={}",
        v.stats.lines,
        v.stats.matched,
        v.stats.no_match,
        v.stats.unknown_metric,
        v.stats.bad_timestamp,
        v.stats.bad_number
    );
    if let (Some(oldest), Some(newest)) = (v.oldest_ts, v.newest_ts) {
        println!(
            "span: {} .. {}",
            oldest.to_rfc3339_opts(SecondsFormat::Secs, true),
            newest.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
    }
}

pub fn print_catalog_human(catalog: &Catalog) {
    for metric in catalog.iter() {
        println!("{metric}");
    }
}

pub fn print_presets_human(presets: &[ChartPreset]) {
    for preset in presets {
        let marker = if preset.enabled_by_default { "*" } else { " " };
        println!(
            "{marker} {:<22} {}",
            preset.name,
            preset.metrics.join(", ")
        );
    }
}

#[derive(Debug, Serialize)]
pub struct GroupView<'a> {
    pub name: &'a str,
    #[serde(flatten)]
    pub window: &'a PositionalWindow,
}

#[derive(Debug, Serialize)]
pub struct UpdateView<'a> {
    pub seq: u64,
    pub trigger: &'static str,
    pub finished_at: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<dcvstat_core::query::ScanStats>,
    pub groups: Vec<GroupView<'a>>,
}

impl<'a> From<&'a RefreshUpdate> for UpdateView<'a> {
    fn from(update: &'a RefreshUpdate) -> Self {
        Self {
            seq: update.seq,
            trigger: trigger_label(update.trigger),
            finished_at: update.finished_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            ok: update.is_ok(),
            error: update.result.as_ref().err().map(String::as_str),
            stats: update.result.as_ref().ok().copied(),
            groups: update
                .groups
                .iter()
                .map(|g| GroupView {
                    name: &g.name,
                    window: &g.window,
                })
                .collect(),
        }
    }
}

#[derive(Clone, Copy)]
enum Paint {
    Metric,
    Ok,
    Failed,
}

/// Colors only when stdout is a terminal so piped output stays plain.
fn paint(text: &str, paint: Paint) -> String {
    if !std::io::stdout().is_terminal() {
        return text.to_string();
    }
    match paint {
        Paint::Metric => text.cyan().to_string(),
        Paint::Ok => text.green().to_string(),
        Paint::Failed => text.red().to_string(),
    }
}

fn trigger_label(trigger: RefreshTrigger) -> &'static str {
    match trigger {
        RefreshTrigger::Startup => "startup",
        RefreshTrigger::Manual => "manual",
        RefreshTrigger::Timer => "timer",
    }
}

fn format_labels(labels: &[String]) -> String {
    format!("[{}]", labels.join(" "))
}

fn format_values(values: &[f64]) -> String {
    let rendered = values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
    format!("[{}]", rendered.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_render_without_trailing_zeros() {
        assert_eq!(format_values(&[221.0, 0.5]), "[221 0.5]");
        assert_eq!(format_values(&[]), "[]");
    }

    #[test]
    fn group_view_flattens_window() {
        let window = PositionalWindow {
            metrics: vec!["active_streams".into()],
            values: vec![vec![3.0]],
            timestamps: vec!["10:00:00".into()],
        };
        let json = serde_json::to_value(GroupView {
            name: "StreamsGraph",
            window: &window,
        })
        .unwrap();
        assert_eq!(json["name"], "StreamsGraph");
        assert_eq!(json["values"][0][0], 3.0);
        assert_eq!(json["timestamps"][0], "10:00:00");
    }
}
