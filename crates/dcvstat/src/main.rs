mod output;
mod telemetry;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dcvstat_core::catalog::ChartPreset;
use dcvstat_core::config::Config;
use dcvstat_core::query::PositionalWindow;
use dcvstat_core::time::parse_duration_str;
use dcvstat_refresh::{RefreshConfig, RefreshGroup, Refresher};
use dcvstat_store::Store;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::output::{
    UpdateView, print_catalog_human, print_presets_human, print_status_human,
    print_update_human, print_window_human,
};
use crate::telemetry::init_cli_tracing;

#[derive(Parser, Debug)]
#[command(name = "dcvstat", version)]
#[command(about = "DCV server QUIC statistics from the server log")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true, help = "Path to the DCV server log file")]
    logfile: Option<PathBuf>,

    #[arg(long, global = true, help = "How many of the latest entries to show")]
    entries: Option<usize>,

    #[arg(
        long,
        global = true,
        help = "Auto-refresh interval in seconds or as a duration (e.g. 30s)"
    )]
    refresh: Option<String>,

    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Read the log once and print the latest window")]
    Snapshot {
        #[arg(long, value_delimiter = ',', help = "Metrics to align (default: whole catalog)")]
        metrics: Vec<String>,
    },
    #[command(about = "Keep re-reading the log; press Enter to refresh now")]
    Watch {
        #[arg(long, value_delimiter = ',')]
        metrics: Vec<String>,
        #[arg(long = "preset", help = "Chart preset to show (repeatable)")]
        presets: Vec<String>,
        #[arg(long, help = "Only refresh on demand")]
        no_auto: bool,
    },
    #[command(about = "Read the log once and print store status")]
    Status,
    #[command(about = "List recognized metrics")]
    Catalog,
    #[command(about = "List chart presets (* = shown by default)")]
    Presets,
}

/// How long exit waits for a reload still blocked on the log file.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start tokio runtime")?;
    let result = runtime.block_on(run(cli));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = load_config(&cli).context("load configuration")?;
    init_cli_tracing(cfg.verbose);
    tracing::debug!(log_file = %cfg.log_file.display(), entries = cfg.entries, "configuration loaded");

    match cli.command {
        Commands::Snapshot { metrics } => run_snapshot(&cfg, metrics, cli.json).await,
        Commands::Watch {
            metrics,
            presets,
            no_auto,
        } => {
            let groups = select_groups(metrics, &presets)?;
            run_watch(&cfg, groups, !no_auto, cli.json).await
        }
        Commands::Status => {
            let store = load_store(&cfg).await?;
            let status = store.status();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status_human(&status);
            }
            Ok(())
        }
        Commands::Catalog => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&cfg.metrics)?);
            } else {
                print_catalog_human(&cfg.metrics);
            }
            Ok(())
        }
        Commands::Presets => {
            let presets = ChartPreset::defaults();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&presets)?);
            } else {
                print_presets_human(&presets);
            }
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut cfg = Config::load()?;
    if let Some(v) = &cli.logfile {
        cfg.log_file = v.clone();
    }
    if let Some(v) = cli.entries {
        cfg.entries = v;
    }
    if let Some(v) = &cli.refresh {
        cfg.refresh_interval = parse_refresh(v)?;
    }
    if cli.verbose {
        cfg.verbose = true;
    }
    cfg.validate()?;
    Ok(cfg)
}

async fn load_store(cfg: &Config) -> anyhow::Result<Store> {
    let store = Store::open(&cfg.log_file, cfg.engine()?);
    let reload_store = store.clone();
    tokio::task::spawn_blocking(move || reload_store.reload())
        .await?
        .with_context(|| format!("could not read log file {}", cfg.log_file.display()))?;
    Ok(store)
}

async fn run_snapshot(cfg: &Config, metrics: Vec<String>, json: bool) -> anyhow::Result<()> {
    let store = load_store(cfg).await?;
    let window = if metrics.is_empty() {
        store.latest_snapshot(cfg.entries)
    } else {
        store.window_many(metrics.as_slice(), cfg.entries)
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&window)?);
    } else {
        print_window_human(
            &format!("Latest QUIC Stats (Last {} entries)", cfg.entries),
            &window,
        );
    }
    warn_if_desynchronized(&window);
    Ok(())
}

async fn run_watch(
    cfg: &Config,
    groups: Vec<RefreshGroup>,
    auto: bool,
    json: bool,
) -> anyhow::Result<()> {
    let store = Store::open(&cfg.log_file, cfg.engine()?);
    let handle = Refresher::spawn(
        store,
        RefreshConfig {
            interval: auto.then_some(cfg.refresh_interval),
            window_size: cfg.entries,
            groups,
            refresh_on_start: true,
        },
    );

    eprintln!("dcvstat watch");
    eprintln!("  log: {}", cfg.log_file.display());
    eprintln!("  entries: {}", cfg.entries);
    if auto {
        eprintln!(
            "  refresh: every {}s",
            cfg.refresh_interval.as_secs_f64()
        );
    } else {
        eprintln!("  refresh: manual");
    }
    eprintln!("  tip: press Enter to refresh now, Ctrl-C to quit");

    let mut updates = handle.subscribe();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let Some(update) = updates.borrow_and_update().clone() else {
                    continue;
                };
                if json {
                    println!("{}", serde_json::to_string(&UpdateView::from(update.as_ref()))?);
                } else {
                    print_update_human(&update);
                }
            }
            line = stdin.next_line(), if stdin_open => {
                match line {
                    Ok(Some(_)) => {
                        handle.trigger();
                    }
                    Ok(None) => stdin_open = false,
                    Err(err) => {
                        tracing::warn!(error = ?err, "stdin closed");
                        stdin_open = false;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received ctrl-c, shutting down");
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

fn select_groups(metrics: Vec<String>, presets: &[String]) -> anyhow::Result<Vec<RefreshGroup>> {
    let mut groups = Vec::new();
    if !metrics.is_empty() {
        groups.push(RefreshGroup {
            name: metrics.join(","),
            metrics,
        });
    }

    let all = ChartPreset::defaults();
    for name in presets {
        let preset = all
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .with_context(|| format!("unknown preset: {name}"))?;
        groups.push(preset.clone().into());
    }

    if groups.is_empty() {
        groups = ChartPreset::enabled().into_iter().map(Into::into).collect();
    }
    Ok(groups)
}

fn parse_refresh(raw: &str) -> anyhow::Result<Duration> {
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    Ok(parse_duration_str(raw)?)
}

fn warn_if_desynchronized(window: &PositionalWindow) {
    let axis = window.timestamps.len();
    if let Some((metric, row)) = window
        .metrics
        .iter()
        .zip(&window.values)
        .find(|(_, row)| row.len() != axis)
    {
        tracing::debug!(
            metric = %metric,
            row_len = row.len(),
            axis_len = axis,
            "row length differs from time axis; columns are aligned by position only"
        );
    }
}
