use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::{DcvstatError, Result};
use crate::time::DisplayZone;

pub const DEFAULT_ENTRIES: usize = 120;
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub log_file: PathBuf,
    pub entries: usize,
    pub refresh_interval: Duration,
    pub verbose: bool,
    pub metrics: Catalog,
    pub utc_offset: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
            entries: DEFAULT_ENTRIES,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            verbose: false,
            metrics: Catalog::default(),
            utc_offset: None,
        }
    }
}

/// Everything the series store needs, passed in at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub catalog: Catalog,
    pub window_size: usize,
    pub zone: DisplayZone,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            catalog: Catalog::default(),
            window_size: DEFAULT_ENTRIES,
            zone: DisplayZone::Local,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let config_path = config_file_path();
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides()?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        let env_overrides = load_env_overrides()?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.entries == 0 {
            return Err(DcvstatError::Config(
                "entries must be greater than zero".to_string(),
            ));
        }
        if self.refresh_interval.is_zero() {
            return Err(DcvstatError::Config(
                "refresh_interval must be greater than zero".to_string(),
            ));
        }
        self.zone()?;
        Ok(())
    }

    pub fn zone(&self) -> Result<DisplayZone> {
        match &self.utc_offset {
            Some(v) => v.parse().map_err(|e| {
                DcvstatError::Config(format!("bad utc_offset: {e} (value={v})"))
            }),
            None => Ok(DisplayZone::Local),
        }
    }

    pub fn engine(&self) -> Result<EngineConfig> {
        Ok(EngineConfig {
            catalog: self.metrics.clone(),
            window_size: self.entries,
            zone: self.zone()?,
        })
    }
}

fn default_log_file() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\ProgramData\NICE\dcv\log\server.log")
    } else {
        PathBuf::from("/var/log/dcv/server.log")
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    log_file: Option<PathBuf>,
    entries: Option<usize>,
    refresh_interval: Option<String>,
    verbose: Option<bool>,
    metrics: Option<Vec<String>>,
    utc_offset: Option<String>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("DCVSTAT_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("dcvstat/config.toml")
}

fn load_file_overrides(path: &Path) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| DcvstatError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| DcvstatError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn load_env_overrides() -> Result<ConfigOverrides> {
    let entries = match env::var("DCVSTAT_ENTRIES") {
        Ok(v) => Some(v.parse::<usize>().map_err(|e| {
            DcvstatError::Config(format!("bad DCVSTAT_ENTRIES in environment: {e}"))
        })?),
        Err(_) => None,
    };

    let verbose = env::var("DCVSTAT_VERBOSE")
        .ok()
        .map(|v| parse_flag(&v))
        .transpose()?;

    Ok(ConfigOverrides {
        log_file: env::var("DCVSTAT_LOG_FILE").ok().map(PathBuf::from),
        entries,
        refresh_interval: env::var("DCVSTAT_REFRESH_INTERVAL").ok(),
        verbose,
        metrics: None,
        utc_offset: env::var("DCVSTAT_UTC_OFFSET").ok(),
    })
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(DcvstatError::Config(format!(
            "bad DCVSTAT_VERBOSE in environment: {other}"
        ))),
    }
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.log_file {
        cfg.log_file = v;
    }
    if let Some(v) = overrides.entries {
        cfg.entries = v;
    }
    if let Some(v) = overrides.refresh_interval {
        cfg.refresh_interval = humantime::parse_duration(&v).map_err(|e| {
            DcvstatError::Config(format!("bad refresh_interval in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.verbose {
        cfg.verbose = v;
    }
    if let Some(v) = overrides.metrics {
        cfg.metrics = Catalog::new(v)
            .map_err(|e| DcvstatError::Config(format!("bad metrics in {source}: {e}")))?;
    }
    if let Some(v) = overrides.utc_offset {
        cfg.utc_offset = Some(v);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn default_matches_dcv_server_layout() {
        let cfg = Config::default();
        assert_eq!(cfg.entries, 120);
        assert_eq!(cfg.refresh_interval, Duration::from_secs(30));
        assert!(!cfg.verbose);
        assert_eq!(cfg.metrics.len(), 29);
        if !cfg!(windows) {
            assert_eq!(cfg.log_file, PathBuf::from("/var/log/dcv/server.log"));
        }
    }

    #[test]
    fn engine_carries_window_and_catalog() {
        let cfg = Config {
            entries: 5,
            utc_offset: Some("+01:00".to_string()),
            ..Config::default()
        };
        let engine = cfg.engine().unwrap();
        assert_eq!(engine.window_size, 5);
        assert_eq!(engine.catalog, Catalog::default());
        assert_eq!(engine.zone, "+01:00".parse::<DisplayZone>().unwrap());
    }

    #[test]
    fn validate_rejects_zero_window_and_interval() {
        let cfg = Config {
            entries: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            refresh_interval: Duration::ZERO,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            utc_offset: Some("later".to_string()),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn apply_file_overrides_updates_fields() {
        let mut cfg = Config::default();
        let file: ConfigOverrides = toml::from_str(
            r#"
log_file = "/tmp/server.log"
entries = 10
refresh_interval = "5s"
verbose = true
metrics = ["quic_rtt_nanos", "quic_cwnd_size"]
utc_offset = "-03:00"
"#,
        )
        .unwrap();

        apply_overrides(&mut cfg, file, "config file").unwrap();

        assert_eq!(cfg.log_file, PathBuf::from("/tmp/server.log"));
        assert_eq!(cfg.entries, 10);
        assert_eq!(cfg.refresh_interval, Duration::from_secs(5));
        assert!(cfg.verbose);
        assert_eq!(
            cfg.metrics.as_slice(),
            ["quic_rtt_nanos".to_string(), "quic_cwnd_size".to_string()]
        );
        assert_eq!(cfg.utc_offset.as_deref(), Some("-03:00"));
    }

    #[test]
    fn apply_overrides_rejects_bad_values() {
        let mut cfg = Config::default();
        let bad_interval = ConfigOverrides {
            refresh_interval: Some("whenever".to_string()),
            ..ConfigOverrides::default()
        };
        assert!(apply_overrides(&mut cfg, bad_interval, "config file").is_err());

        let dup_metrics = ConfigOverrides {
            metrics: Some(vec!["a".to_string(), "a".to_string()]),
            ..ConfigOverrides::default()
        };
        assert!(apply_overrides(&mut cfg, dup_metrics, "config file").is_err());
    }

    #[test]
    fn parse_flag_variants() {
        assert!(parse_flag("yes").unwrap());
        assert!(!parse_flag("off").unwrap());
        assert!(parse_flag("maybe").is_err());
    }

    #[test]
    #[serial]
    fn load_reads_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "entries = 7\nrefresh_interval = \"10s\"\n").unwrap();

        // SAFETY: serialized with the other environment-mutating tests.
        unsafe {
            env::set_var("DCVSTAT_CONFIG", &path);
            env::set_var("DCVSTAT_ENTRIES", "9");
            env::remove_var("DCVSTAT_REFRESH_INTERVAL");
        }

        let cfg = Config::load();

        unsafe {
            env::remove_var("DCVSTAT_CONFIG");
            env::remove_var("DCVSTAT_ENTRIES");
        }

        let cfg = cfg.unwrap();
        assert_eq!(cfg.entries, 9);
        assert_eq!(cfg.refresh_interval, Duration::from_secs(10));
    }

    #[test]
    #[serial]
    fn from_env_rejects_bad_entries() {
        unsafe {
            env::set_var("DCVSTAT_ENTRIES", "lots");
        }
        let res = Config::from_env();
        unsafe {
            env::remove_var("DCVSTAT_ENTRIES");
        }
        assert!(res.is_err());
    }
}
