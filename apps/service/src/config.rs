use std::time::Duration;
use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::database::PERSISTED_HISTORY_LIMIT;
use crate::monitoring::batch::{DEFAULT_BATCH_PAUSE, DEFAULT_BATCH_WIDTH};
use crate::monitoring::cache::DEFAULT_CACHE_TTL;
use crate::monitoring::checker::DEFAULT_PROBE_TIMEOUT;
use crate::monitoring::entropy::{Entropy, SeededEntropy, ThreadEntropy};
use crate::monitoring::executor::{DEFAULT_SWEEP_CHANCE, FallbackPolicy};
use crate::monitoring::scheduler::{DEFAULT_CYCLE_CONCURRENCY, DEFAULT_CYCLE_INTERVAL};
use crate::registry::{DEFAULT_BULK_LIMIT, MAX_HISTORY_ENTRIES};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: std::io::Error },

    #[error("failed to write config {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: std::io::Error },

    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),

    #[error("no config directory available (set XDG_CONFIG_HOME or HOME)")]
    ConfigPathUnavailable,

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitoring: Monitoring,
    pub server: Server,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Monitoring {
    /// Seconds between scheduler cycles
    pub interval_seconds: u64,
    pub batch_width: usize,
    pub batch_pause_ms: u64,
    pub cycle_concurrency: usize,
    pub probe_timeout_seconds: u64,
    pub cache_ttl_seconds: u64,
    pub cache_sweep_chance: f64,
    pub history_limit: usize,
    pub persisted_history_limit: usize,
    pub bulk_limit: usize,
    pub fallback_policy: FallbackPolicy,
    /// Fixes the simulated-variance draws so runs are repeatable
    pub random_seed: Option<u64>,
    pub snapshot_path: Option<path::PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    pub bind: String,
    pub port: u16,
}

impl Default for Monitoring {
    fn default() -> Self {
        Self {
            interval_seconds: DEFAULT_CYCLE_INTERVAL.as_secs(),
            batch_width: DEFAULT_BATCH_WIDTH,
            batch_pause_ms: DEFAULT_BATCH_PAUSE.as_millis() as u64,
            cycle_concurrency: DEFAULT_CYCLE_CONCURRENCY,
            probe_timeout_seconds: DEFAULT_PROBE_TIMEOUT.as_secs(),
            cache_ttl_seconds: DEFAULT_CACHE_TTL.as_secs(),
            cache_sweep_chance: DEFAULT_SWEEP_CHANCE,
            history_limit: MAX_HISTORY_ENTRIES,
            persisted_history_limit: PERSISTED_HISTORY_LIMIT,
            bulk_limit: DEFAULT_BULK_LIMIT,
            fallback_policy: FallbackPolicy::Simulate,
            random_seed: None,
            snapshot_path: None,
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Self { bind: "0.0.0.0".into(), port: 8080 }
    }
}

impl Monitoring {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn entropy(&self) -> Arc<dyn Entropy> {
        match self.random_seed {
            Some(seed) => Arc::new(SeededEntropy::new(seed)),
            None => Arc::new(ThreadEntropy),
        }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().is_none_or(|ext| ext != "toml") {
        path.set_extension("toml");
    }
    path
}

/// $XDG_CONFIG_HOME/uptrack/config.toml, falling back to $HOME/.config
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let base = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(base.join("uptrack/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let m = &self.monitoring;

        writeln!(f, "Effective configuration:")?;
        write_title_1(f, "Monitoring")?;
        write_1(f, "Cycle Interval (s)", &m.interval_seconds)?;
        write_1(f, "Batch Width", &m.batch_width)?;
        write_1(f, "Batch Pause (ms)", &m.batch_pause_ms)?;
        write_1(f, "Cycle Concurrency", &m.cycle_concurrency)?;
        write_1(f, "Probe Timeout (s)", &m.probe_timeout_seconds)?;
        write_1(f, "Cache TTL (s)", &m.cache_ttl_seconds)?;
        write_1(f, "Cache Sweep Chance", &m.cache_sweep_chance)?;
        write_1(f, "History Limit", &m.history_limit)?;
        write_1(f, "Persisted History Limit", &m.persisted_history_limit)?;
        write_1(f, "Bulk Limit", &m.bulk_limit)?;
        write_1(f, "Fallback Policy", &format!("{:?}", m.fallback_policy))?;
        match m.random_seed {
            Some(seed) => write_1(f, "Random Seed", &seed)?,
            None => write_1(f, "Random Seed", &"os")?,
        }
        match &m.snapshot_path {
            Some(path) => write_1(f, "Snapshot", &path.display())?,
            None => write_1(f, "Snapshot", &"disabled")?,
        }
        write_title_1(f, "Server")?;
        write_1(f, "Bind Address", &self.server.bind)?;
        write_1(f, "Port", &self.server.port)?;

        Ok(())
    }
}

impl Config {
    /// Load config from `optional_path` or the default location.
    ///
    /// A missing file is created with defaults.
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path = match optional_path {
            Some(path) => normalize_toml_path(path.as_ref()),
            None => default_config_path()?,
        };

        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;
            let config: Self = toml::from_str(&raw)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let body = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::WriteFailed { path: parent.to_path_buf(), source })?;
        }

        fs::write(path, body).map_err(|source| ConfigError::WriteFailed { path: path.to_path_buf(), source })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.monitoring;
        let positive = [
            ("interval_seconds", m.interval_seconds),
            ("batch_width", m.batch_width as u64),
            ("cycle_concurrency", m.cycle_concurrency as u64),
            ("probe_timeout_seconds", m.probe_timeout_seconds),
            ("cache_ttl_seconds", m.cache_ttl_seconds),
            ("history_limit", m.history_limit as u64),
            ("bulk_limit", m.bulk_limit as u64),
        ];

        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("monitoring.{name} must be greater than zero")));
        }

        if !(0.0..=1.0).contains(&m.cache_sweep_chance) {
            return Err(ConfigError::Invalid("monitoring.cache_sweep_chance must be within [0, 1]".into()));
        }

        Ok(())
    }
}
