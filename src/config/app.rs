//! Application configuration structures.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use url::Url;

use crate::scheduler::{DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_TICK, SchedulerOptions};
use crate::storage::{DEFAULT_BATCH_FLUSH_INTERVAL, DEFAULT_BATCH_SIZE, DEFAULT_CHANNEL_CAPACITY};

use super::seed::MonitorSeed;
use super::validation::{ConfigError, expand_env_vars};

// =============================================================================
// Constants
// =============================================================================

/// Default database directory.
pub const DEFAULT_DSN: &str = "data";

/// Default logical database name.
pub const DEFAULT_DATABASE_NAME: &str = "vigil";

/// sqlx URL of a private in-memory database.
pub const MEMORY_URL: &str = "sqlite::memory:";

/// Default InfluxDB request timeout.
pub const DEFAULT_INFLUX_TIMEOUT: Duration = Duration::from_secs(10);

fn default_dsn() -> String {
    DEFAULT_DSN.to_string()
}

fn default_database_name() -> String {
    DEFAULT_DATABASE_NAME.to_string()
}

fn default_tick() -> Duration {
    DEFAULT_TICK
}

fn default_shutdown_timeout() -> Duration {
    DEFAULT_SHUTDOWN_TIMEOUT
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_flush_interval() -> Duration {
    DEFAULT_BATCH_FLUSH_INTERVAL
}

fn default_influx_timeout() -> Duration {
    DEFAULT_INFLUX_TIMEOUT
}

// =============================================================================
// Database Configuration
// =============================================================================

/// Backend holding monitors and hosts.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DatabaseDriver {
    /// SQLite file under `dsn`.
    #[default]
    Sqlite,
    /// In-process store; nothing survives a restart.
    Memory,
}

/// Database configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub driver: DatabaseDriver,

    /// Directory holding the database file, or a full `sqlite:` URL.
    #[serde(default = "default_dsn")]
    pub dsn: String,

    /// Logical database name; the file is `<dsn>/<name>.db`.
    #[serde(default = "default_database_name")]
    pub name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            dsn: default_dsn(),
            name: default_database_name(),
        }
    }
}

impl DatabaseConfig {
    /// sqlx connection URL.
    ///
    /// A `dsn` that already is a `sqlite:` URL is used verbatim and `name` is
    /// ignored.
    pub fn url(&self) -> String {
        match self.driver {
            DatabaseDriver::Memory => MEMORY_URL.to_string(),
            DatabaseDriver::Sqlite if self.dsn.starts_with("sqlite:") => self.dsn.clone(),
            DatabaseDriver::Sqlite => {
                let file = Path::new(&self.dsn).join(format!("{}.db", self.name));
                format!("sqlite:{}", file.display())
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.driver == DatabaseDriver::Sqlite {
            if self.dsn.trim().is_empty() {
                return Err(ConfigError::invalid("database dsn must not be empty"));
            }
            if !self.dsn.starts_with("sqlite:") {
                let name = self.name.trim();
                if name.is_empty() || name.contains(['/', '\\']) {
                    return Err(ConfigError::invalid(format!(
                        "invalid database name: '{}'",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// Scheduler Configuration
// =============================================================================

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Scan period (default: 100ms).
    #[serde(default = "default_tick", with = "humantime_serde")]
    pub tick: Duration,

    /// Cap on concurrent executions; 0 is unbounded.
    #[serde(default)]
    pub max_concurrent: usize,

    /// How long shutdown waits for running checks (default: 5s).
    #[serde(default = "default_shutdown_timeout", with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            max_concurrent: 0,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl SchedulerConfig {
    pub fn options(&self) -> SchedulerOptions {
        SchedulerOptions {
            tick: self.tick,
            max_concurrent: (self.max_concurrent > 0).then_some(self.max_concurrent),
            shutdown_timeout: self.shutdown_timeout,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick.is_zero() {
            return Err(ConfigError::invalid("scheduler tick must be greater than zero"));
        }
        Ok(())
    }
}

// =============================================================================
// Sink Configuration
// =============================================================================

/// Destination of gathered points.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SinkDriver {
    /// Batching writer into the local `points` table.
    #[default]
    Sqlite,
    /// InfluxDB line protocol over HTTP.
    Influxdb,
}

/// InfluxDB endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluxConfig {
    /// Base URL (e.g., `http://localhost:8086`).
    pub url: String,

    /// Target database.
    pub database: String,

    #[serde(default)]
    pub username: Option<String>,

    /// Supports `${VAR:-default}` expansion.
    #[serde(default)]
    pub password: Option<String>,

    /// Request timeout (default: 10s).
    #[serde(default = "default_influx_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl InfluxConfig {
    /// Basic-auth credentials, if a username is set.
    pub fn credentials(&self) -> Option<(String, String)> {
        self.username
            .as_ref()
            .map(|user| (user.clone(), self.password.clone().unwrap_or_default()))
    }

    pub fn parsed_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.url).map_err(|e| {
            ConfigError::invalid(format!("invalid influxdb url '{}': {}", self.url, e))
        })
    }
}

/// Point sink configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkConfig {
    #[serde(default)]
    pub driver: SinkDriver,

    /// Queue capacity of the local writer, in batches (default: 10000).
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Buffered points that trigger a local write (default: 500).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Longest time points stay buffered locally (default: 1s).
    #[serde(default = "default_flush_interval", with = "humantime_serde")]
    pub flush_interval: Duration,

    /// Required when `driver` is `influxdb`.
    #[serde(default)]
    pub influxdb: Option<InfluxConfig>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            driver: SinkDriver::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_BATCH_FLUSH_INTERVAL,
            influxdb: None,
        }
    }
}

impl SinkConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_capacity == 0 {
            return Err(ConfigError::invalid("sink channel_capacity must be positive"));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("sink batch_size must be positive"));
        }
        if self.flush_interval.is_zero() {
            return Err(ConfigError::invalid("sink flush_interval must be greater than zero"));
        }

        if self.driver == SinkDriver::Influxdb {
            let influx = self.influxdb.as_ref().ok_or_else(|| {
                ConfigError::invalid("sink driver 'influxdb' requires an influxdb section")
            })?;
            influx.parsed_url()?;
            if influx.database.trim().is_empty() {
                return Err(ConfigError::invalid("influxdb database must not be empty"));
            }
            if influx.timeout.is_zero() {
                return Err(ConfigError::invalid("influxdb timeout must be greater than zero"));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub sink: SinkConfig,

    /// Monitors created at startup unless an identical one exists.
    #[serde(default)]
    pub monitors: Vec<MonitorSeed>,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse, expand environment references and validate.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(content)?;
        config.expand_env();
        config.validate()?;
        Ok(config)
    }

    /// Expand `${VAR}` references in endpoint and credential fields.
    fn expand_env(&mut self) {
        self.database.dsn = expand_env_vars(&self.database.dsn);
        if let Some(influx) = self.sink.influxdb.as_mut() {
            influx.url = expand_env_vars(&influx.url);
            influx.username = influx.username.as_deref().map(expand_env_vars);
            influx.password = influx.password.as_deref().map(expand_env_vars);
        }
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.scheduler.validate()?;
        self.sink.validate()?;

        for (i, seed) in self.monitors.iter().enumerate() {
            if seed.agent.trim().is_empty() {
                return Err(ConfigError::invalid(format!("monitors[{i}]: agent must not be empty")));
            }
            if seed.interval.is_zero() {
                return Err(ConfigError::invalid(format!(
                    "monitors[{i}]: interval must be greater than zero"
                )));
            }
        }
        Ok(())
    }

    /// sqlx URL of the local point table.
    ///
    /// Shares the monitor database when that is SQLite; otherwise points go
    /// to a private in-memory database.
    pub fn points_url(&self) -> String {
        match self.database.driver {
            DatabaseDriver::Sqlite => self.database.url(),
            DatabaseDriver::Memory => MEMORY_URL.to_string(),
        }
    }
}
