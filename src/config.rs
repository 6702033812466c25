//! Configuration module for vigil.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Database settings (driver, endpoint, logical database name)
//! - Scheduler settings (tick, concurrency cap, shutdown drain timeout)
//! - Point sink settings (local SQLite writer or InfluxDB)
//! - Seed monitors inserted at startup

mod app;
mod seed;
mod validation;

pub use app::{
    AppConfig, DatabaseConfig, DatabaseDriver, InfluxConfig, SchedulerConfig, SinkConfig,
    SinkDriver,
};
pub use seed::MonitorSeed;
pub use validation::{ConfigError, expand_env_vars, parse_duration};

// Re-export constants
pub use app::{DEFAULT_DATABASE_NAME, DEFAULT_DSN, DEFAULT_INFLUX_TIMEOUT, MEMORY_URL};
