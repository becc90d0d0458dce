use chrono_tz::Tz;
use std::path::PathBuf;

const DEFAULT_WORK_DIR: &str = "/var/lib/mesa";
const DEFAULT_DB_FILE: &str = "tables.redb";
const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Madrid;
const DEFAULT_FIXED_TABLE_COUNT: u32 = 10;
const DEFAULT_BUS_CHANNEL_CAPACITY: usize = 1024;

/// Server configuration
///
/// # Environment variables
///
/// Every key can be overridden from the environment (or a `.env` file):
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | WORK_DIR | /var/lib/mesa | Working directory (database, logs) |
/// | DB_FILE | tables.redb | Database file name inside WORK_DIR |
/// | TIMEZONE | Europe/Madrid | Business timezone (ticket day, daily stats) |
/// | FIXED_TABLE_COUNT | 10 | Fixed tables seeded as "Mesa 1..N" |
/// | BUS_CHANNEL_CAPACITY | 1024 | Realtime broadcast buffer |
/// | LOG_LEVEL | info | Log level |
/// | LOG_DIR | (unset) | Daily rolling log directory |
///
/// # Example
///
/// ```ignore
/// WORK_DIR=/data/mesa TIMEZONE=Atlantic/Canary cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory
    pub work_dir: String,
    /// Database file name, relative to `work_dir`
    pub db_file: String,
    /// Business timezone
    pub timezone: Tz,
    /// Number of fixed tables
    pub fixed_table_count: u32,
    /// Broadcast channel capacity
    pub bus_channel_capacity: usize,
    pub log_level: String,
    pub log_dir: Option<String>,
}

impl Config {
    /// Load configuration from the environment
    ///
    /// Unset or unparsable values fall back to their defaults.
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| DEFAULT_WORK_DIR.into()),
            db_file: std::env::var("DB_FILE").unwrap_or_else(|_| DEFAULT_DB_FILE.into()),
            timezone: std::env::var("TIMEZONE")
                .ok()
                .map(|tz| parse_timezone(&tz))
                .unwrap_or(DEFAULT_TIMEZONE),
            fixed_table_count: std::env::var("FIXED_TABLE_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_FIXED_TABLE_COUNT),
            bus_channel_capacity: std::env::var("BUS_CHANNEL_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_BUS_CHANNEL_CAPACITY),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.is_empty()),
        }
    }

    /// Override the working directory
    ///
    /// Mostly for tests
    pub fn with_overrides(work_dir: impl Into<String>) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config
    }

    /// Full path of the database file
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join(&self.db_file)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn parse_timezone(name: &str) -> Tz {
    name.parse().unwrap_or_else(|e| {
        tracing::warn!(
            "Invalid TIMEZONE '{}': {}, falling back to {}",
            name,
            e,
            DEFAULT_TIMEZONE
        );
        DEFAULT_TIMEZONE
    })
}
