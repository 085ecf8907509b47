//! Handles settings for the application. Configuration is read from
//! `settings.toml`, if present, and from `COINSHOP__`-prefixed environment
//! variables (`COINSHOP__SERVER__PORT=8080`).
//!
//! See `settings.toml` for the configuration.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use ledger::{LedgerConfig, RetryPolicy};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
    Postgres(String),
}

impl Database {
    pub fn url(&self) -> String {
        match self {
            Database::Memory => String::from("sqlite::memory:"),
            Database::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
            Database::Postgres(url) => url.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    pub database: Database,
}

/// Ledger tunables; every field falls back to the ledger default.
#[derive(Debug, Default, Deserialize)]
pub struct Ledger {
    pub starting_balance: Option<i64>,
    pub max_attempts: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
    pub operation_timeout_ms: Option<u64>,
}

impl From<&Ledger> for LedgerConfig {
    fn from(value: &Ledger) -> Self {
        let defaults = LedgerConfig::default();
        LedgerConfig {
            starting_balance: value.starting_balance.unwrap_or(defaults.starting_balance),
            retry: RetryPolicy::new(
                value.max_attempts.unwrap_or(defaults.retry.max_attempts),
                value
                    .retry_backoff_ms
                    .map_or(defaults.retry.backoff, Duration::from_millis),
            ),
            operation_timeout: value
                .operation_timeout_ms
                .map_or(defaults.operation_timeout, Duration::from_millis),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    pub server: Option<Server>,
    #[serde(default)]
    pub ledger: Ledger,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("settings").required(false))
            .add_source(
                Environment::with_prefix("COINSHOP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}
