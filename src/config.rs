use serde::Deserialize;
use std::time::Duration;

use crate::models::{CHARGE_UNIT, MAX_BALANCE};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub application: ApplicationSettings,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub storage: StorageSettings,
    pub database: DatabaseSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_log_format() -> String {
    "pretty".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub pool_size: u32,
}

impl DatabaseSettings {
    /// The connection URL with any `user:password@` part masked, for logging.
    pub fn redacted_url(&self) -> String {
        let Some(scheme_end) = self.url.find("://").map(|i| i + 3) else {
            return self.url.clone();
        };
        let rest = &self.url[scheme_end..];
        let authority_end = rest.find('/').unwrap_or(rest.len());
        match rest[..authority_end].rfind('@') {
            Some(at) => format!("{}***{}", &self.url[..scheme_end], &rest[at..]),
            None => self.url.clone(),
        }
    }
}

/// Limits and lock policy enforced by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub max_balance: i64,
    pub charge_unit: i64,
    /// Upper bound on waiting for an account lock. `None` waits indefinitely.
    pub lock_timeout_ms: Option<u64>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_balance: MAX_BALANCE,
            charge_unit: CHARGE_UNIT,
            lock_timeout_ms: None,
        }
    }
}

impl LedgerConfig {
    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Artificial delay for in-memory table access.
    pub simulated_latency_ms: u64,
}

impl StorageSettings {
    pub fn simulated_latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_ms)
    }
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        builder.build()?.try_deserialize()
    }
}
