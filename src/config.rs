//! Configuration management for the circulation desk

use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty" or "json"
    pub format: String,
}

/// Which backing store the engine talks to
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    Rest,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Base URL of the REST backend
    pub base_url: String,
    pub api_token: Option<String>,
    pub connect_timeout_ms: u64,
    /// Users created at startup by the in-memory backend
    pub seed_users: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CirculationConfig {
    /// Rate applied to fines assessed at return time
    pub fine_per_day: Decimal,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub dedup_window_ms: u64,
    pub max_read_attempts: u32,
    pub max_write_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub batch_timeout_ms: u64,
}

impl CoordinatorConfig {
    pub fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.dedup_window_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScannerConfig {
    pub max_attempts: u32,
    pub interval_ms: u64,
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub backend: BackendConfig,
    pub circulation: CirculationConfig,
    pub coordinator: CoordinatorConfig,
    pub scanner: ScannerConfig,
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default").required(false))
            // Layer on the environment-specific file
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add environment variables (e.g. CIRCULATION_SERVER__PORT=9000)
            .add_source(
                Environment::with_prefix("CIRCULATION")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("backend.base_url", env::var("BACKEND_URL").ok())?
            .set_override_option("backend.api_token", env::var("BACKEND_TOKEN").ok())?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Memory,
            base_url: "http://127.0.0.1:3000/api".to_string(),
            api_token: None,
            connect_timeout_ms: 5_000,
            seed_users: Vec::new(),
        }
    }
}

impl Default for CirculationConfig {
    fn default() -> Self {
        Self {
            fine_per_day: Decimal::from(5),
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            dedup_window_ms: 5_000,
            max_read_attempts: 3,
            max_write_attempts: 2,
            base_backoff_ms: 500,
            max_backoff_ms: 8_000,
            read_timeout_ms: 20_000,
            write_timeout_ms: 30_000,
            batch_timeout_ms: 40_000,
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            interval_ms: 500,
            timeout_ms: 10_000,
        }
    }
}
