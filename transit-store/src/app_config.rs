use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub kafka: Option<KafkaConfig>,
    pub auth: AuthConfig,
    #[serde(default)]
    pub booking_rules: BookingRules,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

/// Without a url the in-memory repositories are used.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingRules {
    #[serde(default = "default_max_advance_days")]
    pub max_advance_days: i64,
}

fn default_max_advance_days() -> i64 {
    365
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            max_advance_days: default_max_advance_days(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ForecastConfig {
    /// Remote estimator base url. The in-process estimator is used when unset.
    pub service_url: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    pub history_csv: Option<PathBuf>,
    pub seed: Option<u64>,
    #[serde(default = "default_breaker_failure_threshold")]
    pub breaker_failure_threshold: usize,
    #[serde(default = "default_breaker_reset_seconds")]
    pub breaker_reset_seconds: u64,
    /// Shared secret for `/forecast-service/*`, sent by remote callers as `x-internal-token`.
    pub internal_token: Option<String>,
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_breaker_failure_threshold() -> usize {
    3
}

fn default_breaker_reset_seconds() -> u64 {
    30
}

impl ForecastConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn breaker_reset(&self) -> Duration {
        Duration::from_secs(self.breaker_reset_seconds)
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            service_url: None,
            timeout_ms: default_timeout_ms(),
            history_csv: None,
            seed: None,
            breaker_failure_threshold: default_breaker_failure_threshold(),
            breaker_reset_seconds: default_breaker_reset_seconds(),
            internal_token: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_window")]
    pub requests_per_window: i64,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: i64,
}

fn default_requests_per_window() -> i64 {
    100
}

fn default_window_seconds() -> i64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: default_requests_per_window(),
            window_seconds: default_window_seconds(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Developer overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `TRANSIT_AUTH__JWT_SECRET=...`
            .add_source(config::Environment::with_prefix("TRANSIT").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Parses a TOML document directly; used by tests and tooling.
    pub fn from_toml(toml: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
