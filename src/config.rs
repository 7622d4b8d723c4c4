use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;
use validator::Validate;

const CONFIG_DIR: &str = "config";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_PORT: u16 = 8080;
/// ITBIS percentage applied when an invoice includes tax.
const DEFAULT_TAX_RATE_PERCENT: u32 = 18;

/// Database pool settings.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}
fn default_min_connections() -> u32 {
    1
}
fn default_connect_timeout() -> u64 {
    30
}
fn default_acquire_timeout() -> u64 {
    8
}
fn default_idle_timeout() -> u64 {
    600
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            acquire_timeout_secs: default_acquire_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

/// Application configuration with validation.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Connection URL for the default tenant database
    pub database_url: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    #[validate(range(min = 1024, max = 65535))]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Tax percentage applied when an invoice includes tax
    #[serde(default = "default_tax_rate_percent")]
    #[validate(range(max = 100))]
    pub tax_rate_percent: u32,

    /// Database pool settings
    #[serde(default)]
    pub pool: PoolConfig,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_environment() -> String {
    "development".to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_tax_rate_percent() -> u32 {
    DEFAULT_TAX_RATE_PERCENT
}

impl AppConfig {
    /// Tax rate as a fraction, e.g. 18 -> 0.18.
    pub fn tax_rate(&self) -> Decimal {
        Decimal::from(self.tax_rate_percent) / Decimal::ONE_HUNDRED
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Minimal config for tests and tools.
    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            environment: "test".to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            tax_rate_percent: DEFAULT_TAX_RATE_PERCENT,
            pool: PoolConfig::default(),
        }
    }
}

/// Load configuration from `config/default.toml` (when present), an optional
/// `config/{environment}.toml` overlay, and `FACTURA__*` environment variables.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment =
        std::env::var("FACTURA_ENV").unwrap_or_else(|_| default_environment());

    let config: AppConfig = Config::builder()
        .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
        .add_source(File::with_name(&format!("{CONFIG_DIR}/{environment}")).required(false))
        .add_source(
            Environment::with_prefix("FACTURA")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;
    config
        .validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {e}")))?;

    Ok(config)
}

/// Initialize the tracing subscriber. RUST_LOG wins over the configured level.
pub fn init_tracing(log_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
