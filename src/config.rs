//! Configuration types for tick-vault

use crate::exchange::BinanceConfig;
use crate::telemetry::LogFormat;
use crate::timeframe::{EmptyDiscoveryPolicy, Timeframe};
use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub collector: CollectorConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub binance: BinanceConfig,
}

/// Collector session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    /// Exchange identity recorded with every row
    pub exchange: String,

    /// Symbols to collect; empty means none configured
    #[serde(default)]
    pub symbols: Vec<String>,

    /// Timeframes to collect when discovery is off
    #[serde(default)]
    pub timeframes: Vec<Timeframe>,

    /// Ask the venue for every timeframe it supports instead
    #[serde(default)]
    pub use_all_available_timeframes: bool,

    /// Behaviour when discovery returns no timeframes
    #[serde(default)]
    pub on_empty_discovery: EmptyDiscoveryPolicy,

    /// Fail initialization when no exchange adapter is available
    #[serde(default)]
    pub require_adapter: bool,
}

impl CollectorConfig {
    /// Config for an exchange with no symbols or timeframes
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            symbols: vec![],
            timeframes: vec![],
            use_all_available_timeframes: false,
            on_empty_discovery: EmptyDiscoveryPolicy::default(),
            require_adapter: false,
        }
    }

    /// Set the symbol list
    pub fn with_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symbols = symbols.into_iter().map(Into::into).collect();
        self
    }

    /// Set the explicit timeframe list
    pub fn with_timeframes(mut self, timeframes: Vec<Timeframe>) -> Self {
        self.timeframes = timeframes;
        self
    }

    /// Switch to venue discovery
    pub fn discover_all_timeframes(mut self) -> Self {
        self.use_all_available_timeframes = true;
        self
    }

    /// Reject configurations no session could run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.exchange.trim().is_empty() {
            anyhow::bail!("collector.exchange must not be empty");
        }
        if self.symbols.iter().any(|s| s.trim().is_empty()) {
            anyhow::bail!("collector.symbols must not contain empty entries");
        }
        Ok(())
    }
}

/// Data set output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./backtesting/data")
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Prometheus exporter port; disabled when absent
    pub metrics_port: Option<u16>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: None,
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.collector.validate()?;
        Ok(config)
    }
}
