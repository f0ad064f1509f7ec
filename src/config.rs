//! Configuration management for the ingestion pipeline

use crate::classifier::RuleThresholds;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable naming an alternative configuration file
pub const CONFIG_PATH_ENV: &str = "PIPELINE_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Which record stream this process ingests
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PipelineVariant {
    /// Social messages with upstream sentiment; author/category means
    Sentiment,
    /// Card transactions with rule-based fraud partitioning
    #[default]
    Transaction,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub store: StoreConfig,
    pub pipeline: PipelineConfig,
    pub rules: RuleThresholds,
    pub dashboard: DashboardConfig,
    pub producer: ProducerConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject carrying inbound records
    pub subject: String,
    /// Queue group shared by cooperating consumers
    #[serde(default)]
    pub queue_group: Option<String>,
    /// JetStream stream that must exist before consuming
    #[serde(default)]
    pub stream: Option<String>,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

/// Aggregate store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// SQLite file, recreated at every start
    pub path: String,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    pub variant: PipelineVariant,
    /// Interval between metrics summaries in seconds
    pub summary_interval_secs: u64,
}

/// Dashboard reader configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DashboardConfig {
    pub enabled: bool,
    /// Poll interval in seconds
    pub interval_secs: u64,
    /// Number of recent rows shown
    pub recent_limit: usize,
}

/// Event producer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProducerConfig {
    /// Delay between generated records in seconds
    pub interval_secs: u64,
    /// NDJSON file every generated record is appended to
    pub live_data_path: String,
}

/// Log output format
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl AppConfig {
    /// Load configuration from `PIPELINE_CONFIG` or `config/config.toml`
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Layer defaults, an optional file and `PIPELINE__*` environment variables
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let defaults =
            Config::try_from(&AppConfig::default()).context("Failed to encode default configuration")?;

        let config = Config::builder()
            .add_source(defaults)
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("PIPELINE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                subject: "transactions".to_string(),
                queue_group: None,
                stream: None,
                connect_timeout_secs: 5,
            },
            store: StoreConfig {
                path: "data/pipeline.sqlite".to_string(),
            },
            pipeline: PipelineConfig {
                variant: PipelineVariant::Transaction,
                summary_interval_secs: 30,
            },
            rules: RuleThresholds::default(),
            dashboard: DashboardConfig {
                enabled: true,
                interval_secs: 2,
                recent_limit: 100,
            },
            producer: ProducerConfig {
                interval_secs: 1,
                live_data_path: "data/live_data.json".to_string(),
            },
            logging: LoggingConfig::default(),
        }
    }
}
