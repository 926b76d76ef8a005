//! Configuration management for AgriTrace
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with the AGRITRACE__ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    pub logging: LoggingConfig,

    pub prediction: PredictionConfig,

    /// AgriPay wallet API configuration
    pub agripay: AgriPayConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when RUST_LOG is unset
    pub filter: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PredictionConfig {
    /// Shortest growing period a prediction may report
    pub min_growing_days: i64,

    /// Log a warning whenever a prediction is clamped
    pub clamp_warnings: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgriPayConfig {
    /// Base URL of the AgriPay API
    pub api_url: String,

    /// Platform-level API token, used when a user has none of their own
    pub api_token: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("AGRITRACE__ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("logging.filter", "agritrace_backend=info,agritrace_predict=info")?
            .set_default("logging.json", false)?
            .set_default("prediction.min_growing_days", shared::MIN_GROWING_DAYS)?
            .set_default("prediction.clamp_warnings", true)?
            .set_default("agripay.api_url", "http://localhost:8001/api")?
            .set_default("agripay.timeout_secs", 10)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (AGRITRACE__ prefix)
            .add_source(
                Environment::with_prefix("AGRITRACE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "agritrace_backend=info".to_string(),
            json: false,
        }
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            min_growing_days: shared::MIN_GROWING_DAYS,
            clamp_warnings: true,
        }
    }
}
