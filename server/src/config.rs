//! Service configuration.

use std::time::Duration;

use pocketbook_common::PocketbookError;
use pocketbook_fx::FxConfig;

/// Main service configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Rate source, cache and converter settings.
    pub fx: FxConfig,
    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Fetch the rate table once at startup.
    pub warm_cache: bool,
    /// How often rate statistics are logged. Zero disables the report.
    pub stats_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            fx: FxConfig::default(),
            log_level: "info".to_string(),
            warm_cache: true,
            stats_interval: Duration::from_secs(300),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self {
            fx: FxConfig::from_env(),
            ..Default::default()
        };

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        if let Ok(warm) = std::env::var("POCKETBOOK_WARM_CACHE") {
            if let Some(warm) = parse_flag(&warm) {
                config.warm_cache = warm;
            }
        }

        if let Ok(secs) = std::env::var("POCKETBOOK_STATS_INTERVAL_SECS") {
            if let Ok(secs) = secs.parse() {
                config.stats_interval = Duration::from_secs(secs);
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), PocketbookError> {
        self.fx.validate().map_err(PocketbookError::Configuration)?;

        if self.log_level.trim().is_empty() {
            return Err(PocketbookError::Configuration(
                "Log level cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
