//! crates/signal_hub_client/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the hosted gateway, e.g. `https://project.example.co`.
    pub gateway_url: String,
    /// Public (anon) API key sent with every gateway request.
    pub gateway_key: String,
    pub log_level: Level,
    /// Quiet period before a search query fires.
    pub search_debounce: Duration,
    /// Bucket holding chapter material blobs.
    pub materials_bucket: String,
    /// Upload size cap in bytes.
    pub max_upload_bytes: usize,
    /// Lifetime of signed material URLs.
    pub signed_url_ttl: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Gateway Settings ---
        let gateway_url = std::env::var("GATEWAY_URL")
            .map_err(|_| ConfigError::MissingVar("GATEWAY_URL".to_string()))?;
        let gateway_key = std::env::var("GATEWAY_ANON_KEY")
            .map_err(|_| ConfigError::MissingVar("GATEWAY_ANON_KEY".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Tunables (all defaulted) ---
        let search_debounce = parse_var("SEARCH_DEBOUNCE_MS", 300u64).map(Duration::from_millis)?;
        let materials_bucket = std::env::var("MATERIALS_BUCKET")
            .unwrap_or_else(|_| "chapter-materials".to_string());
        let max_upload_bytes = parse_var("MAX_UPLOAD_BYTES", 10 * 1024 * 1024usize)?;
        let signed_url_ttl = parse_var("SIGNED_URL_TTL_SECS", 60u64).map(Duration::from_secs)?;

        Ok(Self {
            gateway_url,
            gateway_key,
            log_level,
            search_debounce,
            materials_bucket,
            max_upload_bytes,
            signed_url_ttl,
        })
    }
}

/// Reads an optional numeric variable, falling back to `default` when unset.
fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(name.to_string(), raw)),
        Err(_) => Ok(default),
    }
}
