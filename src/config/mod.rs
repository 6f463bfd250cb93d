//! Configuration module - environment variable parsing

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::util::time::DEFAULT_TICK_MILLIS;

/// Client configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// WebSocket URL of the multiplayer authority
    pub authority_url: String,
    /// Delay before each reconnect attempt
    pub reconnect_delay: Duration,

    /// Live stats snapshot endpoint
    pub telemetry_url: String,
    /// History endpoint, if the telemetry service exposes one
    pub telemetry_history_url: Option<String>,
    /// Interval between live snapshot fetches
    pub telemetry_interval: Duration,

    /// Simulation tick length
    pub tick: Duration,
    /// Distance covered per tick per held axis
    pub move_speed: f32,
}

impl Config {
    pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3_000;
    pub const DEFAULT_TELEMETRY_INTERVAL_MS: u64 = 2_000;
    pub const DEFAULT_MOVE_SPEED: f32 = 0.15;

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            authority_url: env::var("AUTHORITY_URL")
                .map_err(|_| ConfigError::Missing("AUTHORITY_URL"))?,
            reconnect_delay: Duration::from_millis(parse_or(
                "RECONNECT_DELAY_MS",
                Self::DEFAULT_RECONNECT_DELAY_MS,
            )?),

            telemetry_url: env::var("TELEMETRY_URL")
                .map_err(|_| ConfigError::Missing("TELEMETRY_URL"))?,
            telemetry_history_url: env::var("TELEMETRY_HISTORY_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            telemetry_interval: Duration::from_millis(parse_or(
                "TELEMETRY_INTERVAL_MS",
                Self::DEFAULT_TELEMETRY_INTERVAL_MS,
            )?),

            tick: Duration::from_millis(parse_or("TICK_MS", DEFAULT_TICK_MILLIS)?),
            move_speed: parse_or("MOVE_SPEED", Self::DEFAULT_MOVE_SPEED)?,
        })
    }

    /// Configuration with defaults for everything but the two endpoints
    pub fn with_endpoints(authority_url: impl Into<String>, telemetry_url: impl Into<String>) -> Self {
        Self {
            log_level: "info".to_string(),
            authority_url: authority_url.into(),
            reconnect_delay: Duration::from_millis(Self::DEFAULT_RECONNECT_DELAY_MS),
            telemetry_url: telemetry_url.into(),
            telemetry_history_url: None,
            telemetry_interval: Duration::from_millis(Self::DEFAULT_TELEMETRY_INTERVAL_MS),
            tick: Duration::from_millis(DEFAULT_TICK_MILLIS),
            move_speed: Self::DEFAULT_MOVE_SPEED,
        }
    }
}

/// Read an optional numeric variable, falling back to `default` when unset
fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
