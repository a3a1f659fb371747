//! Client Configuration Settings
//!
//! Configuration types for the streaming and REST clients, loaded from
//! environment variables. Unparseable numeric values fall back to defaults.

use std::time::Duration;

use crate::infrastructure::websocket::ApiKey;

/// Default streaming base URL.
pub const DEFAULT_WS_URL: &str = "wss://socket.polygon.io";

/// Default REST base URL.
pub const DEFAULT_REST_URL: &str = "https://api.polygon.io";

/// Environment variable names.
pub mod env_keys {
    /// API key (required).
    pub const API_KEY: &str = "MARKET_DATA_API_KEY";
    /// Streaming base URL.
    pub const WS_URL: &str = "MARKET_DATA_WS_URL";
    /// REST base URL.
    pub const REST_URL: &str = "MARKET_DATA_REST_URL";
    /// Read timeout in seconds.
    pub const READ_TIMEOUT_SECS: &str = "MARKET_STREAM_READ_TIMEOUT_SECS";
    /// Ping interval in seconds.
    pub const PING_INTERVAL_SECS: &str = "MARKET_STREAM_PING_INTERVAL_SECS";
    /// Auth acknowledgement timeout in seconds.
    pub const AUTH_TIMEOUT_SECS: &str = "MARKET_STREAM_AUTH_TIMEOUT_SECS";
    /// Initial reconnect delay in milliseconds.
    pub const RECONNECT_DELAY_INITIAL_MS: &str = "MARKET_STREAM_RECONNECT_DELAY_INITIAL_MS";
    /// Maximum reconnect delay in seconds.
    pub const RECONNECT_DELAY_MAX_SECS: &str = "MARKET_STREAM_RECONNECT_DELAY_MAX_SECS";
    /// Reconnect delay multiplier.
    pub const RECONNECT_DELAY_MULTIPLIER: &str = "MARKET_STREAM_RECONNECT_DELAY_MULTIPLIER";
    /// Reconnect jitter fraction.
    pub const RECONNECT_JITTER: &str = "MARKET_STREAM_RECONNECT_JITTER";
    /// Prometheus listener port (0 disables).
    pub const METRICS_PORT: &str = "MARKET_STREAM_METRICS_PORT";
}

/// Streaming connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSettings {
    /// Connection is considered dead after this long without a frame.
    pub read_timeout: Duration,
    /// Interval between keepalive pings.
    pub ping_interval: Duration,
    /// Time allowed for the auth acknowledgement.
    pub auth_timeout: Duration,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Reconnection jitter as a fraction of the nominal delay.
    pub reconnect_jitter: f64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(30),
            ping_interval: Duration::from_secs(10),
            auth_timeout: Duration::from_secs(10),
            reconnect_delay_initial: Duration::from_millis(500),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            reconnect_jitter: 0.2,
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API key for both transports.
    pub api_key: ApiKey,
    /// Streaming base URL; the asset class is appended as a path segment.
    pub ws_url: String,
    /// REST base URL.
    pub rest_url: String,
    /// Streaming settings.
    pub stream: StreamSettings,
    /// Prometheus listener port, 0 when disabled.
    pub metrics_port: u16,
}

impl ClientConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// The binary layers CLI flags over the environment through this.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or empty.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_key = lookup(env_keys::API_KEY)
            .ok_or_else(|| ConfigError::MissingEnvVar(env_keys::API_KEY.to_string()))?;
        let api_key =
            ApiKey::new(raw_key).map_err(|_| ConfigError::EmptyValue(env_keys::API_KEY.to_string()))?;

        let ws_url = non_empty(lookup(env_keys::WS_URL)).unwrap_or_else(|| DEFAULT_WS_URL.to_string());
        let rest_url =
            non_empty(lookup(env_keys::REST_URL)).unwrap_or_else(|| DEFAULT_REST_URL.to_string());

        let defaults = StreamSettings::default();
        let stream = StreamSettings {
            read_timeout: parse_duration_secs(
                &lookup,
                env_keys::READ_TIMEOUT_SECS,
                defaults.read_timeout,
            ),
            ping_interval: parse_duration_secs(
                &lookup,
                env_keys::PING_INTERVAL_SECS,
                defaults.ping_interval,
            ),
            auth_timeout: parse_duration_secs(
                &lookup,
                env_keys::AUTH_TIMEOUT_SECS,
                defaults.auth_timeout,
            ),
            reconnect_delay_initial: parse_duration_millis(
                &lookup,
                env_keys::RECONNECT_DELAY_INITIAL_MS,
                defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_duration_secs(
                &lookup,
                env_keys::RECONNECT_DELAY_MAX_SECS,
                defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: parse_f64(
                &lookup,
                env_keys::RECONNECT_DELAY_MULTIPLIER,
                defaults.reconnect_delay_multiplier,
            ),
            reconnect_jitter: parse_f64(
                &lookup,
                env_keys::RECONNECT_JITTER,
                defaults.reconnect_jitter,
            ),
        };

        let metrics_port = parse_u16(&lookup, env_keys::METRICS_PORT, 0);

        Ok(Self {
            api_key,
            ws_url,
            rest_url,
            stream,
            metrics_port,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_u16<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: u16) -> u16 {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_f64<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: f64) -> f64 {
    lookup(key)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(default)
}

fn parse_duration_secs<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    key: &str,
    default: Duration,
) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_duration_millis<F: Fn(&str) -> Option<String>>(
    lookup: &F,
    key: &str,
    default: Duration,
) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn stream_settings_defaults() {
        let settings = StreamSettings::default();
        assert_eq!(settings.read_timeout, Duration::from_secs(30));
        assert_eq!(settings.ping_interval, Duration::from_secs(10));
        assert_eq!(settings.auth_timeout, Duration::from_secs(10));
        assert_eq!(settings.reconnect_delay_initial, Duration::from_millis(500));
        assert_eq!(settings.reconnect_delay_max, Duration::from_secs(30));
        assert!((settings.reconnect_delay_multiplier - 2.0).abs() < f64::EPSILON);
        assert!((settings.reconnect_jitter - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_api_key() {
        let err = ClientConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == env_keys::API_KEY));
    }

    #[test]
    fn empty_api_key() {
        let err = ClientConfig::from_lookup(lookup(&[(env_keys::API_KEY, "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyValue(_)));
    }

    #[test]
    fn defaults_applied() {
        let config = ClientConfig::from_lookup(lookup(&[(env_keys::API_KEY, "key")])).unwrap();
        assert_eq!(config.api_key.expose(), "key");
        assert_eq!(config.ws_url, DEFAULT_WS_URL);
        assert_eq!(config.rest_url, DEFAULT_REST_URL);
        assert_eq!(config.stream, StreamSettings::default());
        assert_eq!(config.metrics_port, 0);
    }

    #[test]
    fn overrides_parsed() {
        let config = ClientConfig::from_lookup(lookup(&[
            (env_keys::API_KEY, "key"),
            (env_keys::WS_URL, "ws://127.0.0.1:9000"),
            (env_keys::REST_URL, "http://127.0.0.1:9001"),
            (env_keys::READ_TIMEOUT_SECS, "5"),
            (env_keys::RECONNECT_DELAY_INITIAL_MS, "50"),
            (env_keys::RECONNECT_DELAY_MULTIPLIER, "1.5"),
            (env_keys::METRICS_PORT, "9464"),
        ]))
        .unwrap();

        assert_eq!(config.ws_url, "ws://127.0.0.1:9000");
        assert_eq!(config.rest_url, "http://127.0.0.1:9001");
        assert_eq!(config.stream.read_timeout, Duration::from_secs(5));
        assert_eq!(config.stream.reconnect_delay_initial, Duration::from_millis(50));
        assert!((config.stream.reconnect_delay_multiplier - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.metrics_port, 9464);
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let config = ClientConfig::from_lookup(lookup(&[
            (env_keys::API_KEY, "key"),
            (env_keys::PING_INTERVAL_SECS, "soon"),
            (env_keys::RECONNECT_JITTER, "-1"),
            (env_keys::METRICS_PORT, "99999"),
        ]))
        .unwrap();

        assert_eq!(config.stream.ping_interval, Duration::from_secs(10));
        assert!((config.stream.reconnect_jitter - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.metrics_port, 0);
    }

    #[test]
    fn api_key_redacted_in_debug() {
        let config = ClientConfig::from_lookup(lookup(&[(env_keys::API_KEY, "secret456")])).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret456"));
    }
}
