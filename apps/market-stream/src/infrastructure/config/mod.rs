//! Configuration Module
//!
//! Client configuration loaded from environment variables and CLI overrides.

mod settings;

pub use settings::{
    ClientConfig, ConfigError, DEFAULT_REST_URL, DEFAULT_WS_URL, StreamSettings, env_keys,
};
