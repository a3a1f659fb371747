//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// WebSocket streaming client.
pub mod websocket;

/// REST client.
pub mod rest;

/// Configuration loading.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Tracing and OpenTelemetry setup.
pub mod telemetry;
