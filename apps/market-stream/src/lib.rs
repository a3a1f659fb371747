#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Market Stream - Real-time Market Data Client
//!
//! Holds one long-lived WebSocket connection to a market-data service,
//! authenticates, subscribes to ticker channels, and dispatches every decoded
//! trade, quote, aggregate and fair-value record to caller-supplied
//! callbacks. Transient failures reconnect with backoff and re-subscribe.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types with no I/O
//!   - `subscription`: Asset classes, channels, subscription builder
//!   - `streaming`: Event payloads, decode errors, connection state machine
//!
//! - **Application**: Port definitions and services
//!   - `ports`: `EventHandler` callbacks, `Fetch` REST contract
//!   - `services`: Event dispatcher
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `websocket`: Streaming client, frame decoder, auth, reconnect policy
//!   - `rest`: REST client
//!   - `config`: Environment configuration
//!   - `metrics` / `telemetry`: Prometheus and tracing setup
//!
//! - **CLI**: Command tree and renderers for the `market-stream` binary
//!
//! # Data Flow
//!
//! ```text
//! CLI ─► Subscription ─► StreamClient::run
//!                           │
//!                           ├─ connect ─► auth ─► subscribe
//!                           │
//!                           └─ read loop: FrameDecoder ─► dispatch ─► EventHandler
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no external I/O.
pub mod domain;

/// Application layer - Ports and services.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

/// Command line interface.
pub mod cli;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::streaming::{
    Aggregate, ConnectionState, ControlEvent, DecodeError, EventKind, FairValue, MarketEvent,
    Quote, Severity, StatusMessage, Trade,
};
pub use domain::subscription::{AssetClass, Channel, Subscription, SubscriptionError, Topic};

// Ports and services
pub use application::ports::{EventHandler, Fetch, FetchError};
pub use application::services::{dispatch, dispatch_decode_error};

// Streaming client
pub use infrastructure::websocket::{
    ApiKey, AuthError, CodecError, DecodedFrame, FrameDecoder, ReconnectConfig, ReconnectPolicy,
    StreamClient, StreamConfig, StreamError, StreamStats, stream,
};

// REST client
pub use infrastructure::rest::{RestClient, RestError};

// Configuration
pub use infrastructure::config::{ClientConfig, ConfigError, StreamSettings};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
