//! Prometheus Metrics Module
//!
//! Counters and gauges for the streaming client.
//!
//! # Metrics
//!
//! - `market_stream_frames_received_total`: frames read from the socket
//! - `market_stream_events_total{kind}`: events dispatched by kind
//! - `market_stream_decode_errors_total`: records dropped by the decoder
//! - `market_stream_reconnects_total`: reconnection attempts
//! - `market_stream_connection_state`: current [`ConnectionState`] as a number
//!
//! Without an installed recorder the macros are no-ops, so library users pay
//! nothing unless they opt in.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::domain::streaming::{ConnectionState, EventKind};

// =============================================================================
// Exporter
// =============================================================================

static LISTEN_ADDR: OnceLock<SocketAddr> = OnceLock::new();

/// Errors installing the exporter.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Recorder or listener could not be installed.
    #[error("failed to install Prometheus exporter: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}

/// Install the Prometheus recorder with an HTTP listener on `127.0.0.1:port`.
///
/// Must be called from within a Tokio runtime. A second call is a no-op and
/// returns the address of the first.
///
/// # Errors
///
/// Returns an error if the recorder cannot be installed.
pub fn init_metrics(port: u16) -> Result<SocketAddr, MetricsError> {
    if let Some(addr) = LISTEN_ADDR.get() {
        return Ok(*addr);
    }

    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    register_metrics();

    Ok(*LISTEN_ADDR.get_or_init(|| addr))
}

fn register_metrics() {
    describe_counter!(
        "market_stream_frames_received_total",
        "Total WebSocket frames received"
    );
    describe_counter!(
        "market_stream_events_total",
        "Total events dispatched by kind"
    );
    describe_counter!(
        "market_stream_decode_errors_total",
        "Total records dropped because they could not be decoded"
    );
    describe_counter!(
        "market_stream_reconnects_total",
        "Total reconnection attempts"
    );
    describe_gauge!(
        "market_stream_connection_state",
        "Connection state (0 disconnected .. 6 closed)"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a frame read from the socket.
pub fn record_frame() {
    counter!("market_stream_frames_received_total").increment(1);
}

/// Record a dispatched event.
pub fn record_event(kind: EventKind) {
    counter!("market_stream_events_total", "kind" => kind.as_str()).increment(1);
}

/// Record a dropped record.
pub fn record_decode_error() {
    counter!("market_stream_decode_errors_total").increment(1);
}

/// Record a reconnection attempt.
pub fn record_reconnect() {
    counter!("market_stream_reconnects_total").increment(1);
}

/// Publish the connection state.
pub fn set_connection_state(state: ConnectionState) {
    gauge!("market_stream_connection_state").set(state.as_gauge());
}
