//! Port Interfaces
//!
//! Contracts between the streaming core and the code around it.
//!
//! ## Driver Ports (Inbound)
//!
//! - [`EventHandler`]: rendering callbacks the caller supplies to the
//!   streaming client, one per event kind.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`Fetch`]: the REST contract `fetch(path, params) -> response | error`.

use async_trait::async_trait;

use crate::domain::streaming::{Aggregate, ControlEvent, DecodeError, FairValue, Quote, Severity, Trade};

// =============================================================================
// Event Handler
// =============================================================================

/// Callbacks invoked by the dispatcher, synchronously on the reader task.
///
/// A slow handler delays the next read; there is no internal queue.
pub trait EventHandler {
    /// A trade was received.
    fn on_trade(&mut self, trade: &Trade);

    /// A quote was received.
    fn on_quote(&mut self, quote: &Quote);

    /// A one-minute aggregate was received.
    fn on_minute_aggregate(&mut self, aggregate: &Aggregate);

    /// A one-second aggregate was received.
    fn on_second_aggregate(&mut self, aggregate: &Aggregate);

    /// A fair market value was received.
    fn on_fair_value(&mut self, value: &FairValue);

    /// A status or unrecognized record was received.
    fn on_control(&mut self, event: &ControlEvent) {
        match (event, event.severity()) {
            (ControlEvent::Status(status), Severity::Info) => {
                tracing::debug!(status = %status.status, message = %status.message, "Status");
            }
            (ControlEvent::Status(status), _) => {
                tracing::warn!(status = %status.status, message = %status.message, "Status");
            }
            (ControlEvent::Unknown { tag, .. }, _) => {
                tracing::debug!(tag = %tag, "Ignoring record with unknown tag");
            }
        }
    }

    /// A record in a frame could not be decoded and was dropped.
    fn on_decode_error(&mut self, error: &DecodeError) {
        tracing::warn!(error = %error, "Dropped undecodable record");
    }
}

// =============================================================================
// REST Fetch
// =============================================================================

/// Errors returned by [`Fetch`] implementations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// Request could not be built or sent.
    #[error("HTTP error: {0}")]
    Http(String),

    /// API key missing or rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Service returned a non-success status.
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the error body.
        message: String,
    },

    /// Response body was not the expected JSON.
    #[error("JSON parsing error: {0}")]
    JsonParse(String),
}

/// The REST contract: GET `path` with query `params`, return the JSON body.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch `path` with the given query parameters.
    async fn fetch_value(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<serde_json::Value, FetchError>;
}
