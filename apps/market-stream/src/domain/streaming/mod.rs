//! Market Data Streaming Types
//!
//! Core domain types for streamed market data: the typed event payloads,
//! the [`MarketEvent`] envelope, and the connection state machine.

mod decode;
mod events;
mod state;

pub use decode::DecodeError;
pub use events::{
    Aggregate, ControlEvent, EventKind, FairValue, MarketEvent, Quote, Severity, StatusMessage,
    Trade,
};
pub use state::ConnectionState;
