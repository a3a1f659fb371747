//! WebSocket Streaming
//!
//! Connection manager for the market-data stream: auth handshake, frame
//! decoding, reconnection policy and the read loop.

pub mod auth;
pub mod client;
pub mod codec;
pub mod messages;
pub mod reconnect;

pub use auth::{AUTH_TIMEOUT, ApiKey, AuthError, AuthHandler, AuthState};
pub use client::{CONNECT_TIMEOUT, StreamClient, StreamConfig, StreamError, StreamStats, stream};
pub use codec::{CodecError, DecodedFrame, FrameDecoder};
pub use messages::ActionRequest;
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
