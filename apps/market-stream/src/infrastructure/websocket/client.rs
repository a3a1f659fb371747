//! Streaming Client
//!
//! Holds one WebSocket connection to a market-data stream, authenticates,
//! subscribes, and dispatches decoded records to an [`EventHandler`] until
//! cancelled. Transport failures are retried with backoff; a rejected API
//! key or a malformed endpoint stops the client.
//!
//! # Stream URL
//!
//! `<base>/<asset class>`, e.g. `wss://socket.polygon.io/stocks`.
//!
//! # Lifecycle
//!
//! ```text
//! connect ─► auth ─► subscribe ─► read loop ──(drop / timeout)──► backoff ─┐
//!    ▲                                                                    │
//!    └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every wait races the cancellation token.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use super::auth::{AuthError, AuthHandler, ApiKey};
use super::codec::{CodecError, DecodedFrame, FrameDecoder};
use super::messages::ActionRequest;
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::application::ports::EventHandler;
use crate::application::services::{dispatch, dispatch_decode_error};
use crate::domain::streaming::{ConnectionState, ControlEvent, MarketEvent};
use crate::domain::subscription::{AssetClass, Subscription};
use crate::infrastructure::config::StreamSettings;
use crate::infrastructure::metrics;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

/// Default time allowed to open the transport.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed to send the close frame on shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Number of backoff delays kept in [`StreamStats`].
const RECENT_DELAYS: usize = 32;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that stop the client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The service rejected the API key.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(#[from] AuthError),

    /// Endpoint or settings are unusable.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

/// Errors that end one connection.
#[derive(Debug, thiserror::Error)]
enum ConnectionError {
    #[error(transparent)]
    Fatal(#[from] StreamError),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("{0} timed out after {1:?}")]
    Timeout(&'static str, Duration),

    #[error("connection closed: {0}")]
    Closed(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] CodecError),
}

enum Flow {
    Proceed,
    Cancelled,
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for one [`StreamClient`].
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Full endpoint URL including the asset-class path.
    pub url: String,
    /// API key sent in the auth message.
    pub api_key: ApiKey,
    /// Backoff settings.
    pub reconnect: ReconnectConfig,
    /// Connection is considered dead after this long without a frame.
    pub read_timeout: Duration,
    /// Keepalive ping interval; zero disables pings.
    pub ping_interval: Duration,
    /// Time allowed for the auth acknowledgement.
    pub auth_timeout: Duration,
    /// Time allowed to open the transport.
    pub connect_timeout: Duration,
}

impl StreamConfig {
    /// Configuration with default timings.
    #[must_use]
    pub fn new(url: impl Into<String>, api_key: ApiKey) -> Self {
        Self::from_settings(url, api_key, &StreamSettings::default())
    }

    /// Configuration from loaded [`StreamSettings`].
    #[must_use]
    pub fn from_settings(url: impl Into<String>, api_key: ApiKey, settings: &StreamSettings) -> Self {
        Self {
            url: url.into(),
            api_key,
            reconnect: ReconnectConfig::from_settings(settings),
            read_timeout: settings.read_timeout,
            ping_interval: settings.ping_interval,
            auth_timeout: settings.auth_timeout,
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    /// Endpoint URL for an asset class under a base URL.
    #[must_use]
    pub fn endpoint(base_url: &str, asset_class: AssetClass) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), asset_class.as_str())
    }

    /// Check the endpoint and timings.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Configuration`] if the URL is not a `ws`/`wss`
    /// URL with a host, a timeout is zero, or the backoff settings cannot
    /// produce a growing, capped delay.
    pub fn validate(&self) -> Result<(), StreamError> {
        let url = reqwest::Url::parse(&self.url).map_err(|e| {
            StreamError::Configuration(format!("invalid endpoint URL {:?}: {e}", self.url))
        })?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(StreamError::Configuration(format!(
                "endpoint URL {:?} must use ws or wss",
                self.url
            )));
        }

        if url.host_str().is_none_or(str::is_empty) {
            return Err(StreamError::Configuration(format!(
                "endpoint URL {:?} has no host",
                self.url
            )));
        }

        if self.read_timeout.is_zero() {
            return Err(StreamError::Configuration(
                "read timeout must be greater than zero".to_string(),
            ));
        }

        if self.auth_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(StreamError::Configuration(
                "auth and connect timeouts must be greater than zero".to_string(),
            ));
        }

        let reconnect = &self.reconnect;
        if reconnect.initial_delay.is_zero() || reconnect.initial_delay > reconnect.max_delay {
            return Err(StreamError::Configuration(format!(
                "reconnect delays must satisfy 0 < initial ({:?}) <= max ({:?})",
                reconnect.initial_delay, reconnect.max_delay
            )));
        }

        if !reconnect.multiplier.is_finite() || reconnect.multiplier < 1.0 {
            return Err(StreamError::Configuration(format!(
                "reconnect multiplier must be a finite number >= 1, got {}",
                reconnect.multiplier
            )));
        }

        if !reconnect.jitter_factor.is_finite() || reconnect.jitter_factor < 0.0 {
            return Err(StreamError::Configuration(format!(
                "reconnect jitter must be a finite number >= 0, got {}",
                reconnect.jitter_factor
            )));
        }

        Ok(())
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Counters for one client, readable while it runs.
#[derive(Debug, Default)]
pub struct StreamStats {
    connections: AtomicU64,
    reconnect_attempts: AtomicU64,
    frames: AtomicU64,
    events: AtomicU64,
    decode_errors: AtomicU64,
    recent_delays: Mutex<VecDeque<Duration>>,
}

impl StreamStats {
    /// Transports opened.
    #[must_use]
    pub fn connections(&self) -> u64 {
        self.connections.load(Ordering::Relaxed)
    }

    /// Backoff sleeps started.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u64 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    /// Text or binary frames received.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Events dispatched.
    #[must_use]
    pub fn events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    /// Records dropped by the decoder.
    #[must_use]
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    /// Most recent backoff delays, oldest first.
    #[must_use]
    pub fn recent_delays(&self) -> Vec<Duration> {
        self.recent_delays.lock().iter().copied().collect()
    }

    fn record_reconnect(&self, delay: Duration) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
        let mut delays = self.recent_delays.lock();
        if delays.len() == RECENT_DELAYS {
            delays.pop_front();
        }
        delays.push_back(delay);
    }
}

// =============================================================================
// Client
// =============================================================================

/// Reconnecting streaming client for one subscription.
pub struct StreamClient {
    config: StreamConfig,
    subscription: Subscription,
    cancel: CancellationToken,
    decoder: FrameDecoder,
    state_tx: watch::Sender<ConnectionState>,
    stats: Arc<StreamStats>,
}

impl StreamClient {
    /// Create a client. Nothing happens until [`StreamClient::run`].
    #[must_use]
    pub fn new(config: StreamConfig, subscription: Subscription, cancel: CancellationToken) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            subscription,
            cancel,
            decoder: FrameDecoder::new(),
            state_tx,
            stats: Arc::new(StreamStats::default()),
        }
    }

    /// Watch the connection state.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Shared counters.
    #[must_use]
    pub fn stats(&self) -> Arc<StreamStats> {
        Arc::clone(&self.stats)
    }

    /// Stream until cancelled or a fatal error.
    ///
    /// Returns `Ok(())` when the cancellation token fires.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::AuthenticationFailed`] if the key is rejected
    /// and [`StreamError::Configuration`] if the endpoint is unusable.
    #[allow(clippy::future_not_send)]
    pub async fn run<H: EventHandler + ?Sized>(self, handler: &mut H) -> Result<(), StreamError> {
        if let Err(e) = self.config.validate() {
            tracing::error!(error = %e, "Refusing to start stream");
            self.transition(ConnectionState::Closed);
            return Err(e);
        }

        tracing::info!(
            url = %self.config.url,
            subscription = %self.subscription,
            "Starting stream"
        );

        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("Stream cancelled");
                self.transition(ConnectionState::Closed);
                return Ok(());
            }

            self.transition(ConnectionState::Connecting);

            match self.connect_and_stream(handler, &mut policy).await {
                Ok(()) => {
                    tracing::info!("Stream cancelled");
                    self.transition(ConnectionState::Closed);
                    return Ok(());
                }
                Err(ConnectionError::Fatal(e)) => {
                    tracing::error!(error = %e, "Stream stopped");
                    self.transition(ConnectionState::Closed);
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Stream connection lost");
                    self.transition(ConnectionState::Reconnecting);

                    let delay = policy.next_delay();
                    self.stats.record_reconnect(delay);
                    metrics::record_reconnect();
                    tracing::info!(
                        attempt = policy.attempt_count(),
                        delay_ms = delay.as_millis(),
                        "Reconnecting"
                    );

                    tokio::select! {
                        () = self.cancel.cancelled() => {
                            tracing::info!("Stream cancelled during reconnect delay");
                            self.transition(ConnectionState::Closed);
                            return Ok(());
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// One connection: connect, authenticate, subscribe, read until failure.
    ///
    /// `Ok(())` means cancelled.
    #[allow(clippy::future_not_send)]
    async fn connect_and_stream<H: EventHandler + ?Sized>(
        &self,
        handler: &mut H,
        policy: &mut ReconnectPolicy,
    ) -> Result<(), ConnectionError> {
        tracing::debug!(url = %self.config.url, "Connecting");

        let connect = tokio::time::timeout(
            self.config.connect_timeout,
            tokio_tungstenite::connect_async(self.config.url.as_str()),
        );
        let ws_stream = tokio::select! {
            () = self.cancel.cancelled() => return Ok(()),
            result = connect => match result {
                Err(_) => {
                    return Err(ConnectionError::Timeout("connect", self.config.connect_timeout));
                }
                Ok(Err(tungstenite::Error::Url(e))) => {
                    return Err(StreamError::Configuration(e.to_string()).into());
                }
                Ok(Err(e)) => return Err(e.into()),
                Ok(Ok((ws_stream, _response))) => ws_stream,
            },
        };

        self.stats.connections.fetch_add(1, Ordering::Relaxed);
        let (mut write, mut read) = ws_stream.split();

        self.transition(ConnectionState::Authenticating);
        if let Flow::Cancelled = self.authenticate(&mut write, &mut read, handler).await? {
            return Ok(());
        }

        self.transition(ConnectionState::Subscribing);
        let params = self.subscription.params();
        let request = self.decoder.encode(&ActionRequest::subscribe(params.as_str()))?;
        write.send(Message::Text(request.into())).await?;
        tracing::info!(params = %params, "Subscription sent");

        self.transition(ConnectionState::Streaming);
        self.read_loop(&mut write, &mut read, handler, policy).await
    }

    #[allow(clippy::future_not_send)]
    async fn authenticate<H: EventHandler + ?Sized>(
        &self,
        write: &mut WsWrite,
        read: &mut WsRead,
        handler: &mut H,
    ) -> Result<Flow, ConnectionError> {
        let request = self
            .decoder
            .encode(&ActionRequest::auth(self.config.api_key.expose()))?;
        write.send(Message::Text(request.into())).await?;
        tracing::debug!("Auth request sent");

        let mut auth = AuthHandler::new();
        let deadline = Instant::now() + self.config.auth_timeout;

        while !auth.is_authenticated() {
            let message = tokio::select! {
                () = self.cancel.cancelled() => {
                    close(write).await;
                    return Ok(Flow::Cancelled);
                }
                () = tokio::time::sleep_until(deadline) => {
                    return Err(ConnectionError::Timeout("authentication", self.config.auth_timeout));
                }
                message = read.next() => message,
            };

            let Some(frame) = self.on_message(message, write).await? else {
                continue;
            };

            self.deliver(&frame, handler);

            for event in frame.events() {
                if let MarketEvent::Control(ControlEvent::Status(status)) = event {
                    auth.on_status(status).map_err(StreamError::from)?;
                }
            }
        }

        tracing::info!("Authenticated");
        Ok(Flow::Proceed)
    }

    #[allow(clippy::future_not_send)]
    async fn read_loop<H: EventHandler + ?Sized>(
        &self,
        write: &mut WsWrite,
        read: &mut WsRead,
        handler: &mut H,
        policy: &mut ReconnectPolicy,
    ) -> Result<(), ConnectionError> {
        let mut ping = (!self.config.ping_interval.is_zero()).then(|| {
            let mut interval = tokio::time::interval_at(
                Instant::now() + self.config.ping_interval,
                self.config.ping_interval,
            );
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        let mut last_frame = Instant::now();
        let mut healthy = false;

        loop {
            let deadline = last_frame + self.config.read_timeout;

            tokio::select! {
                () = self.cancel.cancelled() => {
                    close(write).await;
                    return Ok(());
                }
                () = tokio::time::sleep_until(deadline) => {
                    return Err(ConnectionError::Timeout("read", self.config.read_timeout));
                }
                () = next_tick(ping.as_mut()) => {
                    write.send(Message::Ping(Vec::new().into())).await?;
                    tracing::trace!("Ping sent");
                }
                message = read.next() => {
                    last_frame = Instant::now();
                    if let Some(frame) = self.on_message(message, write).await? {
                        // Status acks do not prove the feed works; wait for data.
                        let has_data = frame
                            .events()
                            .any(|e| !matches!(e, MarketEvent::Control(_)));
                        if !healthy && has_data {
                            healthy = true;
                            policy.reset();
                            tracing::debug!("Market data flowing, backoff reset");
                        }
                        self.deliver(&frame, handler);
                    }
                }
            }
        }
    }

    /// Handle one read result; data frames are decoded and returned.
    async fn on_message(
        &self,
        message: Option<Result<Message, tungstenite::Error>>,
        write: &mut WsWrite,
    ) -> Result<Option<DecodedFrame>, ConnectionError> {
        let frame = match message {
            Some(Ok(Message::Text(text))) => self.decoder.decode(text.as_str())?,
            Some(Ok(Message::Binary(data))) => self.decoder.decode_bytes(&data)?,
            Some(Ok(Message::Ping(data))) => {
                write.send(Message::Pong(data)).await?;
                return Ok(None);
            }
            Some(Ok(Message::Pong(_) | Message::Frame(_))) => return Ok(None),
            Some(Ok(Message::Close(frame))) => {
                let reason = frame.map_or_else(
                    || "close frame without reason".to_string(),
                    |f| format!("{} {}", f.code, f.reason.as_str()),
                );
                return Err(ConnectionError::Closed(reason));
            }
            Some(Err(e)) => return Err(e.into()),
            None => return Err(ConnectionError::Closed("stream ended".to_string())),
        };

        self.stats.frames.fetch_add(1, Ordering::Relaxed);
        metrics::record_frame();
        tracing::trace!(records = frame.len(), "Frame received");

        Ok(Some(frame))
    }

    fn deliver<H: EventHandler + ?Sized>(&self, frame: &DecodedFrame, handler: &mut H) {
        for record in &frame.records {
            match record {
                Ok(event) => {
                    self.stats.events.fetch_add(1, Ordering::Relaxed);
                    metrics::record_event(event.kind());
                    dispatch(event, handler);
                }
                Err(error) => {
                    self.stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                    metrics::record_decode_error();
                    dispatch_decode_error(error, handler);
                }
            }
        }
    }

    fn transition(&self, next: ConnectionState) {
        let previous = *self.state_tx.borrow();
        if previous == next {
            return;
        }
        if !previous.can_transition_to(next) {
            tracing::warn!(from = %previous, to = %next, "Unexpected connection state transition");
        }
        self.state_tx.send_replace(next);
        metrics::set_connection_state(next);
        tracing::debug!(from = %previous, to = %next, "Connection state changed");
    }
}

/// Stream `subscription` from `config.url` into `handler` until `cancel` fires.
///
/// # Errors
///
/// See [`StreamClient::run`].
#[allow(clippy::future_not_send)]
pub async fn stream<H: EventHandler + ?Sized>(
    cancel: CancellationToken,
    config: StreamConfig,
    subscription: Subscription,
    handler: &mut H,
) -> Result<(), StreamError> {
    StreamClient::new(config, subscription, cancel)
        .run(handler)
        .await
}

async fn next_tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn close(write: &mut WsWrite) {
    match tokio::time::timeout(CLOSE_TIMEOUT, write.send(Message::Close(None))).await {
        Ok(Ok(())) => tracing::debug!("Close frame sent"),
        Ok(Err(e)) => tracing::debug!(error = %e, "Close frame not sent"),
        Err(_) => tracing::debug!("Close frame timed out"),
    }
}
