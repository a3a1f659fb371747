//! Subscription Types
//!
//! Domain types describing what a streaming connection asks the service for:
//! an asset class (which selects the endpoint), and a list of
//! `channel.ticker` topics (which become the subscribe `params`).
//!
//! # Wire Format
//!
//! ```text
//! T.AAPL,Q.MSFT      explicit tickers, input order preserved
//! Q.*                wildcard: every ticker on the channel
//! ```

use std::fmt;
use std::str::FromStr;

/// Token that selects every ticker on a channel.
pub const WILDCARD: &str = "*";

// =============================================================================
// Errors
// =============================================================================

/// Errors produced while building a subscription.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    /// Subscription is not well-formed.
    #[error("invalid subscription: {0}")]
    InvalidSubscription(String),

    /// Asset class name not recognized.
    #[error("unknown asset class: {0}")]
    UnknownAssetClass(String),

    /// Channel code or name not recognized.
    #[error("unknown channel: {0}")]
    UnknownChannel(String),
}

// =============================================================================
// Asset Class
// =============================================================================

/// Market segment served by a streaming endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetClass {
    /// US equities.
    Stocks,
    /// Listed options contracts.
    Options,
    /// Currency pairs.
    Forex,
    /// Crypto pairs.
    Crypto,
    /// Market indices.
    Indices,
}

impl AssetClass {
    /// Every asset class, in CLI listing order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Stocks,
            Self::Options,
            Self::Forex,
            Self::Crypto,
            Self::Indices,
        ]
    }

    /// Path segment used in the endpoint URL.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stocks => "stocks",
            Self::Options => "options",
            Self::Forex => "forex",
            Self::Crypto => "crypto",
            Self::Indices => "indices",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetClass {
    type Err = SubscriptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|asset| asset.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SubscriptionError::UnknownAssetClass(s.to_string()))
    }
}

// =============================================================================
// Channel
// =============================================================================

/// Streaming channel. The code doubles as the event-type tag of the records
/// the channel produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Trades (`T`).
    Trades,
    /// Quotes (`Q`).
    Quotes,
    /// Minute aggregates (`AM`).
    MinuteAggregates,
    /// Second aggregates (`A`).
    SecondAggregates,
    /// Fair market value (`FMV`).
    FairMarketValue,
}

impl Channel {
    /// Every channel, in CLI listing order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Trades,
            Self::Quotes,
            Self::MinuteAggregates,
            Self::SecondAggregates,
            Self::FairMarketValue,
        ]
    }

    /// Wire code of the channel.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Trades => "T",
            Self::Quotes => "Q",
            Self::MinuteAggregates => "AM",
            Self::SecondAggregates => "A",
            Self::FairMarketValue => "FMV",
        }
    }

    /// Human-readable name, used as the CLI subcommand.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Trades => "trades",
            Self::Quotes => "quotes",
            Self::MinuteAggregates => "minute-aggs",
            Self::SecondAggregates => "second-aggs",
            Self::FairMarketValue => "fmv",
        }
    }

    /// Look up a channel by its wire code (case-sensitive).
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        Self::all().iter().copied().find(|c| c.code() == code)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Channel {
    type Err = SubscriptionError;

    /// Accepts either the wire code (`AM`) or the CLI name (`minute-aggs`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::from_code(s)
            .or_else(|| {
                Self::all()
                    .iter()
                    .copied()
                    .find(|c| c.name().eq_ignore_ascii_case(s))
            })
            .ok_or_else(|| SubscriptionError::UnknownChannel(s.to_string()))
    }
}

// =============================================================================
// Topic
// =============================================================================

/// One `channel.ticker` token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    channel: Channel,
    ticker: String,
}

impl Topic {
    /// Channel of the topic.
    #[must_use]
    pub const fn channel(&self) -> Channel {
        self.channel
    }

    /// Ticker of the topic, `*` for wildcard.
    #[must_use]
    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    /// Whether this topic selects every ticker on its channel.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.ticker == WILDCARD
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.channel.code(), self.ticker)
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// Immutable set of topics on one asset class endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    asset_class: AssetClass,
    topics: Vec<Topic>,
}

impl Subscription {
    /// Build a single-channel subscription.
    ///
    /// With `all` set the result is the wildcard topic and `tickers` is
    /// ignored. Otherwise every ticker becomes one topic, in input order.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::InvalidSubscription`] when no tickers are
    /// given without `all`, or when a ticker is blank or contains a comma or
    /// whitespace.
    pub fn build<S: AsRef<str>>(
        asset_class: AssetClass,
        channel: Channel,
        tickers: &[S],
        all: bool,
    ) -> Result<Self, SubscriptionError> {
        if all {
            return Ok(Self {
                asset_class,
                topics: vec![Topic {
                    channel,
                    ticker: WILDCARD.to_string(),
                }],
            });
        }

        if tickers.is_empty() {
            return Err(SubscriptionError::InvalidSubscription(format!(
                "channel {} needs at least one ticker or the wildcard",
                channel.code()
            )));
        }

        let topics = tickers
            .iter()
            .map(|t| validate_ticker(t.as_ref()).map(|ticker| Topic { channel, ticker }))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            asset_class,
            topics,
        })
    }

    /// Append the topics of `other` after this subscription's topics.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::InvalidSubscription`] if the asset
    /// classes differ; one connection serves a single asset class.
    pub fn merge(mut self, other: Self) -> Result<Self, SubscriptionError> {
        if self.asset_class != other.asset_class {
            return Err(SubscriptionError::InvalidSubscription(format!(
                "cannot combine {} and {} topics on one connection",
                self.asset_class, other.asset_class
            )));
        }
        self.topics.extend(other.topics);
        Ok(self)
    }

    /// Asset class (endpoint) of the subscription.
    #[must_use]
    pub const fn asset_class(&self) -> AssetClass {
        self.asset_class
    }

    /// Topics in subscription order.
    #[must_use]
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Wire-format params string, e.g. `T.AAPL,Q.MSFT`.
    #[must_use]
    pub fn params(&self) -> String {
        self.topics
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.asset_class, self.params())
    }
}

/// Build the wire-format params string for one channel.
///
/// # Errors
///
/// See [`Subscription::build`].
pub fn build<S: AsRef<str>>(
    asset_class: AssetClass,
    channel: Channel,
    tickers: &[S],
    all: bool,
) -> Result<String, SubscriptionError> {
    Subscription::build(asset_class, channel, tickers, all).map(|s| s.params())
}

fn validate_ticker(raw: &str) -> Result<String, SubscriptionError> {
    let ticker = raw.trim();
    if ticker.is_empty() {
        return Err(SubscriptionError::InvalidSubscription(
            "ticker cannot be blank".to_string(),
        ));
    }
    if ticker.contains(',') || ticker.chars().any(char::is_whitespace) {
        return Err(SubscriptionError::InvalidSubscription(format!(
            "ticker {ticker:?} contains a separator"
        )));
    }
    Ok(ticker.to_string())
}
