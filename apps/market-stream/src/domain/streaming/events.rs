//! Market Data Events
//!
//! Typed payloads for every record kind the streaming service sends, and the
//! [`MarketEvent`] envelope the decoder produces for each record.
//!
//! Field names follow the compact wire schema (`sym`, `p`, `s`, ...) via
//! serde renames; the Rust names are the descriptive ones. Timestamps are
//! Unix epoch milliseconds as sent on the wire.
//!
//! # Wire Examples
//!
//! ```json
//! {"ev":"T","sym":"AAPL","x":11,"i":"52983525029461","z":3,"p":244.5,"s":100,"c":[12,37],"t":1700000000000,"q":1063}
//! {"ev":"Q","sym":"MSFT","bx":4,"bp":401.0,"bs":2,"ax":7,"ap":401.1,"as":3,"c":0,"t":1700000000001,"q":5061,"z":3}
//! {"ev":"AM","sym":"SPY","v":10204,"av":200304,"op":450.1,"vw":451.02,"o":450.9,"c":451.2,"h":451.3,"l":450.8,"a":450.7,"z":57,"s":1700000040000,"e":1700000100000}
//! {"ev":"FMV","sym":"AAPL","fmv":244.47,"t":1700000000002}
//! {"ev":"status","status":"auth_success","message":"authenticated"}
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

fn millis_to_utc(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

// =============================================================================
// Payloads
// =============================================================================

/// Executed trade (`T`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Ticker symbol.
    #[serde(rename = "sym")]
    pub symbol: String,

    /// Exchange ID.
    #[serde(rename = "x", default)]
    pub exchange: i32,

    /// Trade ID, unique per exchange and day.
    #[serde(rename = "i", default, skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<String>,

    /// Tape (1 = NYSE, 2 = AMEX, 3 = Nasdaq).
    #[serde(rename = "z", default, skip_serializing_if = "Option::is_none")]
    pub tape: Option<i32>,

    /// Trade price.
    #[serde(rename = "p")]
    pub price: Decimal,

    /// Trade size. Fractional for crypto.
    #[serde(rename = "s", default)]
    pub size: Decimal,

    /// Trade condition codes.
    #[serde(rename = "c", default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<i32>,

    /// Exchange timestamp, Unix milliseconds.
    ///
    /// The stream's `t` field is millisecond resolution; nanosecond SIP and
    /// participant times are only served by the REST trades endpoint.
    #[serde(rename = "t")]
    pub timestamp: i64,

    /// Sequence number, increasing per ticker.
    #[serde(rename = "q", default)]
    pub sequence_number: i64,
}

impl Trade {
    /// Exchange timestamp as UTC, `None` if out of range.
    #[must_use]
    pub fn time(&self) -> Option<DateTime<Utc>> {
        millis_to_utc(self.timestamp)
    }
}

/// Best bid and offer (`Q`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Ticker symbol.
    #[serde(rename = "sym")]
    pub symbol: String,

    /// Bid exchange ID.
    #[serde(rename = "bx", default)]
    pub bid_exchange: i32,

    /// Bid price.
    #[serde(rename = "bp")]
    pub bid_price: Decimal,

    /// Bid size.
    #[serde(rename = "bs", default)]
    pub bid_size: Decimal,

    /// Ask exchange ID.
    #[serde(rename = "ax", default)]
    pub ask_exchange: i32,

    /// Ask price.
    #[serde(rename = "ap")]
    pub ask_price: Decimal,

    /// Ask size.
    #[serde(rename = "as", default)]
    pub ask_size: Decimal,

    /// Quote condition.
    #[serde(rename = "c", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<i32>,

    /// Indicator codes.
    #[serde(rename = "i", default, skip_serializing_if = "Vec::is_empty")]
    pub indicators: Vec<i32>,

    /// Quote timestamp, Unix milliseconds.
    #[serde(rename = "t")]
    pub timestamp: i64,

    /// Sequence number, increasing per ticker.
    #[serde(rename = "q", default)]
    pub sequence_number: i64,

    /// Tape (1 = NYSE, 2 = AMEX, 3 = Nasdaq).
    #[serde(rename = "z", default, skip_serializing_if = "Option::is_none")]
    pub tape: Option<i32>,
}

impl Quote {
    /// Ask minus bid.
    #[must_use]
    pub fn spread(&self) -> Decimal {
        self.ask_price - self.bid_price
    }

    /// Quote timestamp as UTC, `None` if out of range.
    #[must_use]
    pub fn time(&self) -> Option<DateTime<Utc>> {
        millis_to_utc(self.timestamp)
    }
}

/// OHLCV aggregate over a one-second (`A`) or one-minute (`AM`) window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    /// Ticker symbol.
    #[serde(rename = "sym")]
    pub symbol: String,

    /// Volume traded in the window.
    #[serde(rename = "v", default)]
    pub volume: Decimal,

    /// Accumulated volume for the day.
    #[serde(rename = "av", default, skip_serializing_if = "Option::is_none")]
    pub accumulated_volume: Option<Decimal>,

    /// Official opening price of the day.
    #[serde(rename = "op", default, skip_serializing_if = "Option::is_none")]
    pub official_open: Option<Decimal>,

    /// Volume-weighted average price of the window.
    #[serde(rename = "vw", default, skip_serializing_if = "Option::is_none")]
    pub vwap: Option<Decimal>,

    /// Open price.
    #[serde(rename = "o")]
    pub open: Decimal,

    /// Close price.
    #[serde(rename = "c")]
    pub close: Decimal,

    /// High price.
    #[serde(rename = "h")]
    pub high: Decimal,

    /// Low price.
    #[serde(rename = "l")]
    pub low: Decimal,

    /// Volume-weighted average price of the day.
    #[serde(rename = "a", default, skip_serializing_if = "Option::is_none")]
    pub day_vwap: Option<Decimal>,

    /// Average trade size in the window.
    #[serde(rename = "z", default, skip_serializing_if = "Option::is_none")]
    pub average_size: Option<Decimal>,

    /// Number of trades in the window.
    #[serde(rename = "n", default, skip_serializing_if = "Option::is_none")]
    pub trade_count: Option<u64>,

    /// Window start, Unix milliseconds.
    #[serde(rename = "s")]
    pub start: i64,

    /// Window end, Unix milliseconds.
    #[serde(rename = "e")]
    pub end: i64,
}

impl Aggregate {
    /// Window start as UTC.
    #[must_use]
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        millis_to_utc(self.start)
    }

    /// Window end as UTC.
    #[must_use]
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        millis_to_utc(self.end)
    }
}

/// Computed fair market value (`FMV`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FairValue {
    /// Ticker symbol.
    #[serde(rename = "sym")]
    pub symbol: String,

    /// Fair market value.
    #[serde(rename = "fmv")]
    pub value: Decimal,

    /// Computation timestamp, Unix milliseconds.
    #[serde(rename = "t")]
    pub timestamp: i64,
}

impl FairValue {
    /// Computation timestamp as UTC.
    #[must_use]
    pub fn time(&self) -> Option<DateTime<Utc>> {
        millis_to_utc(self.timestamp)
    }
}

// =============================================================================
// Control Messages
// =============================================================================

/// Severity attached to control events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational (connected, authenticated, subscribed).
    Info,
    /// Something the user should see; the stream continues.
    Warning,
    /// Connection-level failure reported by the service.
    Error,
}

/// Service `status` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    /// Status code, e.g. `connected`, `auth_success`, `success`, `error`.
    pub status: String,

    /// Free-form detail, e.g. `subscribed to: T.AAPL`.
    #[serde(default)]
    pub message: String,
}

impl StatusMessage {
    /// Server accepted the API key.
    #[must_use]
    pub fn is_auth_success(&self) -> bool {
        self.status == "auth_success"
    }

    /// Server rejected the API key.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status.as_str(), "auth_failed" | "auth_timeout")
    }

    /// Severity of the status.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self.status.as_str() {
            "connected" | "auth_success" | "success" => Severity::Info,
            "auth_failed" | "auth_timeout" | "max_connections" => Severity::Error,
            _ => Severity::Warning,
        }
    }
}

/// Non-market-data events.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    /// Service status message.
    Status(StatusMessage),
    /// Record whose tag this client does not know.
    Unknown {
        /// The unrecognized `ev` tag.
        tag: String,
        /// Raw record.
        payload: serde_json::Value,
    },
}

impl ControlEvent {
    /// Severity of the control event.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::Status(status) => status.severity(),
            Self::Unknown { .. } => Severity::Info,
        }
    }
}

// =============================================================================
// Envelope
// =============================================================================

/// Kind of a [`MarketEvent`], used for routing labels and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Trade.
    Trade,
    /// Quote.
    Quote,
    /// Minute aggregate.
    MinuteAggregate,
    /// Second aggregate.
    SecondAggregate,
    /// Fair market value.
    FairValue,
    /// Control message.
    Control,
}

impl EventKind {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trade => "trade",
            Self::Quote => "quote",
            Self::MinuteAggregate => "minute_aggregate",
            Self::SecondAggregate => "second_aggregate",
            Self::FairValue => "fair_value",
            Self::Control => "control",
        }
    }
}

/// One decoded record.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketEvent {
    /// `T` record.
    Trade(Trade),
    /// `Q` record.
    Quote(Quote),
    /// `AM` record.
    MinuteAggregate(Aggregate),
    /// `A` record.
    SecondAggregate(Aggregate),
    /// `FMV` record.
    FairValue(FairValue),
    /// `status` or unrecognized record.
    Control(ControlEvent),
}

impl MarketEvent {
    /// Kind of the event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Trade(_) => EventKind::Trade,
            Self::Quote(_) => EventKind::Quote,
            Self::MinuteAggregate(_) => EventKind::MinuteAggregate,
            Self::SecondAggregate(_) => EventKind::SecondAggregate,
            Self::FairValue(_) => EventKind::FairValue,
            Self::Control(_) => EventKind::Control,
        }
    }

    /// Ticker the event refers to, if any.
    #[must_use]
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Self::Trade(t) => Some(&t.symbol),
            Self::Quote(q) => Some(&q.symbol),
            Self::MinuteAggregate(a) | Self::SecondAggregate(a) => Some(&a.symbol),
            Self::FairValue(f) => Some(&f.symbol),
            Self::Control(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_trade() {
        let json = r#"{"ev":"T","sym":"AAPL","x":11,"i":"52983525029461","z":3,"p":244.5,"s":100,"c":[12,37],"t":1700000000000,"q":1063}"#;
        let trade: Trade = serde_json::from_str(json).unwrap();
        assert_eq!(trade.symbol, "AAPL");
        assert_eq!(trade.exchange, 11);
        assert_eq!(trade.price, Decimal::new(24450, 2));
        assert_eq!(trade.size, Decimal::from(100));
        assert_eq!(trade.conditions, vec![12, 37]);
        assert_eq!(trade.sequence_number, 1063);
        assert_eq!(trade.time().unwrap().timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn deserialize_crypto_trade_with_fractional_size() {
        let json = r#"{"ev":"T","sym":"X:BTC-USD","x":1,"p":35123.5,"s":0.0042,"t":1700000000000}"#;
        let trade: Trade = serde_json::from_str(json).unwrap();
        assert_eq!(trade.size, Decimal::new(42, 4));
        assert!(trade.trade_id.is_none());
    }

    #[test]
    fn deserialize_quote() {
        let json = r#"{"ev":"Q","sym":"MSFT","bx":4,"bp":401.0,"bs":2,"ax":7,"ap":401.1,"as":3,"c":0,"t":1700000000001,"q":5061,"z":3}"#;
        let quote: Quote = serde_json::from_str(json).unwrap();
        assert_eq!(quote.bid_price, Decimal::new(40100, 2));
        assert_eq!(quote.ask_price, Decimal::new(4011, 1));
        assert_eq!(quote.spread(), Decimal::new(1, 1));
        assert_eq!(quote.condition, Some(0));
    }

    #[test]
    fn deserialize_minute_aggregate() {
        let json = r#"{"ev":"AM","sym":"SPY","v":10204,"av":200304,"op":450.1,"vw":451.02,"o":450.9,"c":451.2,"h":451.3,"l":450.8,"a":450.7,"z":57,"s":1700000040000,"e":1700000100000}"#;
        let agg: Aggregate = serde_json::from_str(json).unwrap();
        assert_eq!(agg.volume, Decimal::from(10204));
        assert_eq!(agg.vwap, Some(Decimal::new(45102, 2)));
        assert_eq!(agg.end - agg.start, 60_000);
        assert!(agg.trade_count.is_none());
    }

    #[test]
    fn deserialize_fair_value() {
        let json = r#"{"ev":"FMV","sym":"AAPL","fmv":244.47,"t":1700000000002}"#;
        let fmv: FairValue = serde_json::from_str(json).unwrap();
        assert_eq!(fmv.value, Decimal::new(24447, 2));
    }

    #[test]
    fn trade_without_price_is_rejected() {
        let json = r#"{"ev":"T","sym":"AAPL","s":100,"t":1700000000000}"#;
        assert!(serde_json::from_str::<Trade>(json).is_err());
    }

    #[test]
    fn status_severity() {
        let status = |s: &str| StatusMessage {
            status: s.to_string(),
            message: String::new(),
        };
        assert_eq!(status("auth_success").severity(), Severity::Info);
        assert_eq!(status("error").severity(), Severity::Warning);
        assert_eq!(status("max_connections").severity(), Severity::Error);
        assert!(status("auth_failed").is_auth_failure());
        assert!(status("auth_success").is_auth_success());
    }

    #[test]
    fn event_kind_and_symbol() {
        let event = MarketEvent::FairValue(FairValue {
            symbol: "AAPL".to_string(),
            value: Decimal::ONE,
            timestamp: 0,
        });
        assert_eq!(event.kind(), EventKind::FairValue);
        assert_eq!(event.symbol(), Some("AAPL"));

        let control = MarketEvent::Control(ControlEvent::Unknown {
            tag: "LV".to_string(),
            payload: serde_json::Value::Null,
        });
        assert_eq!(control.kind().as_str(), "control");
        assert_eq!(control.symbol(), None);
    }
}
