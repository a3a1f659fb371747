//! Renderers
//!
//! [`EventHandler`] implementations that print market data to a writer
//! (stdout in the binary). Control events and decode errors keep the default
//! handler behavior and go to the log on stderr.
//!
//! A failed write (e.g. a closed pipe) cancels the stream when a token is
//! attached, since nobody is reading the output anymore.

use std::collections::HashSet;
use std::io::Write;

use chrono::SecondsFormat;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::application::ports::EventHandler;
use crate::domain::streaming::{Aggregate, EventKind, FairValue, Quote, Trade};

fn format_millis(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis).map_or_else(
        || millis.to_string(),
        |t| t.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

fn format_opt<T: ToString>(value: Option<&T>) -> String {
    value.map_or_else(|| "-".to_string(), ToString::to_string)
}

/// Shared write-failure handling.
#[derive(Debug)]
struct Output<W> {
    out: W,
    cancel: Option<CancellationToken>,
    failed: bool,
}

impl<W: Write> Output<W> {
    fn line(&mut self, line: &str) {
        if self.failed {
            return;
        }
        if let Err(e) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            self.failed = true;
            tracing::warn!(error = %e, "Output closed, stopping stream");
            if let Some(cancel) = &self.cancel {
                cancel.cancel();
            }
        }
    }
}

// =============================================================================
// Table
// =============================================================================

/// Aligned columns, with a header line the first time each event kind appears.
#[derive(Debug)]
pub struct TableRenderer<W: Write> {
    output: Output<W>,
    headers: HashSet<EventKind>,
}

impl<W: Write> TableRenderer<W> {
    /// Render to `out`.
    pub fn new(out: W) -> Self {
        Self {
            output: Output {
                out,
                cancel: None,
                failed: false,
            },
            headers: HashSet::new(),
        }
    }

    /// Cancel `token` if a write fails.
    #[must_use]
    pub fn cancel_on_write_error(mut self, token: CancellationToken) -> Self {
        self.output.cancel = Some(token);
        self
    }

    /// Consume the renderer and return the writer.
    pub fn into_inner(self) -> W {
        self.output.out
    }

    fn header(&mut self, kind: EventKind, header: &str) {
        if self.headers.insert(kind) {
            self.output.line(header);
        }
    }

    fn aggregate(&mut self, kind: EventKind, code: &str, agg: &Aggregate) {
        self.header(
            kind,
            &format!(
                "{:<3} {:<10} {:>12} {:>12} {:>12} {:>12} {:>14} {:>12}  {}",
                "EV", "SYMBOL", "OPEN", "HIGH", "LOW", "CLOSE", "VOLUME", "VWAP", "START"
            ),
        );
        self.output.line(&format!(
            "{:<3} {:<10} {:>12} {:>12} {:>12} {:>12} {:>14} {:>12}  {}",
            code,
            agg.symbol,
            agg.open,
            agg.high,
            agg.low,
            agg.close,
            agg.volume,
            format_opt(agg.vwap.as_ref()),
            format_millis(agg.start),
        ));
    }
}

impl<W: Write> EventHandler for TableRenderer<W> {
    fn on_trade(&mut self, trade: &Trade) {
        self.header(
            EventKind::Trade,
            &format!(
                "{:<3} {:<10} {:>12} {:>12} {:>4}  {}",
                "EV", "SYMBOL", "PRICE", "SIZE", "EXCH", "TIME"
            ),
        );
        self.output.line(&format!(
            "{:<3} {:<10} {:>12} {:>12} {:>4}  {}",
            "T",
            trade.symbol,
            trade.price,
            trade.size,
            trade.exchange,
            format_millis(trade.timestamp),
        ));
    }

    fn on_quote(&mut self, quote: &Quote) {
        self.header(
            EventKind::Quote,
            &format!(
                "{:<3} {:<10} {:>12} {:>10} {:>12} {:>10}  {}",
                "EV", "SYMBOL", "BID", "BID SIZE", "ASK", "ASK SIZE", "TIME"
            ),
        );
        self.output.line(&format!(
            "{:<3} {:<10} {:>12} {:>10} {:>12} {:>10}  {}",
            "Q",
            quote.symbol,
            quote.bid_price,
            quote.bid_size,
            quote.ask_price,
            quote.ask_size,
            format_millis(quote.timestamp),
        ));
    }

    fn on_minute_aggregate(&mut self, aggregate: &Aggregate) {
        self.aggregate(EventKind::MinuteAggregate, "AM", aggregate);
    }

    fn on_second_aggregate(&mut self, aggregate: &Aggregate) {
        self.aggregate(EventKind::SecondAggregate, "A", aggregate);
    }

    fn on_fair_value(&mut self, value: &FairValue) {
        self.header(
            EventKind::FairValue,
            &format!("{:<3} {:<10} {:>12}  {}", "EV", "SYMBOL", "FMV", "TIME"),
        );
        self.output.line(&format!(
            "{:<3} {:<10} {:>12}  {}",
            "FMV",
            value.symbol,
            value.value,
            format_millis(value.timestamp),
        ));
    }
}

// =============================================================================
// JSON Lines
// =============================================================================

/// One JSON object per line, wire field names, `ev` tag included.
#[derive(Debug)]
pub struct JsonRenderer<W: Write> {
    output: Output<W>,
}

impl<W: Write> JsonRenderer<W> {
    /// Render to `out`.
    pub fn new(out: W) -> Self {
        Self {
            output: Output {
                out,
                cancel: None,
                failed: false,
            },
        }
    }

    /// Cancel `token` if a write fails.
    #[must_use]
    pub fn cancel_on_write_error(mut self, token: CancellationToken) -> Self {
        self.output.cancel = Some(token);
        self
    }

    /// Consume the renderer and return the writer.
    pub fn into_inner(self) -> W {
        self.output.out
    }

    fn emit<T: Serialize>(&mut self, tag: &str, payload: &T) {
        let mut value = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, tag, "Failed to serialize event");
                return;
            }
        };
        if let Some(object) = value.as_object_mut() {
            object.insert("ev".to_string(), serde_json::Value::from(tag));
        }
        self.output.line(&value.to_string());
    }
}

impl<W: Write> EventHandler for JsonRenderer<W> {
    fn on_trade(&mut self, trade: &Trade) {
        self.emit("T", trade);
    }

    fn on_quote(&mut self, quote: &Quote) {
        self.emit("Q", quote);
    }

    fn on_minute_aggregate(&mut self, aggregate: &Aggregate) {
        self.emit("AM", aggregate);
    }

    fn on_second_aggregate(&mut self, aggregate: &Aggregate) {
        self.emit("A", aggregate);
    }

    fn on_fair_value(&mut self, value: &FairValue) {
        self.emit("FMV", value);
    }
}
