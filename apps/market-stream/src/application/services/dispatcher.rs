//! Event Dispatcher
//!
//! Routes each [`MarketEvent`] to the matching [`EventHandler`] callback.
//! Exhaustive over the closed event set; the payload is never inspected.

use crate::application::ports::EventHandler;
use crate::domain::streaming::{DecodeError, MarketEvent};

/// Invoke exactly one handler callback for `event`.
pub fn dispatch<H: EventHandler + ?Sized>(event: &MarketEvent, handler: &mut H) {
    match event {
        MarketEvent::Trade(trade) => handler.on_trade(trade),
        MarketEvent::Quote(quote) => handler.on_quote(quote),
        MarketEvent::MinuteAggregate(aggregate) => handler.on_minute_aggregate(aggregate),
        MarketEvent::SecondAggregate(aggregate) => handler.on_second_aggregate(aggregate),
        MarketEvent::FairValue(value) => handler.on_fair_value(value),
        MarketEvent::Control(control) => handler.on_control(control),
    }
}

/// Report a dropped record to the handler.
pub fn dispatch_decode_error<H: EventHandler + ?Sized>(error: &DecodeError, handler: &mut H) {
    handler.on_decode_error(error);
}
