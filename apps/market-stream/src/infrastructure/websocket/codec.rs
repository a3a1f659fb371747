//! Frame Decoder
//!
//! A text frame carries a JSON array of records (a bare object is accepted as
//! a one-record batch). Each record is routed on its `ev` tag:
//!
//! | `ev`     | Event                          |
//! |----------|--------------------------------|
//! | `T`      | [`MarketEvent::Trade`]          |
//! | `Q`      | [`MarketEvent::Quote`]          |
//! | `AM`     | [`MarketEvent::MinuteAggregate`]|
//! | `A`      | [`MarketEvent::SecondAggregate`]|
//! | `FMV`    | [`MarketEvent::FairValue`]      |
//! | `status` | [`ControlEvent::Status`]        |
//! | other    | [`ControlEvent::Unknown`]       |
//!
//! A record that fails to decode becomes a [`DecodeError`] in its slot; the
//! other records in the frame are unaffected. Only a frame that is not JSON,
//! or is neither an array nor an object, fails as a whole.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::domain::streaming::{ControlEvent, DecodeError, MarketEvent};

/// Whole-frame decode failures.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Frame is not valid JSON.
    #[error("invalid JSON frame: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame is JSON but not an array or object.
    #[error("invalid frame: expected array or object, got {0}")]
    InvalidFormat(&'static str),
}

/// Records of one frame, in wire order.
#[derive(Debug, Default)]
pub struct DecodedFrame {
    /// One slot per record.
    pub records: Vec<Result<MarketEvent, DecodeError>>,
}

impl DecodedFrame {
    /// Successfully decoded events.
    pub fn events(&self) -> impl Iterator<Item = &MarketEvent> {
        self.records.iter().filter_map(|r| r.as_ref().ok())
    }

    /// Dropped records.
    pub fn errors(&self) -> impl Iterator<Item = &DecodeError> {
        self.records.iter().filter_map(|r| r.as_ref().err())
    }

    /// Number of records in the frame.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the frame held no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Stateless JSON frame decoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameDecoder;

impl FrameDecoder {
    /// Create a decoder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if the frame is not a JSON array or object.
    pub fn decode(&self, text: &str) -> Result<DecodedFrame, CodecError> {
        let value: Value = serde_json::from_str(text.trim())?;
        Self::decode_value(value)
    }

    /// Decode a binary frame holding UTF-8 JSON.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if the frame is not a JSON array or object.
    pub fn decode_bytes(&self, data: &[u8]) -> Result<DecodedFrame, CodecError> {
        let value: Value = serde_json::from_slice(data)?;
        Self::decode_value(value)
    }

    /// Encode an outbound message.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Json`] if serialization fails.
    pub fn encode<T: serde::Serialize>(&self, message: &T) -> Result<String, CodecError> {
        Ok(serde_json::to_string(message)?)
    }

    fn decode_value(value: Value) -> Result<DecodedFrame, CodecError> {
        let items = match value {
            Value::Array(items) => items,
            object @ Value::Object(_) => vec![object],
            Value::Null => return Err(CodecError::InvalidFormat("null")),
            Value::Bool(_) => return Err(CodecError::InvalidFormat("boolean")),
            Value::Number(_) => return Err(CodecError::InvalidFormat("number")),
            Value::String(_) => return Err(CodecError::InvalidFormat("string")),
        };

        let records = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| decode_record(index, item))
            .collect();

        Ok(DecodedFrame { records })
    }
}

fn decode_record(index: usize, value: Value) -> Result<MarketEvent, DecodeError> {
    if !value.is_object() {
        return Err(DecodeError {
            index,
            tag: None,
            reason: "record is not a JSON object".to_string(),
        });
    }

    let Some(tag) = value.get("ev").and_then(Value::as_str).map(str::to_owned) else {
        return Err(DecodeError {
            index,
            tag: None,
            reason: "missing `ev` tag".to_string(),
        });
    };

    match tag.as_str() {
        "T" => payload(index, &tag, value).map(MarketEvent::Trade),
        "Q" => payload(index, &tag, value).map(MarketEvent::Quote),
        "AM" => payload(index, &tag, value).map(MarketEvent::MinuteAggregate),
        "A" => payload(index, &tag, value).map(MarketEvent::SecondAggregate),
        "FMV" => payload(index, &tag, value).map(MarketEvent::FairValue),
        "status" => payload(index, &tag, value)
            .map(|status| MarketEvent::Control(ControlEvent::Status(status))),
        other => Ok(MarketEvent::Control(ControlEvent::Unknown {
            tag: other.to_string(),
            payload: value,
        })),
    }
}

fn payload<T: DeserializeOwned>(index: usize, tag: &str, value: Value) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|e| DecodeError {
        index,
        tag: Some(tag.to_string()),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use test_case::test_case;

    use super::*;
    use crate::domain::streaming::Severity;

    fn decode(text: &str) -> DecodedFrame {
        FrameDecoder::new().decode(text).unwrap()
    }

    #[test]
    fn decode_trade_and_quote_batch() {
        let frame = decode(
            r#"[
                {"ev":"T","sym":"AAPL","x":11,"i":"1","z":3,"p":244.5,"s":100,"c":[12],"t":1700000000000,"q":1},
                {"ev":"Q","sym":"MSFT","bx":4,"bp":401.0,"bs":2,"ax":7,"ap":401.1,"as":3,"t":1700000000001,"q":2,"z":3}
            ]"#,
        );

        let events: Vec<_> = frame.events().collect();
        assert_eq!(events.len(), 2);
        match events[0] {
            MarketEvent::Trade(trade) => {
                assert_eq!(trade.symbol, "AAPL");
                assert_eq!(trade.price, Decimal::new(2445, 1));
            }
            other => panic!("expected trade, got {other:?}"),
        }
        match events[1] {
            MarketEvent::Quote(quote) => assert_eq!(quote.symbol, "MSFT"),
            other => panic!("expected quote, got {other:?}"),
        }
        assert_eq!(frame.errors().count(), 0);
    }

    #[test]
    fn decode_single_object_as_batch() {
        let frame = decode(r#"{"ev":"status","status":"connected","message":"Connected Successfully"}"#);
        assert_eq!(frame.len(), 1);
        match frame.events().next() {
            Some(MarketEvent::Control(ControlEvent::Status(status))) => {
                assert_eq!(status.status, "connected");
                assert_eq!(status.severity(), Severity::Info);
            }
            other => panic!("expected status, got {other:?}"),
        }
    }

    #[test]
    fn malformed_record_does_not_drop_batch() {
        let frame = decode(
            r#"[
                {"ev":"T","sym":"AAPL","p":"not a price","t":1},
                {"ev":"FMV","sym":"AAPL","fmv":244.47,"t":1700000000002}
            ]"#,
        );

        assert_eq!(frame.len(), 2);
        let errors: Vec<_> = frame.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].index, 0);
        assert_eq!(errors[0].tag.as_deref(), Some("T"));

        let events: Vec<_> = frame.events().collect();
        assert!(matches!(events[0], MarketEvent::FairValue(_)));
    }

    #[test]
    fn unknown_tag_becomes_control_event() {
        let frame = decode(r#"[{"ev":"LULD","T":"AAPL","h":250.0}]"#);
        match frame.events().next() {
            Some(MarketEvent::Control(ControlEvent::Unknown { tag, payload })) => {
                assert_eq!(tag, "LULD");
                assert_eq!(payload["T"], "AAPL");
            }
            other => panic!("expected unknown control event, got {other:?}"),
        }
    }

    #[test_case(r#"[{"sym":"AAPL"}]"#, "missing `ev` tag" ; "missing tag")]
    #[test_case(r#"[{"ev":7}]"#, "missing `ev` tag" ; "non string tag")]
    #[test_case("[42]", "record is not a JSON object" ; "scalar record")]
    fn record_level_errors(text: &str, reason: &str) {
        let frame = decode(text);
        let error = frame.errors().next().unwrap();
        assert_eq!(error.tag, None);
        assert_eq!(error.reason, reason);
    }

    #[test_case("not json" ; "garbage")]
    #[test_case("42" ; "number")]
    #[test_case("\"hello\"" ; "string")]
    #[test_case("null" ; "null")]
    fn frame_level_errors(text: &str) {
        assert!(FrameDecoder::new().decode(text).is_err());
    }

    #[test]
    fn empty_array_is_empty_frame() {
        assert!(decode("[]").is_empty());
    }

    #[test]
    fn aggregates_route_by_tag() {
        let frame = decode(
            r#"[
                {"ev":"AM","sym":"SPY","v":10,"o":1,"c":2,"h":3,"l":0.5,"s":1700000040000,"e":1700000100000},
                {"ev":"A","sym":"SPY","v":1,"o":1,"c":1,"h":1,"l":1,"s":1700000040000,"e":1700000041000}
            ]"#,
        );
        let events: Vec<_> = frame.events().collect();
        assert!(matches!(events[0], MarketEvent::MinuteAggregate(_)));
        assert!(matches!(events[1], MarketEvent::SecondAggregate(_)));
    }

    #[test]
    fn decode_bytes_matches_text() {
        let frame = FrameDecoder::new()
            .decode_bytes(br#"[{"ev":"status","status":"auth_success","message":"authenticated"}]"#)
            .unwrap();
        assert_eq!(frame.events().count(), 1);
    }
}
