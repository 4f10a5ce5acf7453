//! Feed Codec
//!
//! Decodes the bridge's newline-delimited JSON envelopes into
//! [`FeedEvent`]s.
//!
//! # Envelope Format
//!
//! Each line is one object naming the event and carrying its payload:
//!
//! ```json
//! {"event":"trade","data":{"S":"AAPL","t":"2024-03-01T15:00:00Z","p":101.0,"s":100}}
//! {"event":"snapshot","data":{"dailyBar":{"t":"2024-03-01T05:00:00Z","c":100.0,...}}}
//! {"event":"symbol","data":"AAPL"}
//! ```
//!
//! Market data payloads use the Alpaca short field names. `bar`,
//! `clock-status` and `ready` are recognised and passed through as
//! [`FeedEvent::Ignored`].

use serde_json::Value;

use crate::application::ports::FeedEvent;
use crate::domain::market::{Asset, Quote, Snapshot, Trade};

/// Events the dashboard recognises but does not feed into the graph.
pub const IGNORED_EVENTS: [&str; 3] = ["bar", "clock-status", "ready"];

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Envelope names an event nobody handles.
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// Envelope is missing its name or payload.
    #[error("invalid envelope: {0}")]
    InvalidFormat(String),
}

/// JSON codec for feed envelopes.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvelopeCodec;

impl EnvelopeCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one line.
    ///
    /// Returns `Ok(None)` for blank lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is not a valid envelope or its payload
    /// does not match the named event.
    pub fn decode(&self, line: &str) -> Result<Option<FeedEvent>, CodecError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        if !trimmed.starts_with('{') {
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON object, got: {}...",
                trimmed.chars().take(50).collect::<String>()
            )));
        }

        let mut envelope: Value = serde_json::from_str(trimmed)?;
        let name = envelope
            .get("event")
            .and_then(Value::as_str)
            .ok_or_else(|| CodecError::InvalidFormat("missing \"event\" field".to_string()))?
            .to_string();

        if IGNORED_EVENTS.contains(&name.as_str()) {
            return Ok(Some(FeedEvent::Ignored(name)));
        }

        let data = envelope
            .get_mut("data")
            .map(Value::take)
            .ok_or_else(|| CodecError::InvalidFormat(format!("{name} without \"data\"")))?;

        let event = match name.as_str() {
            "trade" => FeedEvent::Trade(serde_json::from_value::<Trade>(data)?),
            "quote" => FeedEvent::Quote(serde_json::from_value::<Quote>(data)?),
            "snapshot" => FeedEvent::Snapshot(serde_json::from_value::<Snapshot>(data)?),
            "asset" => FeedEvent::Asset(serde_json::from_value::<Asset>(data)?),
            "symbol" => FeedEvent::Symbol(serde_json::from_value::<String>(data)?),
            _ => return Err(CodecError::UnknownEvent(name)),
        };

        Ok(Some(event))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(line: &str) -> Result<Option<FeedEvent>, CodecError> {
        EnvelopeCodec::new().decode(line)
    }

    #[test]
    fn decodes_trade() {
        let line = r#"{"event":"trade","data":{"S":"AAPL","t":"2024-03-01T15:00:00Z","p":101.25,"s":100,"i":52983525029461,"x":"V","c":["@"],"z":"C"}}"#;

        let Some(FeedEvent::Trade(trade)) = decode(line).unwrap() else {
            panic!("expected trade");
        };
        assert_eq!(trade.symbol, "AAPL");
        assert_eq!(trade.price, 101.25);
        assert_eq!(trade.size, 100);
        assert_eq!(trade.exchange.as_deref(), Some("V"));
    }

    #[test]
    fn decodes_quote() {
        let line = r#"{"event":"quote","data":{"S":"AAPL","t":"2024-03-01T15:00:00Z","bp":100.9,"bs":2,"ap":101.1,"as":3}}"#;

        let Some(FeedEvent::Quote(quote)) = decode(line).unwrap() else {
            panic!("expected quote");
        };
        assert_eq!(quote.bid_price, 100.9);
        assert_eq!(quote.ask_size, 3);
    }

    #[test]
    fn decodes_snapshot_with_missing_members() {
        let line = r#"{"event":"snapshot","data":{"dailyBar":{"t":"2024-03-01T05:00:00Z","o":99.0,"h":101.0,"l":98.5,"c":100.0,"v":1000,"n":10,"vw":99.8}}}"#;

        let Some(FeedEvent::Snapshot(snapshot)) = decode(line).unwrap() else {
            panic!("expected snapshot");
        };
        assert_eq!(snapshot.daily_bar.unwrap().close, 100.0);
        assert!(snapshot.prev_daily_bar.is_none());
        assert!(snapshot.latest_trade.is_none());
    }

    #[test]
    fn decodes_symbol_and_asset() {
        assert_eq!(
            decode(r#"{"event":"symbol","data":"msft"}"#).unwrap(),
            Some(FeedEvent::Symbol("msft".to_string()))
        );

        let line = r#"{"event":"asset","data":{"id":"b0b6dd9d","class":"us_equity","exchange":"NASDAQ","symbol":"AAPL","name":"Apple Inc. Common Stock","status":"active","tradable":true}}"#;
        let Some(FeedEvent::Asset(asset)) = decode(line).unwrap() else {
            panic!("expected asset");
        };
        assert_eq!(asset.name, "Apple Inc. Common Stock");
        assert!(asset.tradable);
        assert!(!asset.shortable);
    }

    #[test]
    fn ignored_events_need_no_payload() {
        assert_eq!(
            decode(r#"{"event":"ready"}"#).unwrap(),
            Some(FeedEvent::Ignored("ready".to_string()))
        );
        assert_eq!(
            decode(r#"{"event":"bar","data":{"t":"x"}}"#).unwrap(),
            Some(FeedEvent::Ignored("bar".to_string()))
        );
    }

    #[test]
    fn blank_line_is_skipped() {
        assert_eq!(decode("   ").unwrap(), None);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(decode("not json"), Err(CodecError::InvalidFormat(_))));
        assert!(matches!(decode("{oops"), Err(CodecError::Json(_))));
        assert!(matches!(
            decode(r#"{"data":{}}"#),
            Err(CodecError::InvalidFormat(_))
        ));
        assert!(matches!(
            decode(r#"{"event":"trade"}"#),
            Err(CodecError::InvalidFormat(_))
        ));
        assert!(matches!(
            decode(r#"{"event":"order","data":{}}"#),
            Err(CodecError::UnknownEvent(_))
        ));
        assert!(matches!(
            decode(r#"{"event":"trade","data":{"S":"AAPL"}}"#),
            Err(CodecError::Json(_))
        ));
    }
}
