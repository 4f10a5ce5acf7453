//! Market Data Types
//!
//! Raw inputs of the dashboard graph: trades, quotes, snapshots and asset
//! metadata for a single instrument. Field names follow the Alpaca market
//! data wire format so feed payloads deserialize without translation.
//!
//! Timestamps stay as ISO-8601 strings. They are only interpreted where a
//! computation needs a calendar date (see [`calendar_date`]), so a malformed
//! timestamp degrades the one node that reads it instead of rejecting the
//! whole event.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Price Point
// =============================================================================

/// A single observed price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Observation time (ISO-8601).
    #[serde(rename = "t")]
    pub timestamp: String,

    /// Observed price.
    #[serde(rename = "p")]
    pub price: f64,
}

// =============================================================================
// Trade
// =============================================================================

/// Live trade for the selected symbol.
///
/// # Wire Format (JSON)
/// ```json
/// {
///   "S": "AAPL",
///   "i": 96921,
///   "x": "D",
///   "p": 126.55,
///   "s": 1,
///   "t": "2021-02-22T15:51:44.208Z",
///   "c": ["@", "I"],
///   "z": "C"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Ticker symbol (e.g., "AAPL")
    #[serde(rename = "S")]
    pub symbol: String,

    /// Trade timestamp (RFC-3339)
    #[serde(rename = "t")]
    pub timestamp: String,

    /// Trade price
    #[serde(rename = "p")]
    pub price: f64,

    /// Trade size (shares)
    #[serde(rename = "s", default)]
    pub size: u64,

    /// Trade ID (unique per exchange per day)
    #[serde(rename = "i", default)]
    pub trade_id: Option<i64>,

    /// Exchange code where the trade executed
    #[serde(rename = "x", default)]
    pub exchange: Option<String>,

    /// Trade condition codes
    #[serde(rename = "c", default)]
    pub conditions: Vec<String>,

    /// Tape: "A" (NYSE), "B" (ARCA/regional), "C" (NASDAQ)
    #[serde(rename = "z", default)]
    pub tape: Option<String>,
}

impl Trade {
    /// The trade as a bare price observation.
    #[must_use]
    pub fn price_point(&self) -> PricePoint {
        PricePoint {
            timestamp: self.timestamp.clone(),
            price: self.price,
        }
    }
}

// =============================================================================
// Quote
// =============================================================================

/// Live NBBO quote for the selected symbol.
///
/// # Wire Format (JSON)
/// ```json
/// {
///   "S": "AMD",
///   "bx": "U",
///   "bp": 87.66,
///   "bs": 1,
///   "ax": "Q",
///   "ap": 87.68,
///   "as": 4,
///   "t": "2021-02-22T15:51:45.335689322Z",
///   "c": ["R"],
///   "z": "C"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Ticker symbol
    #[serde(rename = "S")]
    pub symbol: String,

    /// Quote timestamp (RFC-3339)
    #[serde(rename = "t")]
    pub timestamp: String,

    /// Bid price
    #[serde(rename = "bp")]
    pub bid_price: f64,

    /// Bid size (round lots)
    #[serde(rename = "bs", default)]
    pub bid_size: u64,

    /// Ask price
    #[serde(rename = "ap")]
    pub ask_price: f64,

    /// Ask size (round lots)
    #[serde(rename = "as", default)]
    pub ask_size: u64,

    /// Bid exchange code
    #[serde(rename = "bx", default)]
    pub bid_exchange: Option<String>,

    /// Ask exchange code
    #[serde(rename = "ax", default)]
    pub ask_exchange: Option<String>,

    /// Quote condition codes
    #[serde(rename = "c", default)]
    pub conditions: Vec<String>,

    /// Tape
    #[serde(rename = "z", default)]
    pub tape: Option<String>,
}

// =============================================================================
// Snapshot
// =============================================================================

/// OHLCV bar as carried inside a snapshot.
///
/// # Wire Format (JSON)
/// ```json
/// {"t":"2024-03-01T05:00:00Z","o":178.2,"h":180.1,"l":177.4,"c":179.66,"v":73563082,"n":912345,"vw":179.1}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar timestamp (start of the bar period)
    #[serde(rename = "t")]
    pub timestamp: String,

    /// Open price
    #[serde(rename = "o")]
    pub open: f64,

    /// High price
    #[serde(rename = "h")]
    pub high: f64,

    /// Low price
    #[serde(rename = "l")]
    pub low: f64,

    /// Close price
    #[serde(rename = "c")]
    pub close: f64,

    /// Volume (shares)
    #[serde(rename = "v", default)]
    pub volume: u64,

    /// Number of trades in the bar
    #[serde(rename = "n", default)]
    pub trade_count: u64,

    /// Volume-weighted average price
    #[serde(rename = "vw", default)]
    pub vwap: f64,
}

impl Bar {
    /// Calendar date (UTC) the bar belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError`] if the bar timestamp is not a valid date.
    pub fn calendar_date(&self) -> Result<NaiveDate, TimestampError> {
        calendar_date(&self.timestamp)
    }
}

/// Latest trade inside a snapshot. Carries no symbol of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotTrade {
    /// Trade timestamp
    #[serde(rename = "t")]
    pub timestamp: String,

    /// Trade price
    #[serde(rename = "p")]
    pub price: f64,

    /// Trade size
    #[serde(rename = "s", default)]
    pub size: u64,

    /// Trade ID
    #[serde(rename = "i", default)]
    pub trade_id: Option<i64>,

    /// Exchange code
    #[serde(rename = "x", default)]
    pub exchange: Option<String>,

    /// Condition codes
    #[serde(rename = "c", default)]
    pub conditions: Vec<String>,

    /// Tape
    #[serde(rename = "z", default)]
    pub tape: Option<String>,
}

impl SnapshotTrade {
    /// Build a live-trade equivalent tagged with `symbol`.
    #[must_use]
    pub fn to_trade(&self, symbol: &str) -> Trade {
        Trade {
            symbol: symbol.to_string(),
            timestamp: self.timestamp.clone(),
            price: self.price,
            size: self.size,
            trade_id: self.trade_id,
            exchange: self.exchange.clone(),
            conditions: self.conditions.clone(),
            tape: self.tape.clone(),
        }
    }
}

/// Latest quote inside a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotQuote {
    /// Quote timestamp
    #[serde(rename = "t")]
    pub timestamp: String,

    /// Bid price
    #[serde(rename = "bp")]
    pub bid_price: f64,

    /// Bid size
    #[serde(rename = "bs", default)]
    pub bid_size: u64,

    /// Ask price
    #[serde(rename = "ap")]
    pub ask_price: f64,

    /// Ask size
    #[serde(rename = "as", default)]
    pub ask_size: u64,

    /// Bid exchange code
    #[serde(rename = "bx", default)]
    pub bid_exchange: Option<String>,

    /// Ask exchange code
    #[serde(rename = "ax", default)]
    pub ask_exchange: Option<String>,

    /// Condition codes
    #[serde(rename = "c", default)]
    pub conditions: Vec<String>,

    /// Tape
    #[serde(rename = "z", default)]
    pub tape: Option<String>,
}

/// Point-in-time market snapshot for one symbol.
///
/// Every member may be missing upstream (e.g. no trade yet for a fresh
/// listing), so all of them are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Most recent trade
    #[serde(default)]
    pub latest_trade: Option<SnapshotTrade>,

    /// Most recent quote
    #[serde(default)]
    pub latest_quote: Option<SnapshotQuote>,

    /// Current minute bar
    #[serde(default)]
    pub minute_bar: Option<Bar>,

    /// Current (or most recently completed) daily bar
    #[serde(default)]
    pub daily_bar: Option<Bar>,

    /// Daily bar of the session before `daily_bar`
    #[serde(default)]
    pub prev_daily_bar: Option<Bar>,
}

// =============================================================================
// Asset
// =============================================================================

/// Tradable asset metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Asset ID
    #[serde(default)]
    pub id: String,

    /// Asset class (e.g. "us_equity")
    #[serde(default)]
    pub class: String,

    /// Listing exchange
    #[serde(default)]
    pub exchange: String,

    /// Ticker symbol
    pub symbol: String,

    /// Full asset name (e.g. "Apple Inc. Common Stock")
    #[serde(default)]
    pub name: String,

    /// Asset status ("active" / "inactive")
    #[serde(default)]
    pub status: String,

    /// Whether the asset is tradable
    #[serde(default)]
    pub tradable: bool,

    /// Whether the asset is marginable
    #[serde(default)]
    pub marginable: bool,

    /// Whether the asset is shortable
    #[serde(default)]
    pub shortable: bool,

    /// Whether the asset is easy to borrow
    #[serde(default)]
    pub easy_to_borrow: bool,

    /// Whether the asset supports fractional shares
    #[serde(default)]
    pub fractionable: bool,
}

// =============================================================================
// Symbols and Dates
// =============================================================================

/// Normalize a user-entered symbol: trim and upper-case.
///
/// Returns `None` for a blank symbol.
#[must_use]
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() { None } else { Some(symbol) }
}

/// Timestamp that does not denote a calendar date.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed timestamp: {0:?}")]
pub struct TimestampError(pub String);

/// UTC calendar date of an ISO-8601 timestamp.
///
/// Accepts RFC-3339 timestamps (`2024-03-01T20:00:00Z`) and bare dates
/// (`2024-03-01`).
///
/// # Errors
///
/// Returns [`TimestampError`] if `timestamp` is neither.
pub fn calendar_date(timestamp: &str) -> Result<NaiveDate, TimestampError> {
    let trimmed = timestamp.trim();

    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(instant.with_timezone(&Utc).date_naive());
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| TimestampError(timestamp.to_string()))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn calendar_date_from_rfc3339() {
        assert_eq!(calendar_date("2024-03-01T20:00:00Z").unwrap(), date(2024, 3, 1));
        assert_eq!(
            calendar_date("2021-02-22T15:51:45.335689322Z").unwrap(),
            date(2021, 2, 22)
        );
    }

    #[test]
    fn calendar_date_converts_offsets_to_utc() {
        assert_eq!(
            calendar_date("2024-03-01T21:00:00-05:00").unwrap(),
            date(2024, 3, 2)
        );
    }

    #[test]
    fn calendar_date_from_bare_date() {
        assert_eq!(calendar_date("2024-03-04").unwrap(), date(2024, 3, 4));
    }

    #[test]
    fn calendar_date_rejects_garbage() {
        assert_eq!(
            calendar_date("yesterday"),
            Err(TimestampError("yesterday".to_string()))
        );
        assert!(calendar_date("").is_err());
        assert!(calendar_date("2024-13-01").is_err());
    }

    #[test]
    fn normalize_symbol_trims_and_uppercases() {
        assert_eq!(normalize_symbol("  aapl "), Some("AAPL".to_string()));
        assert_eq!(normalize_symbol("MSFT"), Some("MSFT".to_string()));
        assert_eq!(normalize_symbol("   "), None);
    }

    #[test]
    fn deserialize_trade() {
        let json = r#"{
            "S": "AAPL",
            "i": 96921,
            "x": "D",
            "p": 126.55,
            "s": 1,
            "t": "2021-02-22T15:51:44.208Z",
            "c": ["@", "I"],
            "z": "C"
        }"#;
        let trade: Trade = serde_json::from_str(json).unwrap();
        assert_eq!(trade.symbol, "AAPL");
        assert!((trade.price - 126.55).abs() < f64::EPSILON);
        assert_eq!(trade.size, 1);
        assert_eq!(trade.conditions, vec!["@", "I"]);
    }

    #[test]
    fn deserialize_quote() {
        let json = r#"{
            "S": "AMD",
            "bx": "U",
            "bp": 87.66,
            "bs": 1,
            "ax": "Q",
            "ap": 87.68,
            "as": 4,
            "t": "2021-02-22T15:51:45.335689322Z",
            "c": ["R"],
            "z": "C"
        }"#;
        let quote: Quote = serde_json::from_str(json).unwrap();
        assert_eq!(quote.symbol, "AMD");
        assert_eq!(quote.ask_size, 4);
        assert_eq!(quote.bid_exchange.as_deref(), Some("U"));
    }

    #[test]
    fn deserialize_snapshot_with_missing_members() {
        let json = r#"{
            "dailyBar": {"t":"2024-03-01T05:00:00Z","o":1.0,"h":2.0,"l":0.5,"c":1.5,"v":10,"n":3,"vw":1.2},
            "prevDailyBar": null
        }"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        assert!(snapshot.latest_trade.is_none());
        assert!(snapshot.prev_daily_bar.is_none());
        let daily = snapshot.daily_bar.unwrap();
        assert!((daily.close - 1.5).abs() < f64::EPSILON);
        assert_eq!(daily.calendar_date().unwrap(), date(2024, 3, 1));
    }

    #[test]
    fn snapshot_trade_tagged_with_symbol() {
        let latest = SnapshotTrade {
            timestamp: "2024-03-01T20:59:59Z".to_string(),
            price: 179.66,
            size: 100,
            trade_id: Some(7),
            exchange: Some("V".to_string()),
            conditions: vec![],
            tape: None,
        };

        let trade = latest.to_trade("AAPL");

        assert_eq!(trade.symbol, "AAPL");
        assert_eq!(trade.timestamp, latest.timestamp);
        assert_eq!(trade.size, 100);
        assert_eq!(trade.price_point().timestamp, latest.timestamp);
    }

    #[test]
    fn deserialize_asset_defaults() {
        let json = r#"{"symbol":"AAPL","name":"Apple Inc. Common Stock","tradable":true}"#;
        let asset: Asset = serde_json::from_str(json).unwrap();
        assert_eq!(asset.symbol, "AAPL");
        assert!(asset.tradable);
        assert!(!asset.shortable);
        assert!(asset.exchange.is_empty());
    }
}
