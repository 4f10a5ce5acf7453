//! Port Interfaces
//!
//! Contracts between the dashboard core and the outside world, following
//! the Hexagonal Architecture pattern. Infrastructure adapters implement
//! them.
//!
//! ## Driven Ports (Outbound)
//!
//! - `Clock`: Source of the session's calendar date
//!
//! ## Driver Ports (Inbound)
//!
//! - `FeedSource`: Stream of market data events from the external bridge

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::market::{Asset, Quote, Snapshot, Trade};

// =============================================================================
// Clock
// =============================================================================

/// Supplies "today" for previous-close selection.
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    /// Current calendar date.
    fn today(&self) -> NaiveDate;
}

// =============================================================================
// Feed Events
// =============================================================================

/// An inbound event from the market data bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Live trade.
    Trade(Trade),
    /// Live quote.
    Quote(Quote),
    /// Fresh snapshot for the selected symbol.
    Snapshot(Snapshot),
    /// Asset metadata.
    Asset(Asset),
    /// User switched instrument.
    Symbol(String),
    /// A recognised event the dashboard graph has no use for.
    Ignored(String),
}

impl FeedEvent {
    /// Event name as used on the bridge.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Trade(_) => "trade",
            Self::Quote(_) => "quote",
            Self::Snapshot(_) => "snapshot",
            Self::Asset(_) => "asset",
            Self::Symbol(_) => "symbol",
            Self::Ignored(name) => name,
        }
    }
}

/// Errors reported by a [`FeedSource`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    /// A single event could not be decoded. The source stays usable.
    #[error("undecodable event at line {line}: {message}")]
    Decode {
        /// 1-based line number in the feed.
        line: u64,
        /// Decoder message.
        message: String,
    },

    /// The underlying transport failed. The source is finished.
    #[error("feed transport error: {0}")]
    Transport(String),
}

impl FeedError {
    /// Whether the source can keep producing events after this error.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

/// Inbound stream of feed events.
///
/// A source is acquired once per session and released with
/// [`FeedSource::close`] on shutdown.
#[async_trait]
pub trait FeedSource: Send {
    /// Wait for the next event. `Ok(None)` marks the end of the feed.
    async fn next_event(&mut self) -> Result<Option<FeedEvent>, FeedError>;

    /// Stop listening and release the underlying subscription.
    async fn close(&mut self);
}
