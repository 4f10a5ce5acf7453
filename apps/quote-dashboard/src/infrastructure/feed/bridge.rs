//! Feed Bridge
//!
//! Drives a [`DashboardSession`] from a [`FeedSource`]. The bridge is the
//! single owner of the session: each inbound event becomes one synchronous
//! propagation batch on the bridge task.
//!
//! # Event Routing
//!
//! | Event      | Action                                             |
//! |------------|----------------------------------------------------|
//! | `symbol`   | `set_symbol` (normalised, same symbol is a no-op)  |
//! | `snapshot` | `set_snapshot`                                     |
//! | `trade`    | `set_trade` if tagged with the current symbol       |
//! | `quote`    | `set_quote` if tagged with the current symbol       |
//! | `asset`    | `set_asset` if tagged with the current symbol       |
//! | ignored    | counted only                                       |
//!
//! Events for another symbol arrive around a symbol switch and are dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{FeedError, FeedEvent, FeedSource};
use crate::application::services::DashboardSession;
use crate::domain::dashboard::NodeId;
use crate::domain::market::normalize_symbol;
use crate::domain::propagation::BatchOutcome;
use crate::infrastructure::metrics::{self, DropReason};

// =============================================================================
// Bridge State
// =============================================================================

/// Lifecycle of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Created, not yet reading.
    Idle,
    /// Reading events.
    Listening,
    /// Feed ended or shut down.
    Stopped,
    /// Feed failed.
    Failed,
}

impl BridgeState {
    /// State name for health reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

/// Shared counters of a running bridge, read by the health server.
#[derive(Debug)]
pub struct BridgeStats {
    state: RwLock<BridgeState>,
    symbol: RwLock<Option<String>>,
    last_event_at: RwLock<Option<DateTime<Utc>>>,
    error_message: RwLock<Option<String>>,
    events_received: AtomicU64,
    events_applied: AtomicU64,
    events_dropped: AtomicU64,
    decode_errors: AtomicU64,
    batches: AtomicU64,
}

impl Default for BridgeStats {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeStats {
    /// Fresh stats in the idle state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: RwLock::new(BridgeState::Idle),
            symbol: RwLock::new(None),
            last_event_at: RwLock::new(None),
            error_message: RwLock::new(None),
            events_received: AtomicU64::new(0),
            events_applied: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            batches: AtomicU64::new(0),
        }
    }

    /// Set the lifecycle state.
    pub fn set_state(&self, state: BridgeState) {
        *self.state.write() = state;
    }

    /// Enter the failed state with a message.
    pub fn set_error(&self, message: String) {
        *self.state.write() = BridgeState::Failed;
        *self.error_message.write() = Some(message);
    }

    fn set_symbol(&self, symbol: Option<&str>) {
        let mut current = self.symbol.write();
        if current.as_deref() != symbol {
            *current = symbol.map(str::to_string);
        }
    }

    fn record_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
        *self.last_event_at.write() = Some(Utc::now());
    }

    fn record_applied(&self, batches: u64) {
        self.events_applied.fetch_add(1, Ordering::Relaxed);
        self.batches.store(batches, Ordering::Relaxed);
    }

    fn record_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BridgeState {
        *self.state.read()
    }

    /// Currently selected symbol.
    #[must_use]
    pub fn symbol(&self) -> Option<String> {
        self.symbol.read().clone()
    }

    /// Time the last event arrived.
    #[must_use]
    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        *self.last_event_at.read()
    }

    /// Last fatal feed error.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.error_message.read().clone()
    }

    /// Events read from the feed.
    #[must_use]
    pub fn events_received(&self) -> u64 {
        self.events_received.load(Ordering::Relaxed)
    }

    /// Events applied to the session.
    #[must_use]
    pub fn events_applied(&self) -> u64 {
        self.events_applied.load(Ordering::Relaxed)
    }

    /// Events dropped (stale symbol, no symbol, ignored kinds).
    #[must_use]
    pub fn events_dropped(&self) -> u64 {
        self.events_dropped.load(Ordering::Relaxed)
    }

    /// Lines that failed to decode.
    #[must_use]
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    /// Propagation batches applied by the session.
    #[must_use]
    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Bridge
// =============================================================================

/// Feeds events into a dashboard session.
#[derive(Debug)]
pub struct FeedBridge {
    session: DashboardSession,
    stats: Arc<BridgeStats>,
}

impl FeedBridge {
    /// Wrap a session.
    #[must_use]
    pub fn new(session: DashboardSession) -> Self {
        let stats = Arc::new(BridgeStats::new());
        stats.set_symbol(session.symbol());
        Self { session, stats }
    }

    /// Shared stats handle.
    #[must_use]
    pub fn stats(&self) -> Arc<BridgeStats> {
        Arc::clone(&self.stats)
    }

    /// The driven session.
    #[must_use]
    pub const fn session(&self) -> &DashboardSession {
        &self.session
    }

    /// Mutable access to the session, e.g. to subscribe before running.
    pub fn session_mut(&mut self) -> &mut DashboardSession {
        &mut self.session
    }

    /// Give the session back.
    #[must_use]
    pub fn into_session(self) -> DashboardSession {
        self.session
    }

    /// Route one event. Returns the batch outcome, or `None` if the event
    /// was dropped.
    pub fn handle(&mut self, event: FeedEvent) -> Option<BatchOutcome<NodeId>> {
        self.stats.record_received();
        metrics::record_event_received(event.kind());

        if let Some(reason) = self.drop_reason(&event) {
            tracing::debug!(kind = event.kind(), reason = reason.as_str(), "event dropped");
            self.stats.record_dropped();
            metrics::record_event_dropped(reason);
            return None;
        }

        let started = Instant::now();
        let outcome = match event {
            FeedEvent::Symbol(symbol) => self.session.set_symbol(&symbol),
            FeedEvent::Snapshot(snapshot) => self.session.set_snapshot(snapshot),
            FeedEvent::Trade(trade) => self.session.set_trade(trade),
            FeedEvent::Quote(quote) => self.session.set_quote(quote),
            FeedEvent::Asset(asset) => self.session.set_asset(asset),
            FeedEvent::Ignored(_) => return None,
        };

        metrics::record_batch(outcome.recomputed, started.elapsed());
        self.stats.record_applied(self.session.batches());
        self.stats.set_symbol(self.session.symbol());

        Some(outcome)
    }

    fn drop_reason(&self, event: &FeedEvent) -> Option<DropReason> {
        let tagged = match event {
            FeedEvent::Trade(t) => &t.symbol,
            FeedEvent::Quote(q) => &q.symbol,
            FeedEvent::Asset(a) => &a.symbol,
            FeedEvent::Ignored(_) => return Some(DropReason::Ignored),
            FeedEvent::Symbol(_) | FeedEvent::Snapshot(_) => return None,
        };

        match self.session.symbol() {
            None => Some(DropReason::NoSymbol),
            Some(current) if normalize_symbol(tagged).as_deref() != Some(current) => {
                Some(DropReason::StaleSymbol)
            }
            Some(_) => None,
        }
    }

    /// Read events from `source` until the feed ends or `cancel` fires.
    ///
    /// Undecodable lines are logged and skipped. The source is closed on
    /// every exit path.
    ///
    /// # Errors
    ///
    /// Returns the source's error if the transport fails.
    pub async fn run<S>(&mut self, source: &mut S, cancel: CancellationToken) -> Result<(), FeedError>
    where
        S: FeedSource + ?Sized,
    {
        self.stats.set_state(BridgeState::Listening);
        tracing::info!(symbol = ?self.session.symbol(), "feed bridge listening");

        let result = loop {
            let next = tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("feed bridge cancelled");
                    break Ok(());
                }
                next = source.next_event() => next,
            };

            match next {
                Ok(Some(event)) => {
                    self.handle(event);
                }
                Ok(None) => {
                    tracing::info!("feed ended");
                    break Ok(());
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(error = %e, "skipping undecodable event");
                    self.stats.record_decode_error();
                    metrics::record_decode_error();
                }
                Err(e) => break Err(e),
            }
        };

        source.close().await;

        match &result {
            Ok(()) => self.stats.set_state(BridgeState::Stopped),
            Err(e) => {
                tracing::error!(error = %e, "feed failed");
                self.stats.set_error(e.to_string());
            }
        }

        tracing::info!(
            received = self.stats.events_received(),
            applied = self.stats.events_applied(),
            dropped = self.stats.events_dropped(),
            decode_errors = self.stats.decode_errors(),
            "feed bridge stopped"
        );

        result
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::market::{Asset, Trade};
    use crate::infrastructure::clock::FixedClock;

    fn bridge() -> FeedBridge {
        let clock = FixedClock(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        FeedBridge::new(DashboardSession::with_defaults(Arc::new(clock)).unwrap())
    }

    fn trade(symbol: &str, price: f64) -> FeedEvent {
        FeedEvent::Trade(Trade {
            symbol: symbol.to_string(),
            timestamp: "2024-03-01T15:00:00Z".to_string(),
            price,
            ..Trade::default()
        })
    }

    #[test]
    fn trades_before_a_symbol_are_dropped() {
        let mut bridge = bridge();

        assert!(bridge.handle(trade("AAPL", 101.0)).is_none());
        assert_eq!(bridge.stats().events_dropped(), 1);
        assert!(bridge.session().latest_trade().is_none());
    }

    #[test]
    fn stale_symbol_events_are_dropped() {
        let mut bridge = bridge();
        bridge.handle(FeedEvent::Symbol("msft".to_string()));

        assert!(bridge.handle(trade("AAPL", 101.0)).is_none());
        assert!(
            bridge
                .handle(FeedEvent::Asset(Asset {
                    symbol: "AAPL".to_string(),
                    ..Asset::default()
                }))
                .is_none()
        );

        let outcome = bridge.handle(trade("MSFT", 400.0)).unwrap();
        assert!(outcome.changed.contains(&NodeId::Trade));

        let stats = bridge.stats();
        assert_eq!(stats.symbol().as_deref(), Some("MSFT"));
        assert_eq!(stats.events_received(), 4);
        assert_eq!(stats.events_applied(), 2);
        assert_eq!(stats.events_dropped(), 2);
        assert!(stats.last_event_at().is_some());
    }

    #[test]
    fn ignored_events_are_counted() {
        let mut bridge = bridge();
        assert!(bridge.handle(FeedEvent::Ignored("ready".to_string())).is_none());
        assert_eq!(bridge.stats().events_dropped(), 1);
        assert_eq!(bridge.session().batches(), 0);
    }

    #[test]
    fn state_names() {
        assert_eq!(BridgeState::Idle.as_str(), "idle");
        assert_eq!(BridgeState::Listening.as_str(), "listening");
        assert_eq!(BridgeState::Stopped.as_str(), "stopped");
        assert_eq!(BridgeState::Failed.as_str(), "failed");
        assert_eq!(BridgeStats::default().state(), BridgeState::Idle);
    }
}
