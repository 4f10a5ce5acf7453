//! Dashboard Session Service
//!
//! Owns one dashboard graph and exposes the leaf entry points. Every entry
//! point is one propagation batch that also refreshes the session date from
//! the injected [`Clock`], so a day rollover is picked up by the next event.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::application::ports::Clock;
use crate::domain::dashboard::{NodeId, NodeValue, build_graph};
use crate::domain::diff::PriceDiff;
use crate::domain::format::{NumberFormat, UsdFormat};
use crate::domain::market::{Asset, Bar, Quote, Snapshot, Trade, normalize_symbol};
use crate::domain::previous_close::PreviousClosePolicy;
use crate::domain::propagation::{
    BatchOutcome, GraphError, NodeUpdate, PropagationGraph, Subscription, SubscriptionId,
};

/// Subscription to a dashboard node.
pub type DashboardSubscription = Subscription<NodeId, NodeValue>;

/// Update delivered to a dashboard subscriber.
pub type DashboardUpdate = NodeUpdate<NodeId, NodeValue>;

/// One dashboard per application session.
pub struct DashboardSession {
    graph: PropagationGraph<NodeId, NodeValue>,
    clock: Arc<dyn Clock>,
    policy: PreviousClosePolicy,
}

impl DashboardSession {
    /// Create a session.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] if the dashboard graph fails validation.
    pub fn new(
        policy: PreviousClosePolicy,
        format: Arc<dyn NumberFormat>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, GraphError> {
        let graph = build_graph(policy, format)?;
        tracing::debug!(policy = policy.as_str(), "dashboard session created");
        Ok(Self {
            graph,
            clock,
            policy,
        })
    }

    /// Create a session with the wall-clock policy and USD formatting.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] if the dashboard graph fails validation.
    pub fn with_defaults(clock: Arc<dyn Clock>) -> Result<Self, GraphError> {
        Self::new(PreviousClosePolicy::default(), Arc::new(UsdFormat), clock)
    }

    /// Previous-close policy in effect.
    #[must_use]
    pub const fn policy(&self) -> PreviousClosePolicy {
        self.policy
    }

    // =========================================================================
    // Leaf Entry Points
    // =========================================================================

    /// Replace the live trade.
    pub fn set_trade(&mut self, trade: Trade) -> BatchOutcome<NodeId> {
        self.write([(NodeId::Trade, Some(NodeValue::Trade(trade)))])
    }

    /// Replace the live quote.
    pub fn set_quote(&mut self, quote: Quote) -> BatchOutcome<NodeId> {
        self.write([(NodeId::Quote, Some(NodeValue::Quote(quote)))])
    }

    /// Replace the snapshot.
    pub fn set_snapshot(&mut self, snapshot: Snapshot) -> BatchOutcome<NodeId> {
        self.write([(NodeId::Snapshot, Some(NodeValue::Snapshot(snapshot)))])
    }

    /// Replace the asset metadata.
    pub fn set_asset(&mut self, asset: Asset) -> BatchOutcome<NodeId> {
        self.write([(NodeId::Asset, Some(NodeValue::Asset(asset)))])
    }

    /// Switch instrument.
    ///
    /// The symbol is trimmed and upper-cased; a blank symbol is ignored.
    /// Selecting a new symbol clears the trade, quote, snapshot and asset in
    /// the same batch. Re-selecting the current symbol only refreshes the
    /// session date.
    pub fn set_symbol(&mut self, symbol: &str) -> BatchOutcome<NodeId> {
        let Some(symbol) = normalize_symbol(symbol) else {
            tracing::debug!(raw = symbol, "ignoring blank symbol");
            return self.refresh_session_date();
        };

        if self.symbol() == Some(symbol.as_str()) {
            return self.refresh_session_date();
        }

        tracing::info!(symbol = %symbol, "symbol selected");

        let mut writes = vec![(NodeId::Symbol, Some(NodeValue::Symbol(symbol)))];
        writes.extend(NodeId::SYMBOL_SCOPED.iter().map(|&node| (node, None)));
        self.write(writes)
    }

    /// Re-read today's date from the clock.
    pub fn refresh_session_date(&mut self) -> BatchOutcome<NodeId> {
        self.write([])
    }

    fn write<I>(&mut self, writes: I) -> BatchOutcome<NodeId>
    where
        I: IntoIterator<Item = (NodeId, Option<NodeValue>)>,
    {
        let today = self.clock.today();
        let batch = std::iter::once((NodeId::SessionDate, Some(NodeValue::Date(today))))
            .chain(writes);

        match self.graph.apply(batch) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "dashboard batch rejected");
                BatchOutcome {
                    batch: self.graph.batches(),
                    changed: Vec::new(),
                    recomputed: 0,
                }
            }
        }
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Subscribe to a node. The current value is delivered first.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownNode`] if the node is not in the graph.
    pub fn subscribe(&mut self, node: NodeId) -> Result<DashboardSubscription, GraphError> {
        self.graph.subscribe(node)
    }

    /// Stop delivery to a subscription. Returns `false` if it was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.graph.unsubscribe(id)
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.graph.subscriber_count()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current value of a node.
    #[must_use]
    pub fn value(&self, node: NodeId) -> Option<&NodeValue> {
        self.graph.get(node)
    }

    /// Selected symbol.
    #[must_use]
    pub fn symbol(&self) -> Option<&str> {
        self.value(NodeId::Symbol).and_then(NodeValue::as_symbol)
    }

    /// Date the session currently considers "today".
    #[must_use]
    pub fn session_date(&self) -> Option<NaiveDate> {
        self.value(NodeId::SessionDate).and_then(NodeValue::as_date)
    }

    /// Live trade, or the snapshot's latest trade.
    #[must_use]
    pub fn latest_trade(&self) -> Option<&Trade> {
        self.value(NodeId::LatestTrade).and_then(NodeValue::as_trade)
    }

    /// Bar anchoring the intraday diff.
    #[must_use]
    pub fn effective_previous_close(&self) -> Option<&Bar> {
        self.value(NodeId::EffectivePreviousClose)
            .and_then(NodeValue::as_bar)
    }

    /// Change from the previous close to the live trade.
    #[must_use]
    pub fn intraday_diff(&self) -> Option<&PriceDiff> {
        self.value(NodeId::IntradayDiff).and_then(NodeValue::as_diff)
    }

    /// Short asset name.
    #[must_use]
    pub fn asset_short_name(&self) -> Option<&str> {
        self.value(NodeId::AssetShortName)
            .and_then(NodeValue::as_text)
    }

    /// Display string of a formatted node.
    #[must_use]
    pub fn text(&self, node: NodeId) -> Option<&str> {
        self.value(node).and_then(NodeValue::as_text)
    }

    /// How often a derived node has been recomputed.
    #[must_use]
    pub fn recomputations(&self, node: NodeId) -> u64 {
        self.graph.recomputations(node)
    }

    /// Number of batches applied so far.
    #[must_use]
    pub const fn batches(&self) -> u64 {
        self.graph.batches()
    }
}

impl std::fmt::Debug for DashboardSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardSession")
            .field("policy", &self.policy)
            .field("symbol", &self.symbol())
            .field("graph", &self.graph)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::MockClock;
    use crate::domain::market::SnapshotTrade;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fixed_clock(today: NaiveDate) -> Arc<dyn Clock> {
        let mut clock = MockClock::new();
        clock.expect_today().return_const(today);
        Arc::new(clock)
    }

    fn bar(timestamp: &str, close: f64) -> Bar {
        Bar {
            timestamp: timestamp.to_string(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 0,
            trade_count: 0,
            vwap: close,
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            latest_trade: Some(SnapshotTrade {
                timestamp: "2024-03-01T19:59:59Z".to_string(),
                price: 100.5,
                size: 10,
                trade_id: None,
                exchange: None,
                conditions: vec![],
                tape: None,
            }),
            daily_bar: Some(bar("2024-03-01T05:00:00Z", 100.0)),
            prev_daily_bar: Some(bar("2024-02-29T05:00:00Z", 98.0)),
            ..Snapshot::default()
        }
    }

    fn trade(symbol: &str, price: f64) -> Trade {
        Trade {
            symbol: symbol.to_string(),
            timestamp: "2024-03-01T20:00:00Z".to_string(),
            price,
            size: 1,
            trade_id: None,
            exchange: None,
            conditions: vec![],
            tape: None,
        }
    }

    fn session(today: NaiveDate) -> DashboardSession {
        DashboardSession::with_defaults(fixed_clock(today)).unwrap()
    }

    #[test]
    fn intraday_diff_against_previous_close() {
        let mut session = session(date(2024, 3, 1));
        session.set_symbol("aapl");
        session.set_snapshot(snapshot());
        session.set_trade(trade("AAPL", 101.0));

        let diff = session.intraday_diff().unwrap();
        assert!((diff.change - 3.0).abs() < 1e-9);
        assert!((diff.change_percent - 3.0 / 98.0).abs() < 1e-12);
        assert_eq!(session.text(NodeId::FormattedTradePrice), Some("$101.00"));
        assert_eq!(session.text(NodeId::FormattedPreviousClose), Some("$98.00"));
        assert_eq!(session.text(NodeId::FormattedAbsChange), Some("3.00"));
        assert_eq!(session.text(NodeId::FormattedAbsChangePercent), Some("3.06%"));
    }

    #[test]
    fn symbol_is_normalised() {
        let mut session = session(date(2024, 3, 1));
        session.set_symbol("  msft ");
        assert_eq!(session.symbol(), Some("MSFT"));

        let before = session.batches();
        let outcome = session.set_symbol("   ");
        assert!(outcome.is_noop());
        assert_eq!(session.symbol(), Some("MSFT"));
        assert_eq!(session.batches(), before + 1);
    }

    #[test]
    fn new_symbol_resets_symbol_scoped_leaves() {
        let mut session = session(date(2024, 3, 1));
        session.set_symbol("AAPL");
        session.set_snapshot(snapshot());
        session.set_trade(trade("AAPL", 101.0));

        session.set_symbol("MSFT");

        for node in NodeId::SYMBOL_SCOPED {
            assert!(session.value(node).is_none(), "{node} not reset");
        }
        assert!(session.latest_trade().is_none());
        assert!(session.intraday_diff().is_none());
        assert!(session.text(NodeId::FormattedTradePrice).is_none());
    }

    #[test]
    fn same_symbol_keeps_state() {
        let mut session = session(date(2024, 3, 1));
        session.set_symbol("AAPL");
        session.set_trade(trade("AAPL", 101.0));

        let outcome = session.set_symbol("aapl");

        assert!(outcome.is_noop());
        assert_eq!(session.latest_trade().map(|t| t.price), Some(101.0));
    }

    #[test]
    fn latest_trade_falls_back_to_snapshot() {
        let mut session = session(date(2024, 3, 1));
        session.set_symbol("AAPL");
        session.set_snapshot(snapshot());

        let latest = session.latest_trade().unwrap();
        assert_eq!(latest.symbol, "AAPL");
        assert_eq!(latest.price, 100.5);
        // The diff needs a live trade.
        assert!(session.intraday_diff().is_none());
    }

    #[test]
    fn identical_snapshot_is_quiet() {
        let mut session = session(date(2024, 3, 1));
        session.set_symbol("AAPL");
        session.set_snapshot(snapshot());
        let mut sub = session.subscribe(NodeId::EffectivePreviousClose).unwrap();
        sub.drain();

        let outcome = session.set_snapshot(snapshot());

        assert!(outcome.is_noop());
        assert!(sub.try_next().is_none());
    }

    #[test]
    fn session_date_follows_clock() {
        let mut clock = MockClock::new();
        let mut seq = mockall::Sequence::new();
        clock
            .expect_today()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(date(2024, 3, 1));
        clock
            .expect_today()
            .in_sequence(&mut seq)
            .return_const(date(2024, 3, 4));

        let mut session = DashboardSession::with_defaults(Arc::new(clock)).unwrap();
        session.set_snapshot(snapshot());
        assert_eq!(session.effective_previous_close().unwrap().close, 98.0);

        // Day rollover: the daily bar becomes the previous close.
        let outcome = session.refresh_session_date();

        assert_eq!(session.session_date(), Some(date(2024, 3, 4)));
        assert!(outcome.changed.contains(&NodeId::EffectivePreviousClose));
        assert_eq!(session.effective_previous_close().unwrap().close, 100.0);
    }

    #[test]
    fn prev_daily_bar_date_policy() {
        let mut session = DashboardSession::new(
            PreviousClosePolicy::PrevDailyBarDate,
            Arc::new(UsdFormat),
            fixed_clock(date(2024, 3, 1)),
        )
        .unwrap();
        assert_eq!(session.policy(), PreviousClosePolicy::PrevDailyBarDate);

        session.set_snapshot(snapshot());

        assert_eq!(session.effective_previous_close().unwrap().close, 98.0);
    }

    #[test]
    fn subscribers_see_initial_value_then_changes() {
        let mut session = session(date(2024, 3, 1));
        let mut sub = session.subscribe(NodeId::AssetShortName).unwrap();
        assert_eq!(sub.try_next().unwrap().value, None);

        session.set_asset(Asset {
            name: "Apple Inc. Common Stock".to_string(),
            ..Asset::default()
        });

        let update = sub.try_next().unwrap();
        assert_eq!(update.value, Some(NodeValue::Text("Apple Inc.".to_string())));
        assert_eq!(session.asset_short_name(), Some("Apple Inc."));

        assert!(session.unsubscribe(sub.id()));
        assert_eq!(session.subscriber_count(), 0);
    }

    #[test]
    fn quote_does_not_touch_derived_nodes() {
        let mut session = session(date(2024, 3, 1));
        session.set_symbol("AAPL");

        let outcome = session.set_quote(Quote {
            symbol: "AAPL".to_string(),
            bid_price: 100.0,
            ask_price: 100.1,
            ..Quote::default()
        });

        assert_eq!(outcome.changed, vec![NodeId::Quote]);
        assert_eq!(outcome.recomputed, 0);
    }
}
