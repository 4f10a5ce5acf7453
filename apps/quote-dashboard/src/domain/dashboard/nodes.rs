//! Node identifiers, values and computations.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::diff::{PriceDiff, diff};
use crate::domain::format::NumberFormat;
use crate::domain::market::{Asset, Bar, Quote, Snapshot, Trade};
use crate::domain::previous_close::{self, PreviousClosePolicy};
use crate::domain::propagation::{GraphBuilder, GraphError, PropagationGraph};

/// Suffix stripped from asset names for the short display name.
pub const ASSET_NAME_BOILERPLATE: &str = "Common Stock";

// =============================================================================
// Node Identifiers
// =============================================================================

/// Every node of the dashboard graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeId {
    /// Selected symbol (leaf).
    Symbol,
    /// Latest live trade (leaf).
    Trade,
    /// Latest live quote (leaf).
    Quote,
    /// Latest snapshot (leaf).
    Snapshot,
    /// Asset metadata (leaf).
    Asset,
    /// Calendar date the session considers "today" (leaf).
    SessionDate,
    /// Bar anchoring the intraday diff.
    EffectivePreviousClose,
    /// Live trade, or the snapshot's latest trade tagged with the symbol.
    LatestTrade,
    /// Asset name without boilerplate.
    AssetShortName,
    /// Change from the effective previous close to the live trade.
    IntradayDiff,
    /// Currency-formatted live trade price.
    FormattedTradePrice,
    /// Decimal-formatted absolute intraday change.
    FormattedAbsChange,
    /// Percent-formatted absolute intraday change.
    FormattedAbsChangePercent,
    /// Currency-formatted previous close.
    FormattedPreviousClose,
}

impl NodeId {
    /// Leaf nodes, written from outside the graph.
    pub const LEAVES: [Self; 6] = [
        Self::Symbol,
        Self::Trade,
        Self::Quote,
        Self::Snapshot,
        Self::Asset,
        Self::SessionDate,
    ];

    /// Derived nodes, computed by the graph.
    pub const DERIVED: [Self; 8] = [
        Self::EffectivePreviousClose,
        Self::LatestTrade,
        Self::AssetShortName,
        Self::IntradayDiff,
        Self::FormattedTradePrice,
        Self::FormattedAbsChange,
        Self::FormattedAbsChangePercent,
        Self::FormattedPreviousClose,
    ];

    /// Nodes scoped to the selected symbol, reset on a symbol switch.
    pub const SYMBOL_SCOPED: [Self; 4] = [Self::Trade, Self::Quote, Self::Snapshot, Self::Asset];

    /// Whether the node is a leaf.
    #[must_use]
    pub const fn is_leaf(self) -> bool {
        matches!(
            self,
            Self::Symbol
                | Self::Trade
                | Self::Quote
                | Self::Snapshot
                | Self::Asset
                | Self::SessionDate
        )
    }

    /// Stable snake-case name for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Symbol => "symbol",
            Self::Trade => "trade",
            Self::Quote => "quote",
            Self::Snapshot => "snapshot",
            Self::Asset => "asset",
            Self::SessionDate => "session_date",
            Self::EffectivePreviousClose => "effective_previous_close",
            Self::LatestTrade => "latest_trade",
            Self::AssetShortName => "asset_short_name",
            Self::IntradayDiff => "intraday_diff",
            Self::FormattedTradePrice => "formatted_trade_price",
            Self::FormattedAbsChange => "formatted_abs_change",
            Self::FormattedAbsChangePercent => "formatted_abs_change_percent",
            Self::FormattedPreviousClose => "formatted_previous_close",
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Node Values
// =============================================================================

/// Value held by a dashboard node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    /// Selected symbol.
    Symbol(String),
    /// Trade (live or synthesized).
    Trade(Trade),
    /// Quote.
    Quote(Quote),
    /// Snapshot.
    Snapshot(Snapshot),
    /// Asset metadata.
    Asset(Asset),
    /// Calendar date.
    Date(NaiveDate),
    /// Bar.
    Bar(Bar),
    /// Price diff.
    Diff(PriceDiff),
    /// Display string.
    Text(String),
}

impl NodeValue {
    /// Symbol payload.
    #[must_use]
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Self::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Trade payload.
    #[must_use]
    pub const fn as_trade(&self) -> Option<&Trade> {
        match self {
            Self::Trade(t) => Some(t),
            _ => None,
        }
    }

    /// Quote payload.
    #[must_use]
    pub const fn as_quote(&self) -> Option<&Quote> {
        match self {
            Self::Quote(q) => Some(q),
            _ => None,
        }
    }

    /// Snapshot payload.
    #[must_use]
    pub const fn as_snapshot(&self) -> Option<&Snapshot> {
        match self {
            Self::Snapshot(s) => Some(s),
            _ => None,
        }
    }

    /// Asset payload.
    #[must_use]
    pub const fn as_asset(&self) -> Option<&Asset> {
        match self {
            Self::Asset(a) => Some(a),
            _ => None,
        }
    }

    /// Date payload.
    #[must_use]
    pub const fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Bar payload.
    #[must_use]
    pub const fn as_bar(&self) -> Option<&Bar> {
        match self {
            Self::Bar(b) => Some(b),
            _ => None,
        }
    }

    /// Diff payload.
    #[must_use]
    pub const fn as_diff(&self) -> Option<&PriceDiff> {
        match self {
            Self::Diff(d) => Some(d),
            _ => None,
        }
    }

    /// Text payload.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for NodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symbol(s) | Self::Text(s) => f.write_str(s),
            Self::Trade(t) => write!(f, "{} {} x{} @ {}", t.symbol, t.price, t.size, t.timestamp),
            Self::Quote(q) => write!(
                f,
                "{} {}x{} / {}x{}",
                q.symbol, q.bid_price, q.bid_size, q.ask_price, q.ask_size
            ),
            Self::Snapshot(s) => write!(
                f,
                "snapshot daily={} prev={}",
                s.daily_bar.as_ref().map_or("-".to_string(), |b| b.close.to_string()),
                s.prev_daily_bar
                    .as_ref()
                    .map_or("-".to_string(), |b| b.close.to_string())
            ),
            Self::Asset(a) => write!(f, "{} {}", a.symbol, a.name),
            Self::Date(d) => write!(f, "{d}"),
            Self::Bar(b) => write!(f, "close {} @ {}", b.close, b.timestamp),
            Self::Diff(d) => write!(f, "{:+} ({:+})", d.change, d.change_percent),
        }
    }
}

// =============================================================================
// Computations
// =============================================================================

/// Effective previous close of `snapshot` on `today`.
///
/// A malformed bar timestamp makes the node absent and is logged.
pub(crate) fn effective_previous_close(
    snapshot: Option<&Snapshot>,
    today: Option<NaiveDate>,
    policy: PreviousClosePolicy,
) -> Option<Bar> {
    let today = today?;

    match previous_close::select(snapshot, today, policy) {
        Ok(bar) => bar.cloned(),
        Err(e) => {
            tracing::warn!(error = %e, policy = policy.as_str(), "previous close unavailable");
            None
        }
    }
}

/// Live trade if present, else the snapshot's latest trade tagged with
/// `symbol`.
pub(crate) fn latest_trade(
    trade: Option<&Trade>,
    snapshot: Option<&Snapshot>,
    symbol: Option<&str>,
) -> Option<Trade> {
    if let Some(trade) = trade {
        return Some(trade.clone());
    }

    let latest = snapshot?.latest_trade.as_ref()?;
    Some(latest.to_trade(symbol?))
}

/// Asset name without the boilerplate suffix.
pub(crate) fn asset_short_name(asset: Option<&Asset>) -> Option<String> {
    asset.map(|a| a.name.replace(ASSET_NAME_BOILERPLATE, "").trim().to_string())
}

/// Diff from the previous close to the live trade price.
pub(crate) fn intraday_diff(previous_close: Option<&Bar>, trade: Option<&Trade>) -> Option<PriceDiff> {
    Some(diff(previous_close?.close, trade?.price))
}

// =============================================================================
// Graph Definition
// =============================================================================

/// Build the dashboard graph.
///
/// # Errors
///
/// Returns [`GraphError`] if the node declarations are inconsistent.
pub fn build_graph(
    policy: PreviousClosePolicy,
    format: Arc<dyn NumberFormat>,
) -> Result<PropagationGraph<NodeId, NodeValue>, GraphError> {
    let price_format = Arc::clone(&format);
    let change_format = Arc::clone(&format);
    let percent_format = Arc::clone(&format);
    let close_format = format;

    GraphBuilder::<NodeId, NodeValue>::new()
        .leaf(NodeId::Symbol)
        .leaf(NodeId::Trade)
        .leaf(NodeId::Quote)
        .leaf(NodeId::Snapshot)
        .leaf(NodeId::Asset)
        .leaf(NodeId::SessionDate)
        .derived(
            NodeId::EffectivePreviousClose,
            &[NodeId::Snapshot, NodeId::SessionDate],
            move |v| {
                let snapshot = v[0].and_then(NodeValue::as_snapshot);
                let today = v[1].and_then(NodeValue::as_date);
                effective_previous_close(snapshot, today, policy).map(NodeValue::Bar)
            },
        )
        .derived(
            NodeId::LatestTrade,
            &[NodeId::Trade, NodeId::Snapshot, NodeId::Symbol],
            |v| {
                latest_trade(
                    v[0].and_then(NodeValue::as_trade),
                    v[1].and_then(NodeValue::as_snapshot),
                    v[2].and_then(NodeValue::as_symbol),
                )
                .map(NodeValue::Trade)
            },
        )
        .derived(NodeId::AssetShortName, &[NodeId::Asset], |v| {
            asset_short_name(v[0].and_then(NodeValue::as_asset)).map(NodeValue::Text)
        })
        .derived(
            NodeId::IntradayDiff,
            &[NodeId::EffectivePreviousClose, NodeId::Trade],
            |v| {
                intraday_diff(
                    v[0].and_then(NodeValue::as_bar),
                    v[1].and_then(NodeValue::as_trade),
                )
                .map(NodeValue::Diff)
            },
        )
        .derived(NodeId::FormattedTradePrice, &[NodeId::Trade], move |v| {
            v[0].and_then(NodeValue::as_trade)
                .map(|t| NodeValue::Text(price_format.currency(t.price)))
        })
        .derived(NodeId::FormattedAbsChange, &[NodeId::IntradayDiff], move |v| {
            v[0].and_then(NodeValue::as_diff)
                .map(|d| NodeValue::Text(change_format.decimal(d.absolute_change)))
        })
        .derived(
            NodeId::FormattedAbsChangePercent,
            &[NodeId::IntradayDiff],
            move |v| {
                v[0].and_then(NodeValue::as_diff)
                    .map(|d| NodeValue::Text(percent_format.percent(d.change_percent.abs())))
            },
        )
        .derived(
            NodeId::FormattedPreviousClose,
            &[NodeId::EffectivePreviousClose],
            move |v| {
                v[0].and_then(NodeValue::as_bar)
                    .map(|b| NodeValue::Text(close_format.currency(b.close)))
            },
        )
        .build()
}

// =============================================================================
// Tests
// =============================================================================
