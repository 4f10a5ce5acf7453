//! Dashboard Graph
//!
//! The derived-value graph for a single-instrument market dashboard.
//!
//! # Nodes
//!
//! ```text
//! symbol ─────────────────────────────┐
//! trade ──────┬───────────────────────┼──► latest_trade
//! snapshot ───┼──┬────────────────────┘
//!             │  └──► effective_previous_close ◄── session_date
//!             │            │          └──► formatted_previous_close
//!             ├────────────┴──► intraday_diff ──┬──► formatted_abs_change
//!             │                                 └──► formatted_abs_change_percent
//!             └──► formatted_trade_price
//! asset ──► asset_short_name
//! quote
//! ```
//!
//! Leaves are written by the application session; every other node is a
//! pure function of its dependencies.

mod nodes;

pub use nodes::{ASSET_NAME_BOILERPLATE, NodeId, NodeValue, build_graph};
