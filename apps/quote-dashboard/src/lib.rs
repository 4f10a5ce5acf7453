#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Quote Dashboard - Derived-Value Graph for a Live Market Dashboard
//!
//! Keeps the derived values of a single-instrument market dashboard
//! (effective previous close, intraday change, formatted display strings)
//! consistent with a stream of trades, quotes, snapshots and symbol
//! switches.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Market data types and pure computations
//!   - `market`: Trades, quotes, bars, snapshots, assets
//!   - `diff`, `previous_close`, `format`: Dashboard computations
//!   - `propagation`: Generic batched dataflow engine
//!   - `dashboard`: The dashboard's node set
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Clock and feed source interfaces
//!   - `services`: The dashboard session
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `feed`: NDJSON codec, line source, session bridge
//!   - `clock`: System and fixed clocks
//!   - `config`: Environment configuration
//!   - `health`: Health check HTTP endpoint
//!   - `metrics`, `telemetry`: Observability
//!
//! # Data Flow
//!
//! ```text
//! stdin / replay ──► LineFeedSource ──► FeedBridge ──► DashboardSession
//!                                           │               │
//!                                      BridgeStats     subscriptions
//!                                           │               │
//!                                     health server     rendered log
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Market data types and the dashboard dataflow.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::dashboard::{NodeId, NodeValue};
pub use domain::diff::{PriceDiff, Sign, diff};
pub use domain::format::{NumberFormat, UsdFormat};
pub use domain::market::{Asset, Bar, PricePoint, Quote, Snapshot, Trade};
pub use domain::previous_close::PreviousClosePolicy;
pub use domain::propagation::{BatchOutcome, GraphError, SubscriptionId};

// Application
pub use application::ports::{Clock, FeedError, FeedEvent, FeedSource};
pub use application::services::{DashboardSession, DashboardSubscription, DashboardUpdate};

// Infrastructure config
pub use infrastructure::config::{ConfigError, DashboardConfig, FeedInput};

// Feed adapters
pub use infrastructure::clock::{FixedClock, SystemClock};
pub use infrastructure::feed::{BridgeState, BridgeStats, FeedBridge, LineFeedSource};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
