//! Domain Layer - Market data types and the dashboard dataflow.
//!
//! This layer contains the market data model, the pure computations of the
//! dashboard and the propagation engine that ties them together. Nothing
//! here performs I/O.

/// Market data types (trades, quotes, bars, snapshots, assets).
pub mod market;

/// Signed price change primitive.
pub mod diff;

/// Previous-close selection.
pub mod previous_close;

/// Display number formatting.
pub mod format;

/// Generic dataflow graph with batched propagation.
pub mod propagation;

/// The dashboard's node set.
pub mod dashboard;
