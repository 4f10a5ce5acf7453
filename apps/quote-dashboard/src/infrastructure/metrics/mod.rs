//! Prometheus Metrics Module
//!
//! Exposes dashboard metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Events**: Feed events received by kind, dropped by reason
//! - **Errors**: Undecodable feed lines
//! - **Propagation**: Batches applied and derived nodes recomputed
//! - **Latency**: Batch propagation duration
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if another global recorder is already installed.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "quote_dashboard_events_received_total",
        "Total feed events received by kind"
    );
    describe_counter!(
        "quote_dashboard_events_dropped_total",
        "Total feed events dropped before reaching the graph"
    );
    describe_counter!(
        "quote_dashboard_decode_errors_total",
        "Total feed lines that failed to decode"
    );
    describe_counter!(
        "quote_dashboard_batches_total",
        "Total propagation batches applied"
    );
    describe_counter!(
        "quote_dashboard_recomputations_total",
        "Total derived node recomputations"
    );
    describe_histogram!(
        "quote_dashboard_batch_duration_seconds",
        "Time to apply and propagate one batch"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Why an event did not reach the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Tagged with a symbol other than the selected one.
    StaleSymbol,
    /// Arrived before any symbol was selected.
    NoSymbol,
    /// Event kind the dashboard does not use.
    Ignored,
}

impl DropReason {
    /// Label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StaleSymbol => "stale_symbol",
            Self::NoSymbol => "no_symbol",
            Self::Ignored => "ignored",
        }
    }
}

/// Record an event read from the feed.
pub fn record_event_received(kind: &str) {
    counter!(
        "quote_dashboard_events_received_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record an event dropped before reaching the graph.
pub fn record_event_dropped(reason: DropReason) {
    counter!(
        "quote_dashboard_events_dropped_total",
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Record an undecodable feed line.
pub fn record_decode_error() {
    counter!("quote_dashboard_decode_errors_total").increment(1);
}

/// Record one propagation batch.
pub fn record_batch(recomputed: usize, duration: Duration) {
    counter!("quote_dashboard_batches_total").increment(1);
    counter!("quote_dashboard_recomputations_total")
        .increment(u64::try_from(recomputed).unwrap_or(u64::MAX));
    histogram!("quote_dashboard_batch_duration_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_reason_as_str() {
        assert_eq!(DropReason::StaleSymbol.as_str(), "stale_symbol");
        assert_eq!(DropReason::NoSymbol.as_str(), "no_symbol");
        assert_eq!(DropReason::Ignored.as_str(), "ignored");
    }

    #[test]
    fn recording_without_recorder_is_harmless() {
        record_event_received("trade");
        record_event_dropped(DropReason::Ignored);
        record_decode_error();
        record_batch(3, Duration::from_micros(12));
    }
}
