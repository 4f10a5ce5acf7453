//! Quote Dashboard Binary
//!
//! Reads market data events, drives one dashboard session and logs every
//! change of the dashboard's derived values.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin quote-dashboard < session.ndjson
//! DASHBOARD_FEED_PATH=session.ndjson cargo run --bin quote-dashboard
//! ```
//!
//! # Environment Variables
//!
//! - `DASHBOARD_SYMBOL`: Symbol selected at startup
//! - `DASHBOARD_PREVIOUS_CLOSE_POLICY`: wall-clock | prev-daily-bar (default: wall-clock)
//! - `DASHBOARD_FEED_PATH`: NDJSON replay file, `-` for stdin (default: stdin)
//! - `DASHBOARD_EVENT_BUFFER`: Reader channel capacity (default: 1024)
//! - `DASHBOARD_HEALTH_PORT`: Health check HTTP port, 0 disables (default: 8083)
//! - `DASHBOARD_SESSION_DATE`: Pin "today" (YYYY-MM-DD) when replaying a past session
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: quote-dashboard)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use quote_dashboard::infrastructure::config::FeedInput;
use quote_dashboard::infrastructure::telemetry;
use quote_dashboard::{
    Clock, DashboardConfig, DashboardSession, DashboardSubscription, DashboardUpdate, FeedBridge,
    FeedSource, FixedClock, HealthServer, HealthServerState, LineFeedSource, NodeId, SystemClock,
    UsdFormat, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Time allowed for background tasks after the feed stops.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(run());

    // A pending stdin read cannot be cancelled; don't wait for it forever.
    runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
    result
}

async fn run() -> anyhow::Result<()> {
    load_dotenv();

    // Initialize telemetry (tracing + optional OpenTelemetry)
    let _telemetry_guard = telemetry::init()?;

    tracing::info!("Starting Quote Dashboard");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = DashboardConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Build the session
    let clock: Arc<dyn Clock> = match config.session_date {
        Some(date) => Arc::new(FixedClock(date)),
        None => Arc::new(SystemClock),
    };
    let mut session =
        DashboardSession::new(config.previous_close_policy, Arc::new(UsdFormat), clock)?;
    if let Some(symbol) = &config.initial_symbol {
        session.set_symbol(symbol);
    }

    let subscriptions = std::iter::once(NodeId::Symbol)
        .chain(NodeId::DERIVED)
        .map(|node| session.subscribe(node))
        .collect::<Result<Vec<_>, _>>()?;
    let renderer = tokio::spawn(render_updates(subscriptions));

    let mut bridge = FeedBridge::new(session);

    // Spawn health server
    if config.server.health_enabled() {
        let health_state = Arc::new(HealthServerState::new(
            env!("CARGO_PKG_VERSION").to_string(),
            bridge.stats(),
        ));
        let health_server = HealthServer::new(
            config.server.health_port,
            health_state,
            shutdown_token.clone(),
        );
        tokio::spawn(async move {
            if let Err(e) = health_server.run().await {
                tracing::error!(error = %e, "Health server error");
            }
        });
    }

    tokio::spawn(await_shutdown(shutdown_token.clone()));

    let mut source: Box<dyn FeedSource> = match &config.feed.input {
        FeedInput::Stdin => Box::new(LineFeedSource::stdin(config.feed.event_buffer)),
        FeedInput::File(path) => {
            Box::new(LineFeedSource::open(path, config.feed.event_buffer).await?)
        }
    };

    tracing::info!(input = %config.feed.input.describe(), "Quote dashboard ready");

    let result = bridge.run(source.as_mut(), shutdown_token.clone()).await;

    // Stop the health server and close every subscription.
    shutdown_token.cancel();
    drop(bridge);
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, renderer).await.is_err() {
        tracing::warn!("renderer did not finish in time");
    }

    tracing::info!("Quote dashboard stopped");
    result.map_err(Into::into)
}

/// Log each dashboard update until every subscription has closed.
async fn render_updates(subscriptions: Vec<DashboardSubscription>) {
    let mut updates = futures::stream::select_all(
        subscriptions
            .into_iter()
            .map(DashboardSubscription::into_stream),
    );

    while let Some(update) = updates.next().await {
        render(&update);
    }
}

fn render(update: &DashboardUpdate) {
    match &update.value {
        Some(value) => tracing::info!(
            batch = update.batch,
            node = %update.node,
            value = %value,
            "dashboard updated"
        ),
        None => tracing::info!(batch = update.batch, node = %update.node, "dashboard cleared"),
    }
}

/// Log the parsed configuration.
fn log_config(config: &DashboardConfig) {
    tracing::info!(
        symbol = ?config.initial_symbol,
        previous_close_policy = config.previous_close_policy.as_str(),
        session_date = ?config.session_date,
        input = %config.feed.input.describe(),
        event_buffer = config.feed.event_buffer,
        health_port = config.server.health_port,
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
        () = shutdown_token.cancelled() => return,
    }

    shutdown_token.cancel();
}
