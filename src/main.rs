mod api;
mod config;
mod detector;
mod error;
mod fetcher;
mod poller;
mod session;
mod state;
mod types;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::error::Result;
use crate::fetcher::BinanceDepthProvider;
use crate::poller::PollSettings;
use crate::session::RadarSession;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let provider = BinanceDepthProvider::new(
        cfg.depth_api_url.clone(),
        cfg.depth_limit,
        cfg.fetch_timeout_ms,
    )?;
    info!(
        "Depth source: {} (limit={}, timeout={}ms)",
        cfg.depth_api_url, cfg.depth_limit, cfg.fetch_timeout_ms
    );

    let session = RadarSession::new(
        Arc::new(provider),
        PollSettings {
            symbol: cfg.symbol.clone(),
            interval_ms: cfg.poll_interval_ms,
            detector: cfg.detector,
        },
        Duration::from_millis(cfg.fetch_timeout_ms),
    );
    info!(
        "Thresholds: wall>{} ladder_avg>{} thin<{}",
        cfg.detector.min_volume_for_wall,
        cfg.detector.min_avg_volume_for_ladder,
        cfg.detector.max_total_volume_for_thin,
    );

    if cfg.autostart {
        session.start(None).await?;
        info!("Polling {} every {}ms", cfg.symbol, cfg.poll_interval_ms);
    } else {
        info!("AUTOSTART disabled, waiting for POST /orderbook/poller/start");
    }

    // HTTP API server
    let app = router(ApiState {
        session: Arc::clone(&session),
        summary_window_ms: cfg.summary_window_ms,
        feature_window_ms: cfg.feature_window_ms,
    });
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    session.stop().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("Ctrl-C received, shutting down");
}
