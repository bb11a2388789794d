//! Geofence tracker - vehicle zone-transition service
//!
//! Ingests vehicle position reports over HTTP, resolves them against a set of
//! rectangular zones, and records ENTER/EXIT transitions per vehicle.
//!
//! Module structure:
//! - `domain/` - Core types (Zone, LocationReport, TransitionRecord)
//! - `store/` - Entity state and transition log backends
//! - `services/` - Business logic (ZoneRegistry, TransitionEngine)
//! - `io/` - HTTP API and Prometheus exposition
//! - `infra/` - Infrastructure (Config, Metrics)

use clap::Parser;
use geofence_tracker::infra::{Config, Metrics};
use geofence_tracker::io::{start_http_server, AppState};
use geofence_tracker::services::{TransitionEngine, ZoneRegistry};
use geofence_tracker::store::{JournalStore, MemoryStore, TrackingStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Geofence tracker - vehicle zone-transition service
#[derive(Parser, Debug)]
#[command(name = "geofence-tracker", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Default: INFO, use RUST_LOG=debug for per-request visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), git_hash = env!("GIT_HASH"), "geofence-tracker starting");

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);

    info!(
        config_file = %config.config_file(),
        site = %config.site_id(),
        http_bind_address = %config.http_bind_address(),
        http_port = %config.http_port(),
        journal_file = ?config.journal_file(),
        zones = config.zones().len(),
        "config_loaded"
    );

    let registry = Arc::new(ZoneRegistry::new(config.zones().to_vec())?);
    let store: Arc<dyn TrackingStore> = match config.journal_file() {
        Some(path) => Arc::new(JournalStore::open(path)?),
        None => Arc::new(MemoryStore::new()),
    };
    let metrics = Arc::new(Metrics::new());
    let engine = Arc::new(TransitionEngine::new(registry, store, metrics.clone()));

    let counts = engine.store_counts();
    info!(
        zones = engine.registry().len(),
        vehicles = counts.vehicles,
        transitions = counts.transitions,
        "engine_ready"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start HTTP API server (if port > 0)
    let http_port = config.http_port();
    let server = if http_port > 0 {
        let addr: SocketAddr = format!("{}:{}", config.http_bind_address(), http_port).parse()?;
        let state = Arc::new(AppState {
            engine: engine.clone(),
            metrics: metrics.clone(),
            site_id: config.site_id().to_string(),
            max_body_bytes: config.http_max_body_bytes(),
        });
        let http_shutdown = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = start_http_server(addr, state, http_shutdown).await {
                tracing::error!(error = %e, "HTTP server error");
            }
        }))
    } else {
        info!("http_server_disabled");
        None
    };

    // Start metrics reporter
    let metrics_engine = engine.clone();
    let metrics_interval = config.metrics_interval_secs();
    let mut metrics_shutdown = shutdown_rx;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let counts = metrics_engine.store_counts();
                    metrics.report(counts.vehicles, counts.transitions).log();
                }
                _ = metrics_shutdown.changed() => break,
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown_signal_received");
    let _ = shutdown_tx.send(true);

    if let Some(server) = server {
        let _ = server.await;
    }

    info!("geofence-tracker shutdown complete");
    Ok(())
}
