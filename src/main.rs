//! event-map: cached, geocoded event map service.
//!
//! Single-binary Tokio application that:
//! 1. Serves the last good snapshot on every read, with a `stale` flag
//! 2. Launches a detached refresh when the snapshot gets too old
//! 3. Fetches records from Airtable and diffs them against the snapshot
//! 4. Batch-geocodes only the postal codes that actually changed

mod config;
mod server;

use std::sync::Arc;

use airtable_client::AirtableClient;
use clap::Parser;
use geocode_client::GeoapifyClient;
use refresh::{JobPoller, PollerConfig, RefreshCoordinator};
use snapshot_store::JsonFileStore;
use tracing::{error, info};

use common::SnapshotStore;
use server::{AppState, Coordinator};

/// Cached geocoded event map service.
#[derive(Parser)]
#[command(name = "event-map", about = "Stale-while-revalidate event map cache")]
struct Cli {
    /// Run one refresh cycle in the foreground and exit.
    ///
    /// Also the operator escape hatch for a row left "in flight" by a
    /// crashed refresh: the foreground cycle ends in a terminal write
    /// either way.
    #[arg(long)]
    refresh_once: bool,

    /// Override the configured listen address.
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "event_map=info,refresh=info,airtable_client=info,geocode_client=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    // Load configuration.
    let mut cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(listen) = cli.listen {
        cfg.server.listen_addr = listen;
    }

    info!(
        "event-map starting: map_id={} max_age={}s store={}",
        cfg.refresh.map_id, cfg.refresh.max_age_secs, cfg.store.path
    );

    // Wire up collaborators.
    let store = JsonFileStore::new(&cfg.store.path);
    let provider = AirtableClient::new(cfg.airtable.clone());
    let geocoder = GeoapifyClient::new(cfg.geocoding.clone());
    let poller = JobPoller::new(geocoder, PollerConfig::from(&cfg.geocoding));
    let coordinator: Arc<Coordinator> = Arc::new(RefreshCoordinator::new(
        provider,
        poller,
        store.clone(),
        cfg.refresh.map_id.clone(),
    ));

    // ── Foreground refresh mode ──────────────────────────────────────
    if cli.refresh_once {
        info!("Running one foreground refresh...");
        let previous = match store.read(&cfg.refresh.map_id).await {
            Ok(snapshot) => snapshot.data,
            Err(e) => {
                error!("Could not read snapshot: {}", e);
                std::process::exit(1);
            }
        };
        coordinator.refresh_forced(previous).await;

        match store.read(&cfg.refresh.map_id).await {
            Ok(snapshot) if snapshot.refresh_failed_at > snapshot.refresh_started_at => {
                error!("Refresh cycle ended in failure; see log above");
                std::process::exit(1);
            }
            Ok(snapshot) if snapshot.refresh_in_flight() => {
                error!("Refresh never reached a terminal write; row still marked in flight");
                std::process::exit(1);
            }
            Ok(snapshot) => {
                info!(
                    "Refresh done: {} records, updated_at={:?}",
                    snapshot.data.len(),
                    snapshot.updated_at
                );
            }
            Err(e) => {
                error!("Could not re-read snapshot: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    // ── Serve ────────────────────────────────────────────────────────
    let state = AppState {
        store,
        coordinator,
        map_id: cfg.refresh.map_id.clone(),
        max_age_secs: cfg.refresh.max_age_secs,
    };

    let listener = match tokio::net::TcpListener::bind(&cfg.server.listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Could not bind {}: {}", cfg.server.listen_addr, e);
            std::process::exit(1);
        }
    };
    info!("Listening on http://{}", cfg.server.listen_addr);

    if let Err(e) = axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
    info!("Shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Could not listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}
