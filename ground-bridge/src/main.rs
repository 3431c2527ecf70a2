//! C5 — Bridge Runner: per-station MQTT A<->B proxy with frame crypto,
//! counters and durable SQLite logging, plus the health sub-runner.
mod config;
mod health;
mod runner;
mod sqlite_log;
mod stats;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("ground_bridge=info".parse().unwrap())
                .add_directive("tokio=warn".parse().unwrap()),
        )
        .compact()
        .init();

    let cfg = config::Cli::parse_and_build_config()?;
    let stations = config::load_station_list(&cfg.station_list_path)?;
    info!(count = stations.stations.len(), "loaded station list");

    let stats = Arc::new(stats::Stats::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles = Vec::new();
    for station in stations.stations {
        let log = sqlite_log::SqliteLog::open(&cfg.sqlite_dir, &station.id).await?;

        let bridge_runner = runner::BridgeRunner::new(station.clone(), cfg.keys.clone(), stats.clone(), log.clone());
        let broker_a_host = cfg.broker_a_host.clone();
        let broker_a_port = cfg.broker_a_port;
        let bridge_shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            bridge_runner.run(&broker_a_host, broker_a_port, bridge_shutdown).await;
        }));

        let health_runner = health::HealthRunner::new(station, log);
        let health_shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            health_runner.run(health_shutdown).await;
        }));
    }

    info!(stations = handles.len() / 2, "bridge running, press Ctrl+C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(?e, "failed to install Ctrl+C handler");
    }
    info!("shutdown signal received; draining runners");
    let _ = shutdown_tx.send(true);
    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}
