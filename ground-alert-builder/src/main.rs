//! C8 — Alert Builder: stateless threshold rule engine. Consumes every
//! decoded envelope, evaluates configured metric bounds, and emits graded
//! alerts to `alert.detected`.
//!
//! Grounded in `builder.py`: one consumer on `q.decoded.alerts` bound to
//! `telemetry.decoded` with `#`, config loaded once at startup and indexed
//! by `queue_id`.
mod config;
mod logic;

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ground_bus::client::BusClient;
use ground_bus::topology;
use ground_protocol::config::AlertConfigFile;
use ground_protocol::error::CoreError;
use ground_protocol::model::PacketEnvelope;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("ground_alert_builder=info".parse().unwrap())
                .add_directive("ground_bus=info".parse().unwrap()),
        )
        .compact()
        .init();

    let cfg = config::Cli::parse_and_build_config();
    let alert_config = Arc::new(config::load_alert_config(&cfg.alert_config_path)?);
    info!(
        rules = alert_config.packets.len(),
        submodules = alert_config.submodules.len(),
        "alert config loaded"
    );

    let bus = BusClient::connect(&cfg.amqp_url).await?;
    topology::declare_decoded_topology(bus.channel()).await?;
    topology::declare_alert_queues(bus.channel()).await?;

    info!("alert builder running, press Ctrl+C to stop");
    let result = bus
        .consume(topology::QUEUE_DECODED_ALERTS, "alert-builder", move |delivery| {
            let bus = bus.clone();
            let alert_config = alert_config.clone();
            async move { handle_envelope(&bus, &alert_config, &delivery.data).await }
        })
        .await;
    if let Err(err) = result {
        error!(%err, "alert builder consumer loop ended");
    }
    Ok(())
}

async fn handle_envelope(bus: &BusClient, alert_config: &AlertConfigFile, body: &[u8]) -> Result<(), CoreError> {
    let envelope: PacketEnvelope =
        serde_json::from_slice(body).map_err(|e| CoreError::Input(format!("malformed decoded envelope: {e}")))?;

    let index = alert_config.index_by_queue_id();
    let alerts = logic::evaluate_envelope(&envelope, alert_config, &index);
    if alerts.is_empty() {
        return Ok(());
    }

    for alert in &alerts {
        if let Err(err) = bus
            .publish_json("", topology::QUEUE_ALERT_DETECTED, alert)
            .await
        {
            warn!(metric = %alert.metric, %err, "failed to publish detected alert");
        }
    }
    info!(
        packet = %envelope.meta.packet_name,
        count = alerts.len(),
        "published detected alerts"
    );
    Ok(())
}
