//! C4 — Telemetry Ingestor: subscribes to the upstream streaming telemetry
//! source and forwards every record verbatim to `telemetry.raw`.
mod config;
mod streamer;

use std::time::Duration;

use anyhow::Result;
use futures_lite::stream::StreamExt;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ground_bus::client::BusClient;
use ground_bus::topology;
use ground_protocol::model::RawPacketMessage;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("ground_ingestor=info".parse().unwrap())
                .add_directive("ground_bus=info".parse().unwrap()),
        )
        .compact()
        .init();

    let cfg = config::Cli::parse_and_build_config()?;
    info!(amqp_url = %cfg.amqp_url, "ground-ingestor starting");

    let packet_list = config::load_packet_list(&cfg.packet_list_path)?;
    info!(count = packet_list.packets.len(), "loaded packet list");

    let bus = BusClient::connect(&cfg.amqp_url).await?;
    topology::declare_raw_topology(bus.channel(), &packet_list.packets).await?;

    let ws_url = config::Cli::ws_url(&cfg);
    loop {
        if let Err(err) = run_stream(&bus, &ws_url, &packet_list.packets).await {
            warn!(%err, delay_s = cfg.reconnect_delay_secs, "ingestor stream ended, reconnecting");
        }
        tokio::time::sleep(Duration::from_secs(cfg.reconnect_delay_secs)).await;
    }
}

/// Runs one connection lifecycle, publishing each upstream record to
/// `telemetry.raw` with routing key `__packet` as it arrives.
async fn run_stream(
    bus: &BusClient,
    ws_url: &str,
    packets: &[String],
) -> Result<(), ground_protocol::error::CoreError> {
    let mut socket = streamer::connect_and_subscribe(ws_url, packets).await?;
    info!(count = packets.len(), "subscribed to upstream packets");

    while let Some(msg) = socket.next().await {
        let msg = msg
            .map_err(|e| ground_protocol::error::CoreError::TransientIo(format!("websocket read: {e}")))?;
        if matches!(msg, tokio_tungstenite::tungstenite::Message::Close(_)) {
            break;
        }
        let record = match streamer::parse_record(msg) {
            Some(Ok(r)) => r,
            Some(Err(err)) => {
                warn!(%err, "dropping malformed upstream record");
                continue;
            }
            None => continue,
        };

        let raw = RawPacketMessage {
            packet: record.packet.clone(),
            buffer_base64: record.buffer,
            received_time_ns: record.received_time_ns,
        };

        if let Err(err) = bus
            .publish_json(topology::EXCHANGE_RAW, &record.packet, &raw)
            .await
        {
            error!(%err, packet = %record.packet, "failed to publish raw packet");
        } else {
            info!(packet = %record.packet, "published raw packet");
        }
    }
    Ok(())
}
