//! C7 — DB Sink Worker: persists decoded envelopes into per-packet Postgres
//! tables, and decoder dead-letters into the two fixed `DECODER_NOT_FOUND`
//! / `DECODER_FAILED` tables.
//!
//! Grounded in `DBWorkerService` (`dbworker.py`) and `PostgresClient`
//! (`db_client.py`): one consumer on `q.decoded.db_persistence` bound to
//! `telemetry.decoded` with `#`, plus the decoder dead-letter queues this
//! core routes failures to (§4.3, §4.6) instead of writing to Postgres
//! inline from the health consumer.
mod config;
mod pg;

use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ground_bus::client::BusClient;
use ground_bus::topology;
use ground_protocol::error::CoreError;
use ground_protocol::model::PacketEnvelope;

use pg::PgSink;

#[derive(Debug, Deserialize)]
struct DecoderNotFound {
    packet_name: String,
    hex_payload: String,
    reason: String,
}

#[derive(Debug, Deserialize)]
struct DecoderFailed {
    packet_name: String,
    hex_payload: String,
    error: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("ground_db_sink=info".parse().unwrap())
                .add_directive("ground_bus=info".parse().unwrap()),
        )
        .compact()
        .init();

    let cfg = config::Cli::parse_and_build_config();
    info!(amqp_url = %cfg.amqp_url, "ground-db-sink starting");

    let sink = Arc::new(PgSink::connect(&cfg.database_url).await?);

    let bus = BusClient::connect(&cfg.amqp_url).await?;
    topology::declare_decoded_topology(bus.channel()).await?;
    topology::declare_decoder_error_queues(bus.channel()).await?;

    let mut handles = Vec::new();

    {
        let bus = bus.clone();
        let sink = sink.clone();
        handles.push(tokio::spawn(async move {
            let result = bus
                .consume(topology::QUEUE_DECODED_DB, "db-sink-decoded", move |delivery| {
                    let sink = sink.clone();
                    async move { handle_decoded(&sink, &delivery.data).await }
                })
                .await;
            if let Err(err) = result {
                error!(%err, "decoded-envelope consumer loop ended");
            }
        }));
    }
    {
        let bus = bus.clone();
        let sink = sink.clone();
        handles.push(tokio::spawn(async move {
            let result = bus
                .consume(topology::QUEUE_DECODER_NOT_FOUND, "db-sink-decoder-not-found", move |delivery| {
                    let sink = sink.clone();
                    async move { handle_decoder_not_found(&sink, &delivery.data).await }
                })
                .await;
            if let Err(err) = result {
                error!(%err, "decoder-not-found consumer loop ended");
            }
        }));
    }
    {
        let sink = sink.clone();
        handles.push(tokio::spawn(async move {
            let result = bus
                .consume(topology::QUEUE_DECODER_FAILED, "db-sink-decoder-failed", move |delivery| {
                    let sink = sink.clone();
                    async move { handle_decoder_failed(&sink, &delivery.data).await }
                })
                .await;
            if let Err(err) = result {
                error!(%err, "decoder-failed consumer loop ended");
            }
        }));
    }

    info!("db sink running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await.ok();
    for handle in handles {
        handle.abort();
    }
    Ok(())
}

async fn handle_decoded(sink: &PgSink, body: &[u8]) -> Result<(), CoreError> {
    let envelope: PacketEnvelope =
        serde_json::from_slice(body).map_err(|e| CoreError::Input(format!("malformed decoded envelope: {e}")))?;

    if envelope.data.is_empty() {
        warn!(packet = %envelope.meta.packet_name, "decoded envelope has no data rows");
        return Ok(());
    }

    let target_table = target_table_from_packet_name(&envelope.meta.packet_name);
    match run_insert(sink, &target_table, &envelope).await {
        Ok(()) => {
            info!(table = %target_table, rows = envelope.data.len(), "inserted decoded rows");
            Ok(())
        }
        Err(err) => {
            warn!(packet = %envelope.meta.packet_name, %err, "db insert failed");
            sink.insert_decoder_failed(&envelope.meta.packet_name, "", &err.to_string())
                .await
        }
    }
}

async fn run_insert(sink: &PgSink, target_table: &str, envelope: &PacketEnvelope) -> Result<(), CoreError> {
    sink.ensure_table(target_table, &envelope.data[0]).await?;
    sink.insert_rows(target_table, &envelope.data).await
}

async fn handle_decoder_not_found(sink: &PgSink, body: &[u8]) -> Result<(), CoreError> {
    let msg: DecoderNotFound =
        serde_json::from_slice(body).map_err(|e| CoreError::Input(format!("malformed decoder-not-found message: {e}")))?;
    sink.insert_decoder_not_found(&msg.packet_name, &msg.hex_payload, &msg.reason).await
}

async fn handle_decoder_failed(sink: &PgSink, body: &[u8]) -> Result<(), CoreError> {
    let msg: DecoderFailed =
        serde_json::from_slice(body).map_err(|e| CoreError::Input(format!("malformed decoder-failed message: {e}")))?;
    sink.insert_decoder_failed(&msg.packet_name, &msg.hex_payload, &msg.error).await
}

/// `RAW__TLM__EMULATOR__HEALTH_ADCS_CSS_VECTOR` -> `HEALTH_ADCS_CSS_VECTOR`;
/// names without the `__EMULATOR__` source-target prefix pass through
/// unchanged (e.g. command packets published directly by their own name).
fn target_table_from_packet_name(packet_name: &str) -> String {
    let parts: Vec<&str> = packet_name.split("__").collect();
    if parts.len() >= 4 && parts[2] == "EMULATOR" {
        parts[3..].join("__")
    } else {
        packet_name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_emulator_prefix() {
        assert_eq!(
            target_table_from_packet_name("RAW__TLM__EMULATOR__HEALTH_ADCS_CSS_VECTOR"),
            "HEALTH_ADCS_CSS_VECTOR"
        );
    }

    #[test]
    fn passes_through_names_without_the_prefix() {
        assert_eq!(target_table_from_packet_name("HEALTH_ADCS_CSS_VECTOR"), "HEALTH_ADCS_CSS_VECTOR");
    }
}
