//! Exchange and queue declarations for the telemetry bus.
//!
//! All declarations are idempotent (`declare` is safe to call repeatedly)
//! and mirror the reconnecting-publisher pattern of a `RabbitMQPublisher`:
//! declare the exchange once per connection, then declare/bind queues.
use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, ExchangeKind};

use ground_protocol::error::CoreError;

pub const EXCHANGE_RAW: &str = "telemetry.raw";
pub const EXCHANGE_DECODED: &str = "telemetry.decoded";
pub const QUEUE_ALERT_DETECTED: &str = "alert.detected";
pub const QUEUE_ALERT_NOTIFY: &str = "alert.notify";
pub const QUEUE_DECODED_DB: &str = "q.decoded.db_persistence";
pub const QUEUE_DECODED_ALERTS: &str = "q.decoded.alerts";
pub const QUEUE_DECODER_NOT_FOUND: &str = "decoder.not_found";
pub const QUEUE_DECODER_FAILED: &str = "decoder.failed";

fn durable_exchange_opts() -> ExchangeDeclareOptions {
    ExchangeDeclareOptions {
        durable: true,
        ..Default::default()
    }
}

fn durable_queue_opts() -> QueueDeclareOptions {
    QueueDeclareOptions {
        durable: true,
        ..Default::default()
    }
}

fn to_core_error(context: &str, err: lapin::Error) -> CoreError {
    CoreError::TransientIo(format!("{context}: {err}"))
}

/// `telemetry.raw`, topic exchange, one queue `pkt.<name>` per packet bound
/// by routing key `<name>`.
pub async fn declare_raw_topology(channel: &Channel, packet_names: &[String]) -> Result<(), CoreError> {
    channel
        .exchange_declare(
            EXCHANGE_RAW,
            ExchangeKind::Topic,
            durable_exchange_opts(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| to_core_error("declaring telemetry.raw", e))?;

    for name in packet_names {
        let queue_name = format!("pkt.{name}");
        channel
            .queue_declare(&queue_name, durable_queue_opts(), FieldTable::default())
            .await
            .map_err(|e| to_core_error("declaring packet queue", e))?;
        channel
            .queue_bind(
                &queue_name,
                EXCHANGE_RAW,
                name,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| to_core_error("binding packet queue", e))?;
    }
    Ok(())
}

/// `telemetry.decoded`, topic exchange, bound with wildcard `#` by the DB
/// sink and the alert builder queues.
pub async fn declare_decoded_topology(channel: &Channel) -> Result<(), CoreError> {
    channel
        .exchange_declare(
            EXCHANGE_DECODED,
            ExchangeKind::Topic,
            durable_exchange_opts(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| to_core_error("declaring telemetry.decoded", e))?;

    for queue_name in [QUEUE_DECODED_DB, QUEUE_DECODED_ALERTS] {
        channel
            .queue_declare(queue_name, durable_queue_opts(), FieldTable::default())
            .await
            .map_err(|e| to_core_error("declaring decoded queue", e))?;
        channel
            .queue_bind(
                queue_name,
                EXCHANGE_DECODED,
                "#",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| to_core_error("binding decoded queue", e))?;
    }
    Ok(())
}

/// `alert.detected` and `alert.notify`, plain durable queues published to
/// directly (no fan-out needed: one producer, one consumer each).
pub async fn declare_alert_queues(channel: &Channel) -> Result<(), CoreError> {
    for queue_name in [QUEUE_ALERT_DETECTED, QUEUE_ALERT_NOTIFY] {
        channel
            .queue_declare(queue_name, durable_queue_opts(), FieldTable::default())
            .await
            .map_err(|e| to_core_error("declaring alert queue", e))?;
    }
    Ok(())
}

/// Sibling dead-letter sinks for the decoder: `decoder.not_found` and
/// `decoder.failed` (§4.3, §4.6). Published to via the default exchange, so
/// the routing key is simply the queue name.
pub async fn declare_decoder_error_queues(channel: &Channel) -> Result<(), CoreError> {
    for queue_name in [QUEUE_DECODER_NOT_FOUND, QUEUE_DECODER_FAILED] {
        channel
            .queue_declare(queue_name, durable_queue_opts(), FieldTable::default())
            .await
            .map_err(|e| to_core_error("declaring decoder error queue", e))?;
    }
    Ok(())
}
