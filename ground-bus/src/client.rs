//! Thin publish/consume wrapper over a `lapin` connection: persistent JSON
//! messages, manual ack with `prefetch=1`, dead-letter-on-exception.
use std::sync::Arc;
use std::time::Duration;

use futures_lite::stream::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use serde::Serialize;
use tracing::{info, warn};

use ground_protocol::error::CoreError;
use ground_protocol::retry::with_backoff;

/// A connected bus handle: one AMQP connection and channel, shared by
/// everything a single worker process needs to publish or consume with.
#[derive(Clone)]
pub struct BusClient {
    channel: Arc<Channel>,
}

impl BusClient {
    /// Connect with bounded-retry backoff (2-5 s per the shared retry policy).
    pub async fn connect(amqp_url: &str) -> Result<Self, CoreError> {
        let connection = with_backoff("amqp connect", 5, Duration::from_secs(2), || async {
            Connection::connect(
                amqp_url,
                ConnectionProperties::default()
                    .with_executor(tokio_executor_trait::Tokio::current())
                    .with_reactor(tokio_reactor_trait::Tokio),
            )
            .await
            .map_err(|e| CoreError::TransientIo(format!("amqp connect: {e}")))
        })
        .await?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| CoreError::TransientIo(format!("amqp channel open: {e}")))?;

        // prefetch=1 bounds in-flight work per consumer (§4.3, §6 backpressure).
        channel
            .basic_qos(1, BasicQosOptions::default())
            .await
            .map_err(|e| CoreError::TransientIo(format!("amqp qos: {e}")))?;

        info!("connected to AMQP broker");
        Ok(Self {
            channel: Arc::new(channel),
        })
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Publish a JSON-serializable payload with `delivery_mode=2` (persistent).
    pub async fn publish_json<T: Serialize>(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &T,
    ) -> Result<(), CoreError> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| CoreError::Input(format!("serializing message: {e}")))?;

        self.channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await
            .map_err(|e| CoreError::TransientIo(format!("amqp publish: {e}")))?;
        Ok(())
    }

    /// Start a manual-ack consumer. `handler` is run once per delivery; its
    /// error is logged and the message is still acked (poison-loop avoidance
    /// — the failure is the caller's job to route to a dead-letter sink).
    pub async fn consume<F, Fut>(
        &self,
        queue_name: &str,
        consumer_tag: &str,
        mut handler: F,
    ) -> Result<(), CoreError>
    where
        F: FnMut(Delivery) -> Fut,
        Fut: std::future::Future<Output = Result<(), CoreError>>,
    {
        let mut consumer = self
            .channel
            .basic_consume(
                queue_name,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| CoreError::TransientIo(format!("amqp consume: {e}")))?;

        while let Some(delivery) = consumer.next().await {
            let delivery = match delivery {
                Ok(d) => d,
                Err(e) => {
                    warn!(queue = queue_name, error = %e, "delivery error");
                    continue;
                }
            };
            let delivery_tag = delivery.delivery_tag;
            if let Err(err) = handler(delivery).await {
                warn!(queue = queue_name, %err, "handler failed, acking to avoid poison loop");
            }
            if let Err(e) = self
                .channel
                .basic_ack(delivery_tag, BasicAckOptions::default())
                .await
            {
                warn!(queue = queue_name, error = %e, "ack failed");
            }
        }
        Ok(())
    }
}
