//! Per-station health sub-runner.
//!
//! Grounded in `HealthRunner` (`mqtt_bridge.py`): one plain MQTT client per
//! station subscribed to its S-band/X-band health topics, persisting every
//! message to the matching health table.
use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::watch;
use tracing::warn;

use ground_protocol::config::StationConfig;
use ground_protocol::model::BridgeMessage;

use crate::sqlite_log::{SqliteLog, HEALTH_SBAND_TABLE, HEALTH_XBAND_TABLE};

pub struct HealthRunner {
    station: StationConfig,
    log: SqliteLog,
}

impl HealthRunner {
    pub fn new(station: StationConfig, log: SqliteLog) -> Self {
        Self { station, log }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }
            if let Err(err) = self.run_once(&mut shutdown).await {
                warn!(station = %self.station.id, %err, "health connection lost, reconnecting");
            }
            if *shutdown.borrow() {
                return;
            }
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(200)) => {}
                _ = shutdown.changed() => {}
            }
        }
    }

    async fn run_once(&self, shutdown: &mut watch::Receiver<bool>) -> Result<(), String> {
        let mut opts = MqttOptions::new(
            format!("health-{}", self.station.id),
            &self.station.health_host,
            self.station.health_port,
        );
        opts.set_keep_alive(Duration::from_secs(10));
        let (client, mut eventloop) = AsyncClient::new(opts, 32);

        client
            .subscribe(&self.station.health_sband_topic, QoS::AtMostOnce)
            .await
            .map_err(|e| format!("subscribe sband: {e}"))?;
        client
            .subscribe(&self.station.health_xband_topic, QoS::AtMostOnce)
            .await
            .map_err(|e| format!("subscribe xband: {e}"))?;

        loop {
            tokio::select! {
                ev = eventloop.poll() => {
                    match ev {
                        Ok(Event::Incoming(Packet::Publish(p))) => {
                            self.persist(p.topic, p.payload.to_vec()).await;
                        }
                        Ok(_) => {}
                        Err(e) => return Err(format!("health eventloop: {e}")),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn persist(&self, topic: String, payload: Vec<u8>) {
        let table = if topic == self.station.health_sband_topic {
            HEALTH_SBAND_TABLE
        } else {
            HEALTH_XBAND_TABLE
        };
        let msg = BridgeMessage::new(
            None,
            &payload,
            String::from_utf8_lossy(&payload).into_owned(),
            self.station.id.clone(),
            topic,
        );
        if let Err(err) = self.log.insert(table, &msg).await {
            warn!(station = %self.station.id, %err, table, "health log insert failed");
        }
    }
}
