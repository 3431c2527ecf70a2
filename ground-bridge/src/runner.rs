//! Per-station A<->B MQTT bridge.
//!
//! Grounded in `BridgeRunner` (`mqtt_bridge.py`): two MQTT clients, A local
//! and anonymous, B remote with TLS + credentials. Messages from A on
//! `cosmos/command` are frame-encrypted and forwarded to B; messages from B
//! on `topic_downlink` are frame-decrypted and forwarded to A. Every hop is
//! logged and counted regardless of whether the crypto step succeeds.
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, Transport};
use rustls::ClientConfig;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use ground_protocol::codec::{decrypt_frame, encrypt_frame, KeyRing};
use ground_protocol::config::StationConfig;
use ground_protocol::error::CoreError;
use ground_protocol::model::{BridgeDirection, BridgeMessage, LogicalTopic};

use crate::sqlite_log::{table_for_topic, SqliteLog};
use crate::stats::{Direction, Stats};

const TOPIC_COSMOS_COMMAND: &str = "cosmos/command";
const TOPIC_COSMOS_TELEMETRY: &str = "cosmos/telemetry";

#[derive(Debug, Deserialize)]
struct DownlinkEnvelope {
    message: String,
}

#[derive(Debug, Serialize)]
struct UplinkEnvelope<'a> {
    message: &'a str,
}

/// `Disconnected -> Connecting -> Connected -> Disconnected` per client (§4.5, §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connecting,
    Connected,
}

pub struct BridgeRunner {
    station: StationConfig,
    keys: KeyRing,
    stats: Arc<Stats>,
    log: SqliteLog,
}

impl BridgeRunner {
    pub fn new(station: StationConfig, keys: KeyRing, stats: Arc<Stats>, log: SqliteLog) -> Self {
        Self {
            station,
            keys,
            stats,
            log,
        }
    }

    /// Runs until `shutdown` is signalled, reconnecting both clients
    /// together on any failure.
    pub async fn run(&self, broker_a_host: &str, broker_a_port: u16, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }
            if let Err(err) = self.run_once(broker_a_host, broker_a_port, &mut shutdown).await {
                warn!(station = %self.station.id, %err, "bridge connection lost, reconnecting");
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

    async fn run_once(
        &self,
        broker_a_host: &str,
        broker_a_port: u16,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), CoreError> {
        let (client_a, mut eventloop_a) = connect_client_a(broker_a_host, broker_a_port, &self.station.id);
        let (client_b, mut eventloop_b) = connect_client_b(&self.station);

        client_a
            .subscribe(TOPIC_COSMOS_COMMAND, QoS::AtMostOnce)
            .await
            .map_err(|e| CoreError::TransientIo(format!("client A subscribe: {e}")))?;
        client_b
            .subscribe(&self.station.topic_downlink, QoS::AtMostOnce)
            .await
            .map_err(|e| CoreError::TransientIo(format!("client B subscribe: {e}")))?;

        let mut state_a = ClientState::Connecting;
        let mut state_b = ClientState::Connecting;

        loop {
            tokio::select! {
                ev = eventloop_a.poll() => {
                    match ev {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            transition(&self.station.id, "A", &mut state_a, ClientState::Connected);
                        }
                        Ok(Event::Incoming(Packet::Disconnect)) => {
                            transition(&self.station.id, "A", &mut state_a, ClientState::Disconnected);
                        }
                        Ok(Event::Incoming(Packet::Publish(p))) => {
                            self.handle_uplink(&client_b, p.payload.to_vec(), p.topic).await;
                        }
                        Ok(_) => {}
                        Err(e) => return Err(CoreError::TransientIo(format!("client A eventloop: {e}"))),
                    }
                }
                ev = eventloop_b.poll() => {
                    match ev {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            transition(&self.station.id, "B", &mut state_b, ClientState::Connected);
                        }
                        Ok(Event::Incoming(Packet::Disconnect)) => {
                            transition(&self.station.id, "B", &mut state_b, ClientState::Disconnected);
                        }
                        Ok(Event::Incoming(Packet::Publish(p))) => {
                            self.handle_downlink(&client_a, p.payload.to_vec(), p.topic).await;
                        }
                        Ok(_) => {}
                        Err(e) => return Err(CoreError::TransientIo(format!("client B eventloop: {e}"))),
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

    async fn handle_uplink(&self, client_b: &AsyncClient, raw: Vec<u8>, mqtt_topic: String) {
        self.stats.bump(&self.station.id, LogicalTopic::CosmosCommand, Direction::Rx, raw.len());
        self.log_row(
            LogicalTopic::CosmosCommand,
            Some(BridgeDirection::AtoB),
            &raw,
            hex_view(&raw),
            mqtt_topic,
        )
        .await;

        let encrypted = match encrypt_frame(&raw, &self.keys) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(station = %self.station.id, %err, "uplink encryption failed, dropping");
                return;
            }
        };
        let b64 = base64::engine::general_purpose::STANDARD.encode(&encrypted);
        let out_json = match serde_json::to_vec(&UplinkEnvelope { message: &b64 }) {
            Ok(v) => v,
            Err(err) => {
                warn!(station = %self.station.id, %err, "uplink envelope serialization failed, dropping");
                return;
            }
        };

        if let Err(err) = client_b
            .publish(&self.station.topic_uplink, QoS::AtMostOnce, false, out_json.clone())
            .await
        {
            warn!(station = %self.station.id, %err, "uplink publish to B failed");
            return;
        }

        self.stats.bump(&self.station.id, LogicalTopic::SatOsUplink, Direction::Tx, out_json.len());
        self.log_row(
            LogicalTopic::SatOsUplink,
            Some(BridgeDirection::AtoB),
            &out_json,
            String::from_utf8_lossy(&out_json).into_owned(),
            self.station.topic_uplink.clone(),
        )
        .await;
    }

    async fn handle_downlink(&self, client_a: &AsyncClient, payload: Vec<u8>, mqtt_topic: String) {
        self.stats.bump(&self.station.id, LogicalTopic::SatOsDownlink, Direction::Rx, payload.len());
        self.log_row(
            LogicalTopic::SatOsDownlink,
            Some(BridgeDirection::BtoA),
            &payload,
            truncate(&String::from_utf8_lossy(&payload), 2048),
            mqtt_topic,
        )
        .await;

        let decrypted = self.try_decrypt_downlink(&payload);
        let Some(decrypted) = decrypted else {
            return;
        };

        if let Err(err) = client_a
            .publish(TOPIC_COSMOS_TELEMETRY, QoS::AtMostOnce, false, decrypted.clone())
            .await
        {
            warn!(station = %self.station.id, %err, "downlink publish to A failed");
            return;
        }

        self.stats.bump(&self.station.id, LogicalTopic::CosmosTelemetry, Direction::Tx, decrypted.len());
        self.log_row(
            LogicalTopic::CosmosTelemetry,
            Some(BridgeDirection::BtoA),
            &decrypted,
            hex_view(&decrypted),
            TOPIC_COSMOS_TELEMETRY.to_string(),
        )
        .await;
    }

    /// Parse/decrypt failures simply drop the A-side publish (§4.5 "Failure semantics").
    fn try_decrypt_downlink(&self, payload: &[u8]) -> Option<Vec<u8>> {
        let envelope: DownlinkEnvelope = serde_json::from_slice(payload).ok()?;
        let encrypted = base64::engine::general_purpose::STANDARD
            .decode(envelope.message)
            .ok()?;
        decrypt_frame(&encrypted, &self.keys).ok()
    }

    async fn log_row(
        &self,
        topic: LogicalTopic,
        direction: Option<BridgeDirection>,
        payload: &[u8],
        display_text: impl Into<String>,
        mqtt_topic: String,
    ) {
        let msg = BridgeMessage::new(direction, payload, display_text, self.station.id.clone(), mqtt_topic);
        if let Err(err) = self.log.insert(table_for_topic(topic), &msg).await {
            warn!(station = %self.station.id, %err, table = table_for_topic(topic), "bridge log insert failed");
        }
    }
}

fn transition(station_id: &str, client: &str, state: &mut ClientState, next: ClientState) {
    if *state != next {
        info!(station = station_id, client, from = ?*state, to = ?next, "client state transition");
        *state = next;
    }
}

fn connect_client_a(host: &str, port: u16, station_id: &str) -> (AsyncClient, rumqttc::EventLoop) {
    let mut opts = MqttOptions::new(format!("bridge-a-{station_id}"), host, port);
    opts.set_keep_alive(Duration::from_secs(10));
    AsyncClient::new(opts, 32)
}

fn connect_client_b(station: &StationConfig) -> (AsyncClient, rumqttc::EventLoop) {
    let mut opts = MqttOptions::new(
        format!("bridge-b-{}", station.id),
        &station.broker_b_host,
        station.broker_b_port,
    );
    opts.set_keep_alive(Duration::from_secs(10));
    opts.set_credentials(&station.broker_b_username, &station.broker_b_password);
    opts.set_transport(Transport::Tls(rumqttc::TlsConfiguration::Rustls(Arc::new(
        tls_client_config(station.broker_b_tls_verify),
    ))));
    AsyncClient::new(opts, 32)
}

fn tls_client_config(verify: bool) -> ClientConfig {
    if verify {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth()
    } else {
        // Deployment runs with verification explicitly disabled via
        // `StationConfig.broker_b_tls_verify`; see DESIGN.md Open Question (c).
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(danger::NoCertVerifier))
            .with_no_client_auth()
    }
}

mod danger {
    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use rustls::{DigitallySignedStruct, SignatureScheme};

    #[derive(Debug)]
    pub struct NoCertVerifier;

    impl ServerCertVerifier for NoCertVerifier {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, rustls::Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn verify_tls13_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            vec![
                SignatureScheme::RSA_PKCS1_SHA256,
                SignatureScheme::RSA_PSS_SHA256,
                SignatureScheme::ECDSA_NISTP256_SHA256,
                SignatureScheme::ED25519,
            ]
        }
    }
}

/// Hex dump capped at 1024 hex chars, with a byte-count suffix when truncated.
fn hex_view(bytes: &[u8]) -> String {
    let full = hex::encode(bytes);
    if full.len() <= 1024 {
        full
    } else {
        format!("{}...({} bytes)", &full[..1024], bytes.len())
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_view_truncates_long_payloads() {
        let bytes = vec![0xABu8; 1024];
        let view = hex_view(&bytes);
        assert!(view.ends_with("...(1024 bytes)"));
    }

    #[test]
    fn hex_view_passes_short_payloads_through() {
        assert_eq!(hex_view(&[0xDE, 0xAD]), "dead");
    }
}
