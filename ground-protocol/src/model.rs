//! Data model: decoded rows, bus envelopes, bridge log rows, alert records.
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One cell of a [`DecodedRow`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Str(String),
    Null,
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

/// Ordered `{column -> value}` mapping; field order follows schema
/// declaration order, so downstream sinks see deterministic column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodedRow(pub IndexMap<String, Value>);

impl DecodedRow {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn extend(&mut self, other: DecodedRow) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketEnvelopeMeta {
    pub packet_name: String,
    pub timestamp_utc: DateTime<Utc>,
}

/// Decoded envelope published to `telemetry.decoded`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketEnvelope {
    pub meta: PacketEnvelopeMeta,
    pub data: Vec<DecodedRow>,
}

/// Raw packet record, forwarded verbatim from the upstream telemetry source
/// to `telemetry.raw`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPacketMessage {
    #[serde(rename = "__packet")]
    pub packet: String,
    pub buffer_base64: String,
    pub received_time_ns: Option<u64>,
}

/// One of the four logical bridge topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalTopic {
    #[serde(rename = "cosmos/command")]
    CosmosCommand,
    #[serde(rename = "cosmos/telemetry")]
    CosmosTelemetry,
    #[serde(rename = "SatOS/uplink")]
    SatOsUplink,
    #[serde(rename = "SatOS/downlink")]
    SatOsDownlink,
}

impl LogicalTopic {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalTopic::CosmosCommand => "cosmos/command",
            LogicalTopic::CosmosTelemetry => "cosmos/telemetry",
            LogicalTopic::SatOsUplink => "SatOS/uplink",
            LogicalTopic::SatOsDownlink => "SatOS/downlink",
        }
    }
}

impl std::fmt::Display for LogicalTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeDirection {
    AtoB,
    BtoA,
}

/// A row in the per-station SQLite bridge/health log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeMessage {
    pub id: Option<i64>,
    pub ts_utc: DateTime<Utc>,
    pub direction: Option<BridgeDirection>,
    pub bytes: i64,
    pub raw_blob: Vec<u8>,
    pub display_text: String,
    pub station_id: String,
    pub mqtt_topic: String,
}

impl BridgeMessage {
    pub fn new(
        direction: Option<BridgeDirection>,
        payload: &[u8],
        display_text: impl Into<String>,
        station_id: impl Into<String>,
        mqtt_topic: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            ts_utc: Utc::now(),
            direction,
            bytes: payload.len() as i64,
            raw_blob: payload.to_vec(),
            display_text: display_text.into(),
            station_id: station_id.into(),
            mqtt_topic: mqtt_topic.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Yellow,
    Amber,
    Red,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Yellow => "YELLOW",
            Severity::Amber => "AMBER",
            Severity::Red => "RED",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    AlertIdentified,
    AlertNotified,
    Acknowledged,
    Resolved,
    Dismissed,
}

impl AlertStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertStatus::AlertIdentified => "alert_identified",
            AlertStatus::AlertNotified => "alert_notified",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
            AlertStatus::Dismissed => "dismissed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "alert_identified" => AlertStatus::AlertIdentified,
            "alert_notified" => AlertStatus::AlertNotified,
            "acknowledged" => AlertStatus::Acknowledged,
            "resolved" => AlertStatus::Resolved,
            "dismissed" => AlertStatus::Dismissed,
            _ => return None,
        })
    }

    /// Alert lifecycle lattice: `alert_identified -> alert_notified ->
    /// acknowledged -> {resolved, dismissed}`. Any other pair is rejected,
    /// including skipping straight from identified to acknowledged.
    pub fn can_transition_to(self, next: AlertStatus) -> bool {
        use AlertStatus::*;
        matches!(
            (self, next),
            (AlertIdentified, AlertNotified)
                | (AlertNotified, Acknowledged)
                | (Acknowledged, Resolved)
                | (Acknowledged, Dismissed)
        )
    }
}

/// What the Alert Builder (C8) emits to `alert.detected` — everything an
/// `AlertRecord` has except the surrogate DB id and `engine_time`, which are
/// only known once the Alert Worker (C9) has persisted the row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedAlert {
    pub timestamp: Option<DateTime<Utc>>,
    pub packet_raw: String,
    pub packet_matched: String,
    pub submodule_id: String,
    pub submodule_name: String,
    pub queue_id: i64,
    pub metric: String,
    pub value: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub severity: Severity,
    pub severity_percent: f64,
    pub reason: String,
}

impl DetectedAlert {
    /// Attach the surrogate id and the moment the Alert Worker persisted
    /// this alert, producing the row forwarded to `alert.notify`.
    pub fn into_record(self, db_id: i64, engine_time: DateTime<Utc>) -> AlertRecord {
        AlertRecord {
            id: Some(db_id),
            timestamp: self.timestamp,
            packet_raw: self.packet_raw,
            packet_matched: self.packet_matched,
            submodule_id: self.submodule_id,
            submodule_name: self.submodule_name,
            queue_id: self.queue_id,
            metric: self.metric,
            value: self.value,
            min: self.min,
            max: self.max,
            severity: self.severity,
            severity_percent: self.severity_percent,
            reason: self.reason,
            status: AlertStatus::AlertIdentified,
            engine_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: Option<i64>,
    pub timestamp: Option<DateTime<Utc>>,
    pub packet_raw: String,
    pub packet_matched: String,
    pub submodule_id: String,
    pub submodule_name: String,
    pub queue_id: i64,
    pub metric: String,
    pub value: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub severity: Severity,
    pub severity_percent: f64,
    pub reason: String,
    pub status: AlertStatus,
    pub engine_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_lattice_rejects_skips() {
        assert!(AlertStatus::AlertIdentified.can_transition_to(AlertStatus::AlertNotified));
        assert!(!AlertStatus::AlertIdentified.can_transition_to(AlertStatus::Acknowledged));
        assert!(!AlertStatus::Resolved.can_transition_to(AlertStatus::Dismissed));
    }

    #[test]
    fn decoded_row_preserves_insertion_order() {
        let mut row = DecodedRow::new();
        row.insert("b", Value::Int(1));
        row.insert("a", Value::Int(2));
        let keys: Vec<_> = row.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn alert_status_round_trips_through_str() {
        for status in [
            AlertStatus::AlertIdentified,
            AlertStatus::AlertNotified,
            AlertStatus::Acknowledged,
            AlertStatus::Resolved,
            AlertStatus::Dismissed,
        ] {
            assert_eq!(AlertStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AlertStatus::parse("bogus"), None);
    }

    #[test]
    fn detected_alert_into_record_starts_identified() {
        let detected = DetectedAlert {
            timestamp: None,
            packet_raw: "RAW".to_string(),
            packet_matched: "MATCHED".to_string(),
            submodule_id: "1".to_string(),
            submodule_name: "ADCS".to_string(),
            queue_id: 7,
            metric: "Sun_Vector_Z".to_string(),
            value: 9.5,
            min: Some(-10.0),
            max: Some(10.0),
            severity: Severity::Amber,
            severity_percent: 97.5,
            reason: "Above 90% operational limit".to_string(),
        };
        let record = detected.into_record(42, Utc::now());
        assert_eq!(record.id, Some(42));
        assert_eq!(record.status, AlertStatus::AlertIdentified);
    }
}
