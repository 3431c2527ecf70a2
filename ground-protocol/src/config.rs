//! Shared config-file shapes: station list, alert config, packet list.
//!
//! These are loaded once at process startup and then threaded explicitly
//! into the services that need them — no process-wide singleton holds them.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One pairing of a local broker and a remote, TLS-secured broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    pub id: String,
    pub name: String,
    pub broker_b_host: String,
    pub broker_b_port: u16,
    pub broker_b_username: String,
    pub broker_b_password: String,
    pub topic_uplink: String,
    pub topic_downlink: String,
    pub health_host: String,
    pub health_port: u16,
    pub health_sband_topic: String,
    pub health_xband_topic: String,
    /// TLS verification is disabled in the deployment this mirrors; kept as
    /// an explicit, auditable flag rather than silently hard-coded off.
    #[serde(default)]
    pub broker_b_tls_verify: bool,
}

/// The full station list config file (one JSON array).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationListConfig {
    pub stations: Vec<StationConfig>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThresholdPercents {
    pub yellow_percent: f64,
    pub amber_percent: f64,
    pub red_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricBounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketAlertConfig {
    pub queue_id: i64,
    pub packet_name: String,
    #[serde(default)]
    pub thresholds: Option<ThresholdPercents>,
    pub metrics: HashMap<String, MetricBounds>,
}

/// `{thresholds, submodules: {id -> name}, packets: [...]}` indexed by
/// `queue_id` once loaded (see [`AlertConfigFile::index_by_queue_id`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfigFile {
    pub thresholds: ThresholdPercents,
    #[serde(default)]
    pub submodules: HashMap<String, String>,
    pub packets: Vec<PacketAlertConfig>,
}

impl AlertConfigFile {
    /// Index packet alert configs by `queue_id` for O(1) lookup per decoded row.
    pub fn index_by_queue_id(&self) -> HashMap<i64, &PacketAlertConfig> {
        self.packets.iter().map(|p| (p.queue_id, p)).collect()
    }

    /// Resolve a submodule's display name, falling back to `Submodule_{id}`
    /// when the config has no entry for it.
    pub fn submodule_name(&self, submodule_id: &str) -> String {
        self.submodules
            .get(submodule_id)
            .cloned()
            .unwrap_or_else(|| format!("Submodule_{submodule_id}"))
    }
}

/// Static array of telemetry + command packet names consumed by the ingestor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketListConfig {
    pub packets: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> AlertConfigFile {
        let mut submodules = HashMap::new();
        submodules.insert("1".to_string(), "ADCS".to_string());
        AlertConfigFile {
            thresholds: ThresholdPercents {
                yellow_percent: 80.0,
                amber_percent: 90.0,
                red_percent: 100.0,
            },
            submodules,
            packets: vec![PacketAlertConfig {
                queue_id: 7,
                packet_name: "HEALTH_ADCS_CSS_VECTOR".to_string(),
                thresholds: None,
                metrics: HashMap::new(),
            }],
        }
    }

    #[test]
    fn submodule_name_falls_back_when_unlisted() {
        let cfg = sample_config();
        assert_eq!(cfg.submodule_name("1"), "ADCS");
        assert_eq!(cfg.submodule_name("99"), "Submodule_99");
    }

    #[test]
    fn indexes_packets_by_queue_id() {
        let cfg = sample_config();
        let idx = cfg.index_by_queue_id();
        assert_eq!(idx.get(&7).unwrap().packet_name, "HEALTH_ADCS_CSS_VECTOR");
    }
}
