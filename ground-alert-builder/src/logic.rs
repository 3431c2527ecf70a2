//! Threshold rule engine: decoded row + configured bounds -> graded alert.
//!
//! Grounded in `evaluate_metric`/`evaluate_tm` (`alert_logic.py`): hard RED
//! on out-of-bounds values, else a percent-of-range proximity score graded
//! against yellow/amber/red thresholds (global, overridden per packet).
use std::collections::HashMap;

use ground_protocol::config::{AlertConfigFile, PacketAlertConfig, ThresholdPercents};
use ground_protocol::model::{DecodedRow, DetectedAlert, PacketEnvelope, Severity, Value};

/// One metric's verdict: `None` means "within the yellow band, no alert".
fn evaluate_metric(
    value: f64,
    min_v: Option<f64>,
    max_v: Option<f64>,
    thresholds: ThresholdPercents,
) -> Option<(Severity, f64, &'static str)> {
    if let Some(min_v) = min_v {
        if value < min_v {
            return Some((Severity::Red, 100.0, "Value below minimum limit"));
        }
    }
    if let Some(max_v) = max_v {
        if value > max_v {
            return Some((Severity::Red, 100.0, "Value above maximum limit"));
        }
    }

    let (min_v, max_v) = match (min_v, max_v) {
        (Some(a), Some(b)) if a != b => (a, b),
        _ => return None,
    };

    let range = max_v - min_v;
    let distance = (value - min_v).min(max_v - value);
    let percent_used = (100.0 * (1.0 - distance / range) * 100.0).round() / 100.0;

    if percent_used >= thresholds.red_percent {
        Some((Severity::Red, percent_used, "Reached 100% operational limit"))
    } else if percent_used >= thresholds.amber_percent {
        Some((Severity::Amber, percent_used, "Above 90% operational limit"))
    } else if percent_used >= thresholds.yellow_percent {
        Some((Severity::Yellow, percent_used, "Above 80% operational limit"))
    } else {
        None
    }
}

fn evaluate_row(
    row: &DecodedRow,
    raw_packet_name: &str,
    timestamp: chrono::DateTime<chrono::Utc>,
    packet_cfg: &PacketAlertConfig,
    global_thresholds: ThresholdPercents,
    config: &AlertConfigFile,
) -> Vec<DetectedAlert> {
    let active_thresholds = packet_cfg.thresholds.unwrap_or(global_thresholds);
    let submodule_id = row
        .get("Submodule_ID")
        .and_then(Value::as_i64)
        .map(|v| v.to_string())
        .unwrap_or_else(|| "UNKNOWN".to_string());
    let submodule_name = config.submodule_name(&submodule_id);

    let mut alerts = Vec::new();
    for (metric, bounds) in &packet_cfg.metrics {
        let Some(value) = row.get(metric).and_then(Value::as_f64) else {
            continue;
        };
        let Some((severity, percent, reason)) = evaluate_metric(value, bounds.min, bounds.max, active_thresholds)
        else {
            continue;
        };
        alerts.push(DetectedAlert {
            timestamp: Some(timestamp),
            packet_raw: raw_packet_name.to_string(),
            packet_matched: packet_cfg.packet_name.clone(),
            submodule_id: submodule_id.clone(),
            submodule_name: submodule_name.clone(),
            queue_id: packet_cfg.queue_id,
            metric: metric.clone(),
            value,
            min: bounds.min,
            max: bounds.max,
            severity,
            severity_percent: percent,
            reason: reason.to_string(),
        });
    }
    alerts
}

/// Evaluate every instance row in a decoded envelope against the indexed
/// alert config, keyed by that row's `Queue_ID`. Rows with no matching
/// `queue_id` entry produce no alerts.
pub fn evaluate_envelope(
    envelope: &PacketEnvelope,
    config: &AlertConfigFile,
    config_index: &HashMap<i64, &PacketAlertConfig>,
) -> Vec<DetectedAlert> {
    let mut alerts = Vec::new();
    for row in &envelope.data {
        let Some(queue_id) = row.get("Queue_ID").and_then(Value::as_i64) else {
            continue;
        };
        let Some(packet_cfg) = config_index.get(&queue_id) else {
            continue;
        };
        alerts.extend(evaluate_row(
            row,
            &envelope.meta.packet_name,
            envelope.meta.timestamp_utc,
            packet_cfg,
            config.thresholds,
            config,
        ));
    }
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use ground_protocol::config::MetricBounds;
    use ground_protocol::model::PacketEnvelopeMeta;
    use std::collections::HashMap as Map;

    fn thresholds() -> ThresholdPercents {
        ThresholdPercents {
            yellow_percent: 80.0,
            amber_percent: 90.0,
            red_percent: 100.0,
        }
    }

    #[test]
    fn amber_at_97_5_percent() {
        // distance=0.5, range=20 -> percent=97.5
        let result = evaluate_metric(9.5, Some(-10.0), Some(10.0), thresholds());
        assert_eq!(result, Some((Severity::Amber, 97.5, "Above 90% operational limit")));
    }

    #[test]
    fn red_above_max() {
        let result = evaluate_metric(10.5, Some(-10.0), Some(10.0), thresholds());
        assert_eq!(result.unwrap().0, Severity::Red);
        assert_eq!(result.unwrap().1, 100.0);
    }

    #[test]
    fn below_yellow_band_is_no_alert() {
        assert_eq!(evaluate_metric(0.0, Some(-10.0), Some(10.0), thresholds()), None);
    }

    #[test]
    fn evaluate_envelope_skips_unmatched_queue_ids() {
        let mut row = DecodedRow::new();
        row.insert("Queue_ID", Value::Int(99));
        row.insert("Submodule_ID", Value::Int(1));
        row.insert("Sun_Vector_Z", Value::Float(9.5));
        let envelope = PacketEnvelope {
            meta: PacketEnvelopeMeta {
                packet_name: "HEALTH_ADCS_CSS_VECTOR".to_string(),
                timestamp_utc: chrono::Utc::now(),
            },
            data: vec![row],
        };
        let config = AlertConfigFile {
            thresholds: thresholds(),
            submodules: Map::new(),
            packets: vec![PacketAlertConfig {
                queue_id: 7,
                packet_name: "HEALTH_ADCS_CSS_VECTOR".to_string(),
                thresholds: None,
                metrics: {
                    let mut m = Map::new();
                    m.insert(
                        "Sun_Vector_Z".to_string(),
                        MetricBounds {
                            min: Some(-10.0),
                            max: Some(10.0),
                        },
                    );
                    m
                },
            }],
        };
        let index = config.index_by_queue_id();
        assert!(evaluate_envelope(&envelope, &config, &index).is_empty());
    }

    #[test]
    fn evaluate_envelope_emits_amber_alert_for_matched_queue_id() {
        let mut row = DecodedRow::new();
        row.insert("Queue_ID", Value::Int(7));
        row.insert("Submodule_ID", Value::Int(1));
        row.insert("Sun_Vector_Z", Value::Float(9.5));
        let envelope = PacketEnvelope {
            meta: PacketEnvelopeMeta {
                packet_name: "HEALTH_ADCS_CSS_VECTOR".to_string(),
                timestamp_utc: chrono::Utc::now(),
            },
            data: vec![row],
        };
        let mut submodules = Map::new();
        submodules.insert("1".to_string(), "ADCS".to_string());
        let config = AlertConfigFile {
            thresholds: thresholds(),
            submodules,
            packets: vec![PacketAlertConfig {
                queue_id: 7,
                packet_name: "HEALTH_ADCS_CSS_VECTOR".to_string(),
                thresholds: None,
                metrics: {
                    let mut m = Map::new();
                    m.insert(
                        "Sun_Vector_Z".to_string(),
                        MetricBounds {
                            min: Some(-10.0),
                            max: Some(10.0),
                        },
                    );
                    m
                },
            }],
        };
        let index = config.index_by_queue_id();
        let alerts = evaluate_envelope(&envelope, &config, &index);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Amber);
        assert_eq!(alerts[0].submodule_name, "ADCS");
    }
}
