//! In-memory `(station_id, logical_topic) -> {rx,tx} {msgs,bytes}` counters.
//!
//! Grounded in `Stats` (`stats.py`): one mutex guards a flat map; callers get
//! snapshot copies, never a live reference (§5, "guarded by a single mutex").
use std::collections::HashMap;
use std::sync::Mutex;

use ground_protocol::model::LogicalTopic;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub rx_msgs: u64,
    pub rx_bytes: u64,
    pub tx_msgs: u64,
    pub tx_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Rx,
    Tx,
}

#[derive(Default)]
pub struct Stats {
    counters: Mutex<HashMap<(String, LogicalTopic), Counters>>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(&self, station_id: &str, topic: LogicalTopic, direction: Direction, byte_count: usize) {
        let mut guard = self.counters.lock().expect("stats mutex poisoned");
        let entry = guard
            .entry((station_id.to_string(), topic))
            .or_insert_with(Counters::default);
        match direction {
            Direction::Rx => {
                entry.rx_msgs += 1;
                entry.rx_bytes += byte_count as u64;
            }
            Direction::Tx => {
                entry.tx_msgs += 1;
                entry.tx_bytes += byte_count as u64;
            }
        }
    }

    /// All four logical topics for one station, zeroed where unused.
    pub fn snapshot(&self, station_id: &str) -> HashMap<LogicalTopic, Counters> {
        const TOPICS: [LogicalTopic; 4] = [
            LogicalTopic::CosmosCommand,
            LogicalTopic::CosmosTelemetry,
            LogicalTopic::SatOsUplink,
            LogicalTopic::SatOsDownlink,
        ];
        let guard = self.counters.lock().expect("stats mutex poisoned");
        TOPICS
            .into_iter()
            .map(|t| {
                let c = guard
                    .get(&(station_id.to_string(), t))
                    .copied()
                    .unwrap_or_default();
                (t, c)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bump_accumulates_per_station_topic() {
        let stats = Stats::new();
        stats.bump("GND1", LogicalTopic::CosmosCommand, Direction::Rx, 8);
        stats.bump("GND1", LogicalTopic::CosmosCommand, Direction::Rx, 4);
        stats.bump("GND1", LogicalTopic::SatOsUplink, Direction::Tx, 20);

        let snap = stats.snapshot("GND1");
        let cmd = snap[&LogicalTopic::CosmosCommand];
        assert_eq!(cmd.rx_msgs, 2);
        assert_eq!(cmd.rx_bytes, 12);
        assert_eq!(snap[&LogicalTopic::SatOsUplink].tx_bytes, 20);
    }

    #[test]
    fn snapshot_zeroes_unused_topics() {
        let stats = Stats::new();
        stats.bump("GND2", LogicalTopic::CosmosCommand, Direction::Rx, 1);
        let snap = stats.snapshot("GND2");
        assert_eq!(snap[&LogicalTopic::CosmosTelemetry], Counters::default());
    }
}
