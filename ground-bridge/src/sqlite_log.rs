//! Durable per-station bridge log: one SQLite file per station, one table
//! per logical topic plus the two health tables (§3 `BridgeMessage`).
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use ground_protocol::error::CoreError;
use ground_protocol::model::{BridgeMessage, LogicalTopic};

const TABLES: [&str; 6] = [
    "COSMOS_COMMAND_LOG",
    "COSMOS_TELEMETRY_LOG",
    "SATOS_UPLINK_LOG",
    "SATOS_DOWNLINK_LOG",
    "HEALTH_SBAND_LOG",
    "HEALTH_XBAND_LOG",
];

/// `cosmos/command` -> `COSMOS_COMMAND_LOG`, and so on for the bridge topics.
pub fn table_for_topic(topic: LogicalTopic) -> &'static str {
    match topic {
        LogicalTopic::CosmosCommand => "COSMOS_COMMAND_LOG",
        LogicalTopic::CosmosTelemetry => "COSMOS_TELEMETRY_LOG",
        LogicalTopic::SatOsUplink => "SATOS_UPLINK_LOG",
        LogicalTopic::SatOsDownlink => "SATOS_DOWNLINK_LOG",
    }
}

pub const HEALTH_SBAND_TABLE: &str = "HEALTH_SBAND_LOG";
pub const HEALTH_XBAND_TABLE: &str = "HEALTH_XBAND_LOG";

#[derive(Clone)]
pub struct SqliteLog {
    pool: SqlitePool,
}

impl SqliteLog {
    /// Open (creating if absent) `<dir>/<station_id>.db` and ensure every
    /// bridge/health table exists.
    pub async fn open(dir: &str, station_id: &str) -> Result<Self, CoreError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| CoreError::PermanentIo(format!("creating sqlite dir {dir}: {e}")))?;
        let path = format!("{dir}/{station_id}.db");
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| CoreError::PermanentIo(format!("opening {path}: {e}")))?;

        for table in TABLES {
            let ddl = format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    ts_utc TEXT NOT NULL,
                    direction TEXT,
                    bytes INTEGER NOT NULL,
                    raw_blob BLOB NOT NULL,
                    display_text TEXT NOT NULL,
                    station_id TEXT NOT NULL,
                    mqtt_topic TEXT NOT NULL
                )"
            );
            sqlx::query(&ddl)
                .execute(&pool)
                .await
                .map_err(|e| CoreError::PermanentIo(format!("creating table {table}: {e}")))?;

            let index_ddl = format!(
                "CREATE INDEX IF NOT EXISTS ix_{}_station_id ON {table}(station_id, id DESC)",
                table.to_lowercase()
            );
            sqlx::query(&index_ddl)
                .execute(&pool)
                .await
                .map_err(|e| CoreError::PermanentIo(format!("creating index on {table}: {e}")))?;
        }

        Ok(Self { pool })
    }

    /// Insert one row into `table`, returning its surrogate `id`.
    pub async fn insert(&self, table: &str, msg: &BridgeMessage) -> Result<i64, CoreError> {
        let direction = msg.direction.map(|d| match d {
            ground_protocol::model::BridgeDirection::AtoB => "AtoB",
            ground_protocol::model::BridgeDirection::BtoA => "BtoA",
        });
        let sql = format!(
            "INSERT INTO {table} (ts_utc, direction, bytes, raw_blob, display_text, station_id, mqtt_topic)
             VALUES (?, ?, ?, ?, ?, ?, ?)"
        );
        let result = sqlx::query(&sql)
            .bind(msg.ts_utc.to_rfc3339())
            .bind(direction)
            .bind(msg.bytes)
            .bind(&msg.raw_blob)
            .bind(&msg.display_text)
            .bind(&msg.station_id)
            .bind(&msg.mqtt_topic)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::PermanentIo(format!("inserting into {table}: {e}")))?;
        Ok(result.last_insert_rowid())
    }

    #[cfg(test)]
    pub async fn count(&self, table: &str) -> i64 {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS c FROM {table}"))
            .fetch_one(&self.pool)
            .await
            .unwrap();
        row.get::<i64, _>("c")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ground_protocol::model::BridgeDirection;

    #[tokio::test]
    async fn inserts_and_counts_a_row() {
        let dir = std::env::temp_dir()
            .join(format!("ground-bridge-test-{}", uuid_like()))
            .to_string_lossy()
            .into_owned();
        let log = SqliteLog::open(&dir, "GND1").await.unwrap();
        let table = table_for_topic(LogicalTopic::CosmosCommand);
        let msg = BridgeMessage::new(
            Some(BridgeDirection::AtoB),
            &[0xDE, 0xAD],
            "dead",
            "GND1",
            "cosmos/command",
        );
        let id = log.insert(table, &msg).await.unwrap();
        assert!(id >= 1);
        assert_eq!(log.count(table).await, 1);
        std::fs::remove_dir_all(dir).ok();
    }

    fn uuid_like() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos() as u64
    }
}
