//! Persistence for the `alerts` table: insert on detection, status update on
//! successful notification.
//!
//! Grounded in the `Alert` SQLAlchemy model (`worker.py`/`notifier.py`):
//! `create_all` on startup, an `INSERT ... RETURNING id` to capture the
//! surrogate id the notifier later updates by primary key.
use sqlx::PgPool;

use ground_protocol::error::CoreError;
use ground_protocol::model::{AlertRecord, AlertStatus, DetectedAlert};

pub struct AlertDb {
    pool: PgPool,
}

impl AlertDb {
    pub async fn connect(database_url: &str) -> Result<Self, CoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| CoreError::PermanentIo(format!("connecting to postgres: {e}")))?;
        let db = Self { pool };
        db.ensure_table().await?;
        Ok(db)
    }

    async fn ensure_table(&self) -> Result<(), CoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS alerts (
                id BIGSERIAL PRIMARY KEY,
                timestamp TIMESTAMPTZ,
                packet_raw TEXT,
                packet_matched TEXT,
                submodule_id TEXT,
                submodule_name TEXT,
                queue_id BIGINT,
                metric TEXT,
                value DOUBLE PRECISION,
                min_limit DOUBLE PRECISION,
                max_limit DOUBLE PRECISION,
                severity TEXT,
                severity_percent DOUBLE PRECISION,
                reason TEXT,
                status TEXT,
                engine_time TIMESTAMPTZ
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::PermanentIo(format!("creating alerts table: {e}")))?;
        Ok(())
    }

    /// Insert a freshly detected alert and return its surrogate id.
    pub async fn insert(&self, alert: &DetectedAlert, engine_time: chrono::DateTime<chrono::Utc>) -> Result<i64, CoreError> {
        let row: (i64,) = sqlx::query_as(
            "INSERT INTO alerts
                (timestamp, packet_raw, packet_matched, submodule_id, submodule_name, queue_id,
                 metric, value, min_limit, max_limit, severity, severity_percent, reason, status, engine_time)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             RETURNING id",
        )
        .bind(alert.timestamp)
        .bind(&alert.packet_raw)
        .bind(&alert.packet_matched)
        .bind(&alert.submodule_id)
        .bind(&alert.submodule_name)
        .bind(alert.queue_id)
        .bind(&alert.metric)
        .bind(alert.value)
        .bind(alert.min)
        .bind(alert.max)
        .bind(alert.severity.as_str())
        .bind(alert.severity_percent)
        .bind(&alert.reason)
        .bind(AlertStatus::AlertIdentified.as_str())
        .bind(engine_time)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| CoreError::PermanentIo(format!("inserting alert: {e}")))?;
        Ok(row.0)
    }

    async fn current_status(&self, id: i64) -> Result<AlertStatus, CoreError> {
        let row: (String,) = sqlx::query_as("SELECT status FROM alerts WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CoreError::PermanentIo(format!("reading alert {id} status: {e}")))?;
        AlertStatus::parse(&row.0).ok_or_else(|| CoreError::PermanentIo(format!("unknown stored status {:?}", row.0)))
    }

    /// Update `id`'s status, rejecting any transition outside the alert
    /// lifecycle lattice.
    pub async fn update_status(&self, id: i64, next: AlertStatus) -> Result<(), CoreError> {
        let current = self.current_status(id).await?;
        if !current.can_transition_to(next) {
            return Err(CoreError::Input(format!(
                "rejected alert transition {current:?} -> {next:?} for id {id}"
            )));
        }
        sqlx::query("UPDATE alerts SET status = $1 WHERE id = $2")
            .bind(next.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::PermanentIo(format!("updating alert {id} status: {e}")))?;
        Ok(())
    }
}

/// Build the row the Alert Worker hands off to the notify sink once the
/// surrogate id is known (§3 `AlertRecord`).
pub fn to_record(alert: DetectedAlert, db_id: i64, engine_time: chrono::DateTime<chrono::Utc>) -> AlertRecord {
    alert.into_record(db_id, engine_time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ground_protocol::model::Severity;

    fn sample() -> DetectedAlert {
        DetectedAlert {
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
        }
    }

    #[test]
    fn to_record_starts_identified_with_given_id() {
        let record = to_record(sample(), 5, chrono::Utc::now());
        assert_eq!(record.id, Some(5));
        assert_eq!(record.status, AlertStatus::AlertIdentified);
    }
}
