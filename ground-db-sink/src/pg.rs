//! Postgres sink: per-packet table creation/evolution and bulk insert.
//!
//! Grounded in `PostgresClient` (`db_client.py`): a process-local set of
//! known table names guards against a redundant `CREATE TABLE IF NOT
//! EXISTS` on every envelope; `UndefinedTable` at insert time invalidates
//! the cache entry and retries once after recreating the table.
use std::collections::HashSet;

use sqlx::{PgPool, Row};
use tokio::sync::Mutex;

use ground_protocol::error::CoreError;
use ground_protocol::model::{DecodedRow, Value};

const DECODER_NOT_FOUND_TABLE: &str = "DECODER_NOT_FOUND";
const DECODER_FAILED_TABLE: &str = "DECODER_FAILED";

pub struct PgSink {
    pool: PgPool,
    known_tables: Mutex<HashSet<String>>,
}

fn infer_pg_type(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "BOOLEAN",
        Value::Int(_) => "BIGINT",
        Value::Float(_) => "DOUBLE PRECISION",
        Value::Timestamp(_) => "TIMESTAMPTZ",
        Value::Str(_) | Value::Null => "TEXT",
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl PgSink {
    pub async fn connect(database_url: &str) -> Result<Self, CoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| CoreError::PermanentIo(format!("connecting to postgres: {e}")))?;
        let sink = Self {
            pool,
            known_tables: Mutex::new(HashSet::new()),
        };
        sink.ensure_fixed_table(DECODER_NOT_FOUND_TABLE).await?;
        sink.ensure_fixed_table(DECODER_FAILED_TABLE).await?;
        Ok(sink)
    }

    async fn ensure_fixed_table(&self, table: &str) -> Result<(), CoreError> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id BIGSERIAL PRIMARY KEY,
                created_at TIMESTAMPTZ DEFAULT NOW(),
                packet_name TEXT,
                hex_payload TEXT,
                error TEXT
            )",
            quote_ident(table)
        );
        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::PermanentIo(format!("creating {table}: {e}")))?;
        self.known_tables.lock().await.insert(table.to_string());
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> Result<bool, CoreError> {
        let row = sqlx::query("SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_name = $1)")
            .bind(table)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CoreError::PermanentIo(format!("checking existence of {table}: {e}")))?;
        Ok(row.get::<bool, _>(0))
    }

    /// Ensure a table exists for `target_table`, inferring columns from
    /// `sample_row`'s types and adding the surrogate `id`/`created_at`
    /// columns. Cached after the first successful creation/verification.
    pub async fn ensure_table(&self, target_table: &str, sample_row: &DecodedRow) -> Result<(), CoreError> {
        {
            let cache = self.known_tables.lock().await;
            if cache.contains(target_table) {
                return Ok(());
            }
        }
        if self.table_exists(target_table).await? {
            self.known_tables.lock().await.insert(target_table.to_string());
            return Ok(());
        }

        let mut columns = vec![
            "id BIGSERIAL PRIMARY KEY".to_string(),
            "created_at TIMESTAMPTZ DEFAULT NOW()".to_string(),
        ];
        for (name, value) in sample_row.iter() {
            columns.push(format!("{} {}", quote_ident(name), infer_pg_type(value)));
        }
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(target_table),
            columns.join(", ")
        );
        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::PermanentIo(format!("creating table {target_table}: {e}")))?;
        self.known_tables.lock().await.insert(target_table.to_string());
        Ok(())
    }

    /// Bulk-insert `rows` with a single multi-row `INSERT`, columns taken
    /// from the first row's keys (§4.7, §8 "no dedup guarantee"). On
    /// `UndefinedTable` the cache entry is invalidated, the table is
    /// recreated from `rows[0]`, and the insert is retried exactly once.
    pub async fn insert_rows(&self, target_table: &str, rows: &[DecodedRow]) -> Result<(), CoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        match self.try_insert_rows(target_table, rows).await {
            Ok(()) => Ok(()),
            Err(CoreError::PermanentIo(msg)) if msg.contains("undefined_table") || msg.contains("does not exist") => {
                tracing::warn!(table = target_table, "table missing at insert time, recreating");
                self.known_tables.lock().await.remove(target_table);
                self.ensure_table(target_table, &rows[0]).await?;
                self.try_insert_rows(target_table, rows).await
            }
            Err(e) => Err(e),
        }
    }

    async fn try_insert_rows(&self, target_table: &str, rows: &[DecodedRow]) -> Result<(), CoreError> {
        let keys: Vec<String> = rows[0].iter().map(|(k, _)| k.clone()).collect();
        let columns_sql = keys.iter().map(|k| quote_ident(k)).collect::<Vec<_>>().join(", ");

        let mut builder: sqlx::QueryBuilder<sqlx::Postgres> = sqlx::QueryBuilder::new(format!(
            "INSERT INTO {} ({columns_sql}) ",
            quote_ident(target_table)
        ));
        builder.push_values(rows, |mut b, row| {
            for key in &keys {
                match row.get(key) {
                    Some(Value::Int(i)) => {
                        b.push_bind(*i);
                    }
                    Some(Value::Float(f)) => {
                        b.push_bind(*f);
                    }
                    Some(Value::Bool(v)) => {
                        b.push_bind(*v);
                    }
                    Some(Value::Timestamp(ts)) => {
                        b.push_bind(*ts);
                    }
                    Some(Value::Str(s)) => {
                        b.push_bind(s.clone());
                    }
                    Some(Value::Null) | None => {
                        b.push_bind(None::<String>);
                    }
                }
            }
        });

        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::PermanentIo(e.to_string()))?;
        Ok(())
    }

    pub async fn insert_decoder_not_found(&self, packet_name: &str, hex_payload: &str, error: &str) -> Result<(), CoreError> {
        self.insert_decoder_event(DECODER_NOT_FOUND_TABLE, packet_name, hex_payload, error).await
    }

    pub async fn insert_decoder_failed(&self, packet_name: &str, hex_payload: &str, error: &str) -> Result<(), CoreError> {
        self.insert_decoder_event(DECODER_FAILED_TABLE, packet_name, hex_payload, error).await
    }

    async fn insert_decoder_event(&self, table: &str, packet_name: &str, hex_payload: &str, error: &str) -> Result<(), CoreError> {
        let sql = format!(
            "INSERT INTO {} (packet_name, hex_payload, error) VALUES ($1, $2, $3)",
            quote_ident(table)
        );
        sqlx::query(&sql)
            .bind(packet_name)
            .bind(hex_payload)
            .bind(error)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::PermanentIo(format!("inserting into {table}: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ground_protocol::model::Value;

    #[test]
    fn infers_pg_types_from_value_variants() {
        assert_eq!(infer_pg_type(&Value::Bool(true)), "BOOLEAN");
        assert_eq!(infer_pg_type(&Value::Int(1)), "BIGINT");
        assert_eq!(infer_pg_type(&Value::Float(1.0)), "DOUBLE PRECISION");
        assert_eq!(infer_pg_type(&Value::Str("x".to_string())), "TEXT");
        assert_eq!(infer_pg_type(&Value::Null), "TEXT");
    }

    #[test]
    fn quote_ident_escapes_embedded_quotes() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
