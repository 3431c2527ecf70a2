//! C9 — Alert Worker & Notifier: persists detected alerts, forwards them to
//! the notify sink, and updates status once a notification is sent.
//!
//! Grounded in `worker.py` + `notifier.py`, run here as two consumer tasks in
//! one process instead of two separate Python services (§2 crate map).
mod config;
mod notifier;
mod pg;

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ground_bus::client::BusClient;
use ground_bus::topology;
use ground_protocol::error::CoreError;
use ground_protocol::model::{AlertRecord, AlertStatus, DetectedAlert};

use notifier::Notifier;
use pg::AlertDb;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("ground_alert_worker=info".parse().unwrap())
                .add_directive("ground_bus=info".parse().unwrap()),
        )
        .compact()
        .init();

    let cfg = config::Cli::parse_and_build_config();
    info!(amqp_url = %cfg.amqp_url, "ground-alert-worker starting");

    let db = Arc::new(AlertDb::connect(&cfg.database_url).await?);
    let notifier = Arc::new(Notifier::new(cfg.smtp)?);

    let bus = BusClient::connect(&cfg.amqp_url).await?;
    topology::declare_alert_queues(bus.channel()).await?;

    let mut handles = Vec::new();

    {
        let bus = bus.clone();
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            let result = bus
                .consume(topology::QUEUE_ALERT_DETECTED, "alert-worker", move |delivery| {
                    let bus = bus.clone();
                    let db = db.clone();
                    async move { handle_detected(&bus, &db, &delivery.data).await }
                })
                .await;
            if let Err(err) = result {
                error!(%err, "alert-detected consumer loop ended");
            }
        }));
    }
    {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            let result = bus
                .consume(topology::QUEUE_ALERT_NOTIFY, "alert-notifier", move |delivery| {
                    let db = db.clone();
                    let notifier = notifier.clone();
                    async move { handle_notify(&db, &notifier, &delivery.data).await }
                })
                .await;
            if let Err(err) = result {
                error!(%err, "alert-notify consumer loop ended");
            }
        }));
    }

    info!("alert worker running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await.ok();
    for handle in handles {
        handle.abort();
    }
    Ok(())
}

/// Insert the detected alert, attach the surrogate id and engine time, and
/// republish to the notify queue — mirrors `worker.py`'s `callback`.
async fn handle_detected(bus: &BusClient, db: &AlertDb, body: &[u8]) -> Result<(), CoreError> {
    let detected: DetectedAlert =
        serde_json::from_slice(body).map_err(|e| CoreError::Input(format!("malformed detected alert: {e}")))?;

    let engine_time = Utc::now();
    let record = match db.insert(&detected, engine_time).await {
        Ok(db_id) => {
            info!(id = db_id, metric = %detected.metric, "saved alert to db");
            detected.into_record(db_id, engine_time)
        }
        Err(err) => {
            // Continue to notification even if persistence failed, matching
            // the original's best-effort behavior; no surrogate id exists to
            // attach, so the notifier won't be able to update a status row.
            warn!(%err, metric = %detected.metric, "database error while saving alert");
            let mut record = detected.into_record(0, engine_time);
            record.id = None;
            record
        }
    };

    bus.publish_json("", topology::QUEUE_ALERT_NOTIFY, &record).await?;
    info!(severity = %record.severity, "forwarded alert -> alert.notify");
    Ok(())
}

/// Render, send (with one retry), and on success advance the alert's status.
async fn handle_notify(db: &AlertDb, notifier: &Notifier, body: &[u8]) -> Result<(), CoreError> {
    let record: AlertRecord =
        serde_json::from_slice(body).map_err(|e| CoreError::Input(format!("malformed notify alert: {e}")))?;

    info!(metric = %record.metric, severity = %record.severity, "received alert for notification");

    match notifier.send_with_retry(&record).await {
        Ok(()) => {
            if let Some(id) = record.id {
                if let Err(err) = db.update_status(id, AlertStatus::AlertNotified).await {
                    warn!(id, %err, "failed to update alert status to notified");
                }
            }
            Ok(())
        }
        Err(err) => {
            warn!(metric = %record.metric, %err, "email notification failed");
            Ok(())
        }
    }
}
