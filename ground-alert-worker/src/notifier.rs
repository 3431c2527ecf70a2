//! SMTP notification sink for detected alerts.
//!
//! Grounded in `notifier.py`: `send_email`/`pretty_print` render the same
//! fields; `SMTP_HOST == "mock"` logs instead of dialing out, and a send is
//! retried once before giving up (§4.9).
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, warn};

use ground_protocol::error::CoreError;
use ground_protocol::model::AlertRecord;

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from: String,
    pub to: String,
}

impl SmtpConfig {
    fn is_mock(&self) -> bool {
        self.host == "mock"
    }
}

pub enum Notifier {
    Mock(SmtpConfig),
    Smtp(SmtpConfig, AsyncSmtpTransport<Tokio1Executor>),
}

impl Notifier {
    pub fn new(cfg: SmtpConfig) -> Result<Self, CoreError> {
        if cfg.is_mock() {
            return Ok(Notifier::Mock(cfg));
        }
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
            .map_err(|e| CoreError::PermanentIo(format!("building smtp transport: {e}")))?
            .port(cfg.port)
            .credentials(Credentials::new(cfg.user.clone(), cfg.password.clone()))
            .build();
        Ok(Notifier::Smtp(cfg, transport))
    }

    fn config(&self) -> &SmtpConfig {
        match self {
            Notifier::Mock(cfg) | Notifier::Smtp(cfg, _) => cfg,
        }
    }

    /// Send with one in-process retry on a transient failure.
    pub async fn send_with_retry(&self, alert: &AlertRecord) -> Result<(), CoreError> {
        match self.send_once(alert).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(metric = %alert.metric, %err, "notification send failed, retrying once");
                self.send_once(alert).await
            }
        }
    }

    async fn send_once(&self, alert: &AlertRecord) -> Result<(), CoreError> {
        let cfg = self.config();
        match self {
            Notifier::Mock(_) => {
                info!(
                    to = %cfg.to,
                    severity = %alert.severity,
                    metric = %alert.metric,
                    "(mock email) would send alert notification"
                );
                pretty_print(alert);
                Ok(())
            }
            Notifier::Smtp(_, transport) => {
                let message = build_message(cfg, alert)?;
                transport
                    .send(message)
                    .await
                    .map_err(|e| CoreError::TransientIo(format!("sending alert email: {e}")))?;
                info!(to = %cfg.to, "email sent successfully");
                Ok(())
            }
        }
    }
}

fn build_message(cfg: &SmtpConfig, alert: &AlertRecord) -> Result<Message, CoreError> {
    let from: Mailbox = cfg
        .from
        .parse()
        .map_err(|e| CoreError::Input(format!("invalid EMAIL_FROM {:?}: {e}", cfg.from)))?;
    let to: Mailbox = cfg
        .to
        .parse()
        .map_err(|e| CoreError::Input(format!("invalid EMAIL_TO {:?}: {e}", cfg.to)))?;
    Message::builder()
        .from(from)
        .to(to)
        .subject(format!("[NETRA ALERT] {} - {}", alert.severity, alert.metric))
        .body(render_body(alert))
        .map_err(|e| CoreError::Input(format!("building alert email: {e}")))
}

fn render_body(alert: &AlertRecord) -> String {
    format!(
        " NETRA ALERT DETECTED \n\n\
         Details:\n\
         -----------------------------------------\n\
         Severity       : {severity}\n\
         Metric         : {metric}\n\
         Value          : {value}\n\
         Submodule      : {submodule_name} (ID: {submodule_id})\n\
         Min Limit      : {min:?}\n\
         Max Limit      : {max:?}\n\
         Reason         : {reason}\n\
         Timestamp      : {timestamp:?}\n\
         Packet (raw)   : {packet_raw}\n\
         Packet (match) : {packet_matched}\n\
         -----------------------------------------\n\
         Status         : {status}\n",
        severity = alert.severity,
        metric = alert.metric,
        value = alert.value,
        submodule_name = alert.submodule_name,
        submodule_id = alert.submodule_id,
        min = alert.min,
        max = alert.max,
        reason = alert.reason,
        timestamp = alert.timestamp,
        packet_raw = alert.packet_raw,
        packet_matched = alert.packet_matched,
        status = alert.status.as_str(),
    )
}

fn pretty_print(alert: &AlertRecord) {
    info!(
        queue_id = alert.queue_id,
        submodule = %alert.submodule_name,
        metric = %alert.metric,
        value = alert.value,
        min = ?alert.min,
        max = ?alert.max,
        reason = %alert.reason,
        status = alert.status.as_str(),
        "alert detail"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use ground_protocol::model::{AlertStatus, Severity};

    fn sample_record() -> AlertRecord {
        AlertRecord {
            id: Some(1),
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
            status: AlertStatus::AlertIdentified,
            engine_time: chrono::Utc::now(),
        }
    }

    #[test]
    fn mock_config_is_detected() {
        let cfg = SmtpConfig {
            host: "mock".to_string(),
            port: 587,
            user: String::new(),
            password: String::new(),
            from: "alerts@netra.local".to_string(),
            to: "mission_ops@netra.local".to_string(),
        };
        assert!(cfg.is_mock());
    }

    #[test]
    fn render_body_includes_metric_and_severity() {
        let body = render_body(&sample_record());
        assert!(body.contains("Sun_Vector_Z"));
        assert!(body.contains("AMBER"));
    }

    #[test]
    fn build_message_rejects_malformed_addresses() {
        let cfg = SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            user: String::new(),
            password: String::new(),
            from: "not-an-email".to_string(),
            to: "mission_ops@netra.local".to_string(),
        };
        assert!(build_message(&cfg, &sample_record()).is_err());
    }
}
