//! Notifiers: structured log lines and JSON webhooks.

use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::blocking::block_on;
use crate::ports::events::{EventSeverity, Notifier, SyncEvent};
use crate::ports::PortError;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Emits each event as a tracing record at a level matching its severity.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &SyncEvent) -> Result<(), PortError> {
        let event_type = event.event_type.as_str();
        let source = format!("{}:{}", event.source_type, event.source_id);
        match event.severity {
            EventSeverity::Info => {
                info!(event_type, source = %source, message = %event.message, "{}", event.title);
            }
            EventSeverity::Warning => {
                warn!(event_type, source = %source, message = %event.message, "{}", event.title);
            }
            EventSeverity::Error => {
                error!(event_type, source = %source, message = %event.message, "{}", event.title);
            }
        }
        Ok(())
    }
}

/// Posts each event as JSON to a webhook URL.
///
/// The payload carries a chat-friendly `text` line alongside the full event,
/// so Slack-style incoming webhooks and generic receivers both accept it.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    /// Creates a notifier posting to `url`.
    #[must_use]
    pub fn new(url: &str) -> Self {
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            url: url.to_string(),
        }
    }

    async fn post(&self, payload: &Value) -> Result<(), PortError> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| -> PortError {
                format!("Webhook request failed: {e}").into()
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("Webhook returned HTTP {}", status.as_u16()).into());
        }
        Ok(())
    }
}

fn severity_marker(severity: EventSeverity) -> &'static str {
    match severity {
        EventSeverity::Info => "[info]",
        EventSeverity::Warning => "[warning]",
        EventSeverity::Error => "[error]",
    }
}

/// Builds the JSON body posted for `event`.
#[must_use]
pub fn webhook_payload(event: &SyncEvent) -> Value {
    let text = format!(
        "{} {}\n{}:{}\n{}",
        severity_marker(event.severity),
        event.title,
        event.source_type,
        event.source_id,
        event.message
    );
    let mut payload = json!({ "text": text });
    if let (Value::Object(body), Ok(Value::Object(fields))) =
        (&mut payload, serde_json::to_value(event))
    {
        body.extend(fields);
    }
    payload
}

impl Notifier for WebhookNotifier {
    fn notify(&self, event: &SyncEvent) -> Result<(), PortError> {
        let payload = webhook_payload(event);
        block_on(self.post(&payload))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::events::EventType;
    use crate::ports::fetcher::SourceKind;
    use chrono::{TimeZone, Utc};

    fn event() -> SyncEvent {
        let mut metadata = serde_json::Map::new();
        metadata.insert("high_severity".into(), json!(2));
        SyncEvent {
            id: "evt-1".into(),
            event_type: EventType::DriftDetected,
            title: "Schema drift detected".into(),
            message: "2 high severity issues".into(),
            severity: EventSeverity::Warning,
            source_type: SourceKind::Confluence,
            source_id: "123".into(),
            metadata,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn payload_has_text_and_event_fields() {
        let payload = webhook_payload(&event());
        assert_eq!(
            payload["text"],
            "[warning] Schema drift detected\nconfluence:123\n2 high severity issues"
        );
        assert_eq!(payload["event_type"], "drift_detected");
        assert_eq!(payload["severity"], "warning");
        assert_eq!(payload["source_type"], "confluence");
        assert_eq!(payload["metadata"]["high_severity"], 2);
    }

    #[test]
    fn log_notifier_never_fails() {
        assert!(LogNotifier.notify(&event()).is_ok());
    }
}
