//! Alert sinks

use super::AlertSink;
use tracing::{info, warn};

/// Logs alerts and echoes them to the operator's terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn notify(&self, message: &str) {
        warn!("{}", message);
        println!("Security alert: {}. The administrator has been notified.", message);
    }
}

/// Desktop notification through the session notification daemon
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopSink;

impl AlertSink for DesktopSink {
    fn notify(&self, message: &str) {
        if let Err(e) = send_desktop_notification(message) {
            warn!("Failed to send desktop notification: {}", e);
        }
    }
}

fn send_desktop_notification(message: &str) -> anyhow::Result<()> {
    notify_rust::Notification::new()
        .summary("🚨 Possible ransomware activity")
        .body(message)
        .icon("dialog-warning")
        .urgency(notify_rust::Urgency::Critical)
        .timeout(notify_rust::Timeout::Never)
        .show()?;

    Ok(())
}

/// POSTs each alert as JSON to a webhook
///
/// Delivery runs on a spawned task so `notify` never blocks the monitor.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    fn payload(message: &str) -> serde_json::Value {
        serde_json::json!({
            "source": "entropy-guard",
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })
    }
}

impl AlertSink for WebhookSink {
    fn notify(&self, message: &str) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime, dropping webhook alert: {}", message);
            return;
        };

        let client = self.client.clone();
        let url = self.url.clone();
        let payload = Self::payload(message);

        runtime.spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    info!("Sent webhook notification to {}", url);
                }
                Ok(response) => warn!("Webhook {} answered {}", url, response.status()),
                Err(e) => warn!("Failed to send webhook: {}", e),
            }
        });
    }
}
