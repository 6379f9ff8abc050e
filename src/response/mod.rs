//! Alert delivery
//!
//! The detection core only needs a place to put human-readable messages.
//! Where they end up (terminal, desktop, webhook) is configured here.

mod alert;

pub use alert::{DesktopSink, LogSink, WebhookSink};

use crate::config::Config;
use crate::detector::AnomalyReport;
use std::sync::Arc;
use tracing::info;

/// Receives operator-facing notifications. Fire-and-forget.
pub trait AlertSink: Send + Sync {
    fn notify(&self, message: &str);
}

/// Delivers every alert to each inner sink
#[derive(Default, Clone)]
pub struct Fanout {
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl AlertSink for Fanout {
    fn notify(&self, message: &str) {
        for sink in &self.sinks {
            sink.notify(message);
        }
    }
}

/// Build the sink set from configuration. The log sink is always present.
pub fn from_config(config: &Config) -> Fanout {
    let mut fanout = Fanout::new().with(Arc::new(LogSink));

    if config.alerts.desktop {
        fanout = fanout.with(Arc::new(DesktopSink));
    }

    if let Some(ref url) = config.alerts.webhook {
        fanout = fanout.with(Arc::new(WebhookSink::new(url.clone())));
    }

    fanout
}

/// Send one alert per anomaly; log files that came back clean
pub fn dispatch(report: &AnomalyReport, sink: &dyn AlertSink) {
    if report.has_anomaly() {
        for anomaly in &report.anomalies {
            sink.notify(&format!("Anomaly detected: {}", anomaly));
        }
    } else {
        info!("{} is probably safe", report.file_name());
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::AlertSink;
    use std::sync::Mutex;

    /// Keeps every message for assertions
    #[derive(Default)]
    pub struct RecordingSink {
        messages: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        pub fn messages(&self) -> Vec<String> {
            self.messages.lock().unwrap().clone()
        }
    }

    impl AlertSink for RecordingSink {
        fn notify(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;
    use crate::detector::Anomaly;
    use std::path::PathBuf;

    #[test]
    fn test_dispatch_one_alert_per_anomaly() {
        let sink = RecordingSink::default();
        let report = AnomalyReport {
            path: PathBuf::from("/srv/share/secret.lock"),
            anomalies: vec![
                Anomaly::UnknownExtension {
                    file: "secret.lock".into(),
                },
                Anomaly::Unopenable {
                    file: "secret.lock".into(),
                },
            ],
            diagnostics: Vec::new(),
        };

        dispatch(&report, &sink);

        let messages = sink.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.starts_with("Anomaly detected: ")));
    }

    #[test]
    fn test_dispatch_clean_report_is_silent() {
        let sink = RecordingSink::default();
        let report = AnomalyReport::new(PathBuf::from("/srv/share/notes.txt"));

        dispatch(&report, &sink);
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let a = Arc::new(RecordingSink::default());
        let b = Arc::new(RecordingSink::default());
        let fanout = Fanout::new().with(a.clone()).with(b.clone());

        fanout.notify("hello");
        assert_eq!(a.messages(), vec!["hello"]);
        assert_eq!(b.messages(), vec!["hello"]);
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        assert_eq!(from_config(&config).len(), 1);

        config.alerts.webhook = Some("http://localhost/hook".into());
        config.alerts.desktop = true;
        assert_eq!(from_config(&config).len(), 3);
    }
}
