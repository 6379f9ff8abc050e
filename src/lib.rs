//! entropy-guard - heuristic ransomware detection for a monitored directory
//!
//! Files are judged on static signals (extension, openability, entropy,
//! hash reputation) and on size drift over time. A timed confirmation
//! protocol correlates size change with rising entropy to tell active
//! encryption apart from files that were simply dense to begin with.
//!
//! # Example
//!
//! ```rust,no_run
//! use entropy_guard::{stop, Config, Guard};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let guard = Guard::new(Config::default())?;
//!     let (_handle, signal) = stop::stop_pair();
//!
//!     let summary = guard.run(&signal).await?;
//!     println!("{} files flagged", summary.flagged.len());
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod detector;
pub mod error;
pub mod monitor;
pub mod reputation;
pub mod response;
pub mod stop;
pub mod watcher;

pub use config::{Config, MonitorMode};
pub use detector::{Anomaly, AnomalyReport, EncryptionConfirmer, Evaluator, SizeDriftTracker, Verdict};
pub use error::GuardError;
pub use monitor::{DirectoryMonitor, SessionSummary};
pub use response::AlertSink;

use detector::KnownExtensions;
use reputation::{Disabled, HashLookupClient, ReputationClient};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use stop::StopSignal;

/// Main detection engine
pub struct Guard {
    config: Config,
    evaluator: Evaluator,
    confirmer: EncryptionConfirmer,
    sink: Arc<dyn AlertSink>,
}

impl Guard {
    /// Create an engine from configuration
    ///
    /// Fails if the reference extension list cannot be read.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let sink = Arc::new(response::from_config(&config));
        Self::with_sink(config, sink)
    }

    /// Create an engine delivering alerts to a custom sink
    pub fn with_sink(config: Config, sink: Arc<dyn AlertSink>) -> anyhow::Result<Self> {
        let extensions = Arc::new(KnownExtensions::load(&config.extensions)?);

        let reputation: Arc<dyn ReputationClient> = match config.resolved_api_key() {
            Some(key) => Arc::new(HashLookupClient::new(
                config.reputation.endpoint.clone(),
                key,
                Duration::from_secs(config.reputation.timeout_secs),
            )?),
            None => {
                tracing::info!("No reputation API key configured, hash lookups disabled");
                Arc::new(Disabled)
            }
        };

        let evaluator = Evaluator::from_config(&config, extensions, reputation);
        let confirmer = EncryptionConfirmer::from_config(&config);

        Ok(Self {
            config,
            evaluator,
            confirmer,
            sink,
        })
    }

    /// Start a monitoring session with fresh size history
    pub fn session(&self) -> DirectoryMonitor {
        DirectoryMonitor::new(
            self.config.directory.clone(),
            self.evaluator.clone(),
            self.confirmer.clone(),
            self.sink.clone(),
        )
        .with_exclusions(self.config.exclusions())
        .ignoring(self.config.extensions.clone())
    }

    /// Monitor the configured directory in the configured mode
    pub async fn run(&self, stop: &StopSignal) -> anyhow::Result<SessionSummary> {
        let monitor = &self.config.monitor;
        let mut session = self.session();

        let summary = match monitor.mode {
            MonitorMode::Polling => {
                session
                    .poll(
                        monitor.poll_iterations,
                        Duration::from_secs(monitor.poll_interval_secs),
                        stop,
                    )
                    .await
            }
            MonitorMode::Event => {
                session
                    .watch(Duration::from_secs(monitor.window_secs), stop)
                    .await?
            }
        };

        Ok(summary)
    }

    /// Evaluate a single file and deliver its alerts
    pub async fn scan(&self, path: &Path) -> anyhow::Result<AnomalyReport> {
        Ok(self.session().scan_file(path).await?)
    }

    /// Run the confirmation protocol on a single file
    pub async fn confirm(&self, path: &Path, stop: &StopSignal) -> Verdict {
        self.session().confirm(path, stop).await
    }

    /// Get current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::testing::RecordingSink;

    fn config_in(dir: &Path) -> Config {
        let list = dir.join("extensions.txt");
        std::fs::write(&list, ".txt\n.pdf\n.docx\n").unwrap();

        let mut config = Config::default();
        config.directory = dir.to_path_buf();
        config.extensions = list;
        config.reputation.api_key = None;
        config
    }

    #[test]
    fn test_missing_reference_list_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.extensions = dir.path().join("missing.txt");

        let err = Guard::new(config).err().expect("startup must fail");
        assert!(matches!(
            err.downcast_ref::<GuardError>(),
            Some(GuardError::ReferenceList { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_polling_ignores_reference_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.monitor.poll_iterations = 1;
        std::fs::write(dir.path().join("memo.txt"), b"remember the milk").unwrap();

        let sink = Arc::new(RecordingSink::default());
        let guard = Guard::with_sink(config, sink.clone()).unwrap();

        let summary = guard.run(&StopSignal::never()).await.unwrap();
        assert_eq!(summary.iterations, 1);
        assert_eq!(summary.evaluated, 1);
        assert!(summary.flagged.is_empty());
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn test_scan_unknown_binary() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.detection.unknown_is_openable = false;
        let path = dir.path().join("photo.jpg.locked");
        std::fs::write(&path, detector::testing::noise(4096)).unwrap();

        let sink = Arc::new(RecordingSink::default());
        let guard = Guard::with_sink(config, sink.clone()).unwrap();

        let report = guard.scan(&path).await.unwrap();
        assert_eq!(report.anomalies.len(), 3);
        assert_eq!(sink.messages().len(), 3);
    }
}
