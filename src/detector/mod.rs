//! Heuristic detection
//!
//! One evaluation runs five independent checks against a file and collects
//! every failure. Checks never short-circuit each other: the number of
//! anomalies on a single file is itself part of the evidence.

pub mod confirm;
pub mod drift;
pub mod entropy;
pub mod extensions;
pub mod openability;

pub use confirm::{EncryptionConfirmer, Verdict};
pub use drift::SizeDriftTracker;
pub use extensions::KnownExtensions;
pub use openability::{FormatProbe, OpenabilityProbe};

use crate::config::Config;
use crate::error::{GuardError, Result};
use crate::reputation::{self, ReputationClient};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// A single failed check
#[derive(Debug, Clone, PartialEq)]
pub enum Anomaly {
    /// Extension missing from the reference list
    UnknownExtension { file: String },
    /// No reader for the type could open the file
    Unopenable { file: String },
    /// Content entropy above the threshold
    HighEntropy { file: String, entropy: f64 },
    /// Size moved by more than the threshold since the last observation
    SizeDrift { file: String, threshold: u64 },
    /// Content hash flagged by the reputation service
    KnownMalicious { file: String, sha256: String },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownExtension { file } => {
                write!(f, "the extension of {} is not in the reference list", file)
            }
            Self::Unopenable { file } => {
                write!(f, "{} cannot be opened, it may be encrypted", file)
            }
            Self::HighEntropy { file, entropy } => {
                write!(f, "{} has high entropy ({:.2}), it may be encrypted", file, entropy)
            }
            Self::SizeDrift { file, threshold } => {
                write!(f, "the size of {} changed by more than {} bytes", file, threshold)
            }
            Self::KnownMalicious { file, sha256 } => {
                write!(f, "{} is flagged as malicious (sha256 {})", file, sha256)
            }
        }
    }
}

/// Result of evaluating one file
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyReport {
    /// File that was evaluated
    pub path: PathBuf,
    /// Failed checks, in check order
    pub anomalies: Vec<Anomaly>,
    /// Checks that could not run (I/O trouble). Not anomalies.
    pub diagnostics: Vec<String>,
}

impl AnomalyReport {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            anomalies: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn has_anomaly(&self) -> bool {
        !self.anomalies.is_empty()
    }

    /// Bare file name for messages
    pub fn file_name(&self) -> String {
        display_name(&self.path)
    }

    fn diagnostic(&mut self, check: &str, err: &std::io::Error) {
        warn!("{} check skipped for {:?}: {}", check, self.path, err);
        self.diagnostics.push(format!("{} check skipped: {}", check, err));
    }
}

/// Runs the per-file checks
#[derive(Clone)]
pub struct Evaluator {
    extensions: Arc<KnownExtensions>,
    probe: Arc<dyn OpenabilityProbe>,
    reputation: Arc<dyn ReputationClient>,
    entropy_threshold: f64,
    size_threshold: u64,
}

impl Evaluator {
    /// Create an evaluator with default thresholds (entropy 7.0, size 1000 bytes)
    pub fn new(
        extensions: Arc<KnownExtensions>,
        probe: Arc<dyn OpenabilityProbe>,
        reputation: Arc<dyn ReputationClient>,
    ) -> Self {
        Self {
            extensions,
            probe,
            reputation,
            entropy_threshold: 7.0,
            size_threshold: 1000,
        }
    }

    /// Create an evaluator using the configured thresholds
    pub fn from_config(
        config: &Config,
        extensions: Arc<KnownExtensions>,
        reputation: Arc<dyn ReputationClient>,
    ) -> Self {
        let probe = Arc::new(FormatProbe::new(config.detection.unknown_is_openable));
        Self::new(extensions, probe, reputation)
            .with_entropy_threshold(config.detection.entropy_threshold)
            .with_size_threshold(config.detection.size_threshold_bytes)
    }

    pub fn with_entropy_threshold(mut self, threshold: f64) -> Self {
        self.entropy_threshold = threshold;
        self
    }

    pub fn with_size_threshold(mut self, threshold: u64) -> Self {
        self.size_threshold = threshold;
        self
    }

    pub fn entropy_threshold(&self) -> f64 {
        self.entropy_threshold
    }

    pub fn size_threshold(&self) -> u64 {
        self.size_threshold
    }

    /// Evaluate one file
    ///
    /// I/O trouble inside a check is recorded as a diagnostic and the check
    /// counts as passed. A file that disappears aborts the evaluation with
    /// [`GuardError::Vanished`].
    pub async fn evaluate(
        &self,
        path: &Path,
        tracker: &mut SizeDriftTracker,
    ) -> Result<AnomalyReport> {
        let mut report = AnomalyReport::new(path.to_path_buf());
        let file = report.file_name();
        let extension = extensions::extension_of(path);

        // Check 1: extension in the reference list
        if !self.extensions.recognizes(path) {
            report.anomalies.push(Anomaly::UnknownExtension { file: file.clone() });
        }

        // Check 2: openable by a reader for its type
        match self.probe.can_open(path, &extension) {
            Ok(true) => {}
            Ok(false) => report.anomalies.push(Anomaly::Unopenable { file: file.clone() }),
            Err(e) => self.check_io(&mut report, "openability", path, e)?,
        }

        // Check 3: entropy. An unreadable file has no score, which is not an anomaly.
        match entropy::calculate_file(path) {
            Ok(score) => {
                debug!(
                    "Entropy of {:?}: {:.3} ({:?})",
                    path,
                    score,
                    entropy::classify(score)
                );
                if entropy::is_high_entropy(score, self.entropy_threshold) {
                    report.anomalies.push(Anomaly::HighEntropy {
                        file: file.clone(),
                        entropy: score,
                    });
                }
            }
            Err(e) => self.check_io(&mut report, "entropy", path, e)?,
        }

        // Check 4: size drift. The tracker is only touched once the size is known.
        match std::fs::metadata(path) {
            Ok(metadata) => {
                if tracker.observe(path, metadata.len(), self.size_threshold) {
                    report.anomalies.push(Anomaly::SizeDrift {
                        file: file.clone(),
                        threshold: self.size_threshold,
                    });
                }
            }
            Err(e) => self.check_io(&mut report, "size", path, e)?,
        }

        // Check 5: reputation of the content hash
        if self.reputation.enabled() {
            match reputation::sha256_file(path) {
                Ok(sha256) => {
                    if self.reputation.is_malicious(&sha256).await {
                        report.anomalies.push(Anomaly::KnownMalicious { file, sha256 });
                    }
                }
                Err(e) => self.check_io(&mut report, "reputation", path, e)?,
            }
        }

        Ok(report)
    }

    /// Record a failed check, or abort if the file is gone
    fn check_io(
        &self,
        report: &mut AnomalyReport,
        check: &str,
        path: &Path,
        err: std::io::Error,
    ) -> Result<()> {
        if err.kind() == std::io::ErrorKind::NotFound {
            return Err(GuardError::Vanished(path.to_path_buf()));
        }
        report.diagnostic(check, &err);
        Ok(())
    }
}

/// File name of a path, falling back to the full path
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
