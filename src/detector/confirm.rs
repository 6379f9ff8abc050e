//! Encryption confirmation
//!
//! High entropy alone is weak evidence. This protocol samples one file
//! repeatedly over a short window and confirms active encryption only when
//! a size change has been seen and the content is high-entropy at the same
//! time, the read-encrypt-overwrite pattern of ransomware.
//!
//! `Idle -> Sampling -> Confirmed | TimedOut`, with `Cancelled` when the
//! stop signal fires between samples.

use super::drift::SizeDriftTracker;
use super::entropy;
use crate::config::Config;
use crate::stop::StopSignal;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Outcome of one confirmation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Size drift and high entropy were observed together
    Confirmed,
    /// The window elapsed without both signals
    TimedOut,
    /// Stopped before the window elapsed
    Cancelled,
}

impl Verdict {
    pub fn is_confirmed(self) -> bool {
        self == Self::Confirmed
    }
}

/// Runs the sampling protocol
#[derive(Debug, Clone)]
pub struct EncryptionConfirmer {
    size_threshold: u64,
    entropy_threshold: f64,
    duration: Duration,
    interval: Duration,
}

impl EncryptionConfirmer {
    pub fn new(size_threshold: u64, duration: Duration, interval: Duration) -> Self {
        Self {
            size_threshold,
            entropy_threshold: 7.0,
            duration,
            interval,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.detection.size_threshold_bytes,
            config.confirmation.duration(),
            config.confirmation.interval(),
        )
        .with_entropy_threshold(config.detection.entropy_threshold)
    }

    pub fn with_entropy_threshold(mut self, threshold: f64) -> Self {
        self.entropy_threshold = threshold;
        self
    }

    /// Sample `path` until both signals co-occur, the window closes, or `stop` fires
    ///
    /// The window is a wall-clock deadline; a slow sample shortens the
    /// remaining wait rather than extending the window.
    pub async fn confirm(
        &self,
        path: &Path,
        tracker: &mut SizeDriftTracker,
        stop: &StopSignal,
    ) -> Verdict {
        let deadline = Instant::now() + self.duration;
        let mut size_changed = false;
        let mut samples = 0u32;

        while Instant::now() < deadline {
            if stop.is_stopped() {
                return Verdict::Cancelled;
            }
            samples += 1;

            match std::fs::metadata(path) {
                Ok(metadata) => {
                    if tracker.observe(path, metadata.len(), self.size_threshold) {
                        debug!("Sample {}: size drift on {:?}", samples, path);
                        size_changed = true;
                    }
                }
                Err(e) => debug!("Sample {}: size unavailable for {:?}: {}", samples, path, e),
            }

            if size_changed {
                if let Some(score) = entropy::score_file(path) {
                    if entropy::is_high_entropy(score, self.entropy_threshold) {
                        info!(
                            "Encryption confirmed on {:?} after {} samples (entropy {:.2})",
                            path, samples, score
                        );
                        return Verdict::Confirmed;
                    }
                }
            }

            let wake = (Instant::now() + self.interval).min(deadline);
            tokio::select! {
                _ = tokio::time::sleep_until(wake) => {}
                _ = stop.stopped() => return Verdict::Cancelled,
            }
        }

        debug!("No encryption confirmed on {:?} after {} samples", path, samples);
        Verdict::TimedOut
    }
}
