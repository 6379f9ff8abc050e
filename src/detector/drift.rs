//! File size drift tracking
//!
//! Ransomware rewrites files in place: read, encrypt, overwrite. The rewritten
//! file rarely keeps its exact size (padding, appended key blobs, ransom
//! markers). This tracker remembers the last size seen per path and reports
//! when the next observation moves by more than a threshold.
//!
//! The tracker is the only holder of size history. It is owned by a
//! monitoring session and lent to the evaluator and the confirmer so both
//! see one continuous history.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Last observed size per path
#[derive(Debug, Default)]
pub struct SizeDriftTracker {
    sizes: HashMap<PathBuf, u64>,
}

impl SizeDriftTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `current_size` for `path` and report whether it drifted
    ///
    /// The first observation of a path never drifts. Every call overwrites
    /// the stored size, whether or not drift is reported.
    pub fn observe(&mut self, path: &Path, current_size: u64, threshold_bytes: u64) -> bool {
        let previous = self
            .sizes
            .insert(path.to_path_buf(), current_size)
            .unwrap_or(current_size);

        previous.abs_diff(current_size) > threshold_bytes
    }

    /// Last size recorded for a path
    pub fn previous(&self, path: &Path) -> Option<u64> {
        self.sizes.get(path).copied()
    }

    /// Number of paths with a recorded size
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Forget all history
    pub fn reset(&mut self) {
        self.sizes.clear();
    }
}
