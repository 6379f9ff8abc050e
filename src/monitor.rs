//! Directory monitoring sessions
//!
//! A session owns its [`SizeDriftTracker`] and runs on a single task, so
//! every size observation is serialized without a lock. Evaluation and
//! confirmation borrow the tracker in turn, keeping one continuous history.

use crate::detector::{self, AnomalyReport, EncryptionConfirmer, Evaluator, SizeDriftTracker, Verdict};
use crate::error::{GuardError, Result};
use crate::response::{self, AlertSink};
use crate::stop::StopSignal;
use crate::watcher::{self, EventType, FileEvent, InotifyWatcher};
use globset::GlobSet;
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// What a session did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Polling iterations completed
    pub iterations: u32,
    /// Files evaluated
    pub evaluated: usize,
    /// Files with at least one anomaly, each listed once
    pub flagged: Vec<PathBuf>,
    /// Files the confirmation sweep found being encrypted
    pub confirmed: Vec<PathBuf>,
    /// The session ended on a stop request
    pub cancelled: bool,
}

/// Watches one directory and feeds files to the evaluator
pub struct DirectoryMonitor {
    directory: PathBuf,
    evaluator: Evaluator,
    confirmer: EncryptionConfirmer,
    sink: Arc<dyn AlertSink>,
    tracker: SizeDriftTracker,
    exclude: GlobSet,
    ignore: Vec<PathBuf>,
}

impl DirectoryMonitor {
    /// Start a session with fresh size history
    pub fn new(
        directory: impl Into<PathBuf>,
        evaluator: Evaluator,
        confirmer: EncryptionConfirmer,
        sink: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            directory: directory.into(),
            evaluator,
            confirmer,
            sink,
            tracker: SizeDriftTracker::new(),
            exclude: GlobSet::empty(),
            ignore: Vec::new(),
        }
    }

    /// Continue from an earlier session's size history
    pub fn with_tracker(mut self, tracker: SizeDriftTracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// Skip paths matching these globs
    pub fn with_exclusions(mut self, exclude: GlobSet) -> Self {
        self.exclude = exclude;
        self
    }

    /// Never evaluate this path (the reference list, for one)
    pub fn ignoring(mut self, path: impl Into<PathBuf>) -> Self {
        self.ignore.push(path.into());
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn tracker(&self) -> &SizeDriftTracker {
        &self.tracker
    }

    /// End the session, keeping its size history
    pub fn into_tracker(self) -> SizeDriftTracker {
        self.tracker
    }

    /// Evaluate one file and deliver its alerts
    pub async fn scan_file(&mut self, path: &Path) -> Result<AnomalyReport> {
        let report = self.evaluator.evaluate(path, &mut self.tracker).await?;
        response::dispatch(&report, self.sink.as_ref());
        Ok(report)
    }

    /// Run the confirmation protocol on one file, alerting when confirmed
    pub async fn confirm(&mut self, path: &Path, stop: &StopSignal) -> Verdict {
        let verdict = self.confirmer.confirm(path, &mut self.tracker, stop).await;
        if verdict.is_confirmed() {
            self.sink.notify(&format!(
                "Encryption in progress: {} changed size while turning high-entropy",
                detector::display_name(path)
            ));
        }
        verdict
    }

    /// Polling mode: list the directory `iterations` times, `interval` apart,
    /// and evaluate files that were not present in the previous listing
    pub async fn poll(
        &mut self,
        iterations: u32,
        interval: Duration,
        stop: &StopSignal,
    ) -> SessionSummary {
        let mut summary = SessionSummary::default();
        let mut previous: BTreeSet<OsString> = BTreeSet::new();

        info!(
            "Polling {:?}: {} iterations every {:?}",
            self.directory, iterations, interval
        );

        for iteration in 1..=iterations {
            if stop.is_stopped() {
                summary.cancelled = true;
                break;
            }
            debug!("Detection pass {}/{}", iteration, iterations);

            match watcher::list_files(&self.directory, &self.exclude, &self.ignore) {
                Ok(files) => {
                    let mut current = BTreeSet::new();
                    for path in files {
                        let Some(name) = path.file_name().map(|n| n.to_os_string()) else {
                            continue;
                        };
                        if !previous.contains(&name) {
                            self.evaluate_into(&path, &mut summary).await;
                        }
                        current.insert(name);
                    }
                    previous = current;
                }
                Err(e) => {
                    error!("Failed to list {:?}: {}", self.directory, e);
                    self.sink.notify(&format!(
                        "System error: could not list {}: {}",
                        self.directory.display(),
                        e
                    ));
                }
            }
            summary.iterations = iteration;

            if iteration < iterations {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = stop.stopped() => {
                        summary.cancelled = true;
                        break;
                    }
                }
            }
        }

        info!(
            "Polling finished: {} files evaluated, {} flagged",
            summary.evaluated,
            summary.flagged.len()
        );
        summary
    }

    /// Event mode: evaluate files as they are created, modified or moved in
    /// for `window`, then sweep every present file through the confirmer
    pub async fn watch(&mut self, window: Duration, stop: &StopSignal) -> Result<SessionSummary> {
        let mut summary = SessionSummary::default();
        let mut inotify = InotifyWatcher::new()?;
        inotify.add(&self.directory)?;

        info!("Watching {:?} for {:?}", self.directory, window);
        let deadline = Instant::now() + window;

        loop {
            tokio::select! {
                event = inotify.next_event() => {
                    match event {
                        Ok(event) => self.handle_event(event, &mut summary).await,
                        Err(e) => {
                            error!("Event stream failed: {}", e);
                            return Err(e);
                        }
                    }
                }
                _ = tokio::time::sleep_until(deadline) => break,
                _ = stop.stopped() => {
                    summary.cancelled = true;
                    break;
                }
            }
        }
        drop(inotify);

        if !summary.cancelled {
            self.sweep(&mut summary, stop).await;
        }

        info!(
            "Watch finished: {} files evaluated, {} flagged, {} confirmed",
            summary.evaluated,
            summary.flagged.len(),
            summary.confirmed.len()
        );
        Ok(summary)
    }

    async fn handle_event(&mut self, event: FileEvent, summary: &mut SessionSummary) {
        if event.is_dir || watcher::is_ignored(&event.path, &self.exclude, &self.ignore) {
            return;
        }

        let name = detector::display_name(&event.path);
        match event.event_type {
            EventType::Create => info!("New file created: {}", name),
            EventType::Modify | EventType::CloseWrite => debug!("File modified: {}", name),
            EventType::MovedIn => info!("File moved into the watched tree: {}", name),
            EventType::MovedOut => info!("File moved out of the watched tree: {}", name),
            EventType::Delete => info!("File deleted: {}", name),
        }

        if event.event_type.warrants_evaluation() {
            self.evaluate_into(&event.path, summary).await;
        }
    }

    /// Confirmation sweep over the files present after the window
    async fn sweep(&mut self, summary: &mut SessionSummary, stop: &StopSignal) {
        let files = match watcher::list_files(&self.directory, &self.exclude, &self.ignore) {
            Ok(files) => files,
            Err(e) => {
                error!("Failed to list {:?} for confirmation: {}", self.directory, e);
                return;
            }
        };

        info!("Confirmation sweep over {} files", files.len());
        for path in files {
            match self.confirm(&path, stop).await {
                Verdict::Confirmed => summary.confirmed.push(path),
                Verdict::TimedOut => {}
                Verdict::Cancelled => {
                    summary.cancelled = true;
                    return;
                }
            }
        }
    }

    async fn evaluate_into(&mut self, path: &Path, summary: &mut SessionSummary) {
        match self.scan_file(path).await {
            Ok(report) => {
                summary.evaluated += 1;
                if report.has_anomaly() && !summary.flagged.contains(&report.path) {
                    summary.flagged.push(report.path);
                }
            }
            Err(GuardError::Vanished(path)) => {
                warn!("{:?} disappeared before it could be evaluated", path);
            }
            Err(e) => warn!("Evaluation of {:?} failed: {}", path, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::testing::{evaluator, noise};
    use crate::response::testing::RecordingSink;
    use crate::stop::stop_pair;

    fn monitor(dir: &Path, sink: Arc<RecordingSink>) -> DirectoryMonitor {
        let confirmer = EncryptionConfirmer::new(
            1000,
            Duration::from_millis(200),
            Duration::from_millis(50),
        );
        DirectoryMonitor::new(dir, evaluator(true, false), confirmer, sink)
    }

    #[tokio::test]
    async fn test_poll_evaluates_only_new_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"shopping list").unwrap();

        let sink = Arc::new(RecordingSink::default());
        let mut monitor = monitor(dir.path(), sink.clone());

        let writer = tokio::spawn({
            let path = dir.path().join("secret.lock");
            async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                std::fs::write(path, noise(4096)).unwrap();
            }
        });

        let summary = monitor
            .poll(3, Duration::from_millis(80), &StopSignal::never())
            .await;
        writer.await.unwrap();

        assert_eq!(summary.iterations, 3);
        assert!(!summary.cancelled);
        assert_eq!(summary.evaluated, 2);
        assert_eq!(summary.flagged, vec![dir.path().join("secret.lock")]);

        let messages = sink.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().any(|m| m.contains("not in the reference list")));
        assert!(messages.iter().any(|m| m.contains("high entropy")));
    }

    #[tokio::test]
    async fn test_poll_skips_reference_list() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("extensions.cfg");
        std::fs::write(&list, ".txt\n.pdf\n").unwrap();

        let sink = Arc::new(RecordingSink::default());
        let mut monitor = monitor(dir.path(), sink.clone()).ignoring(&list);

        let summary = monitor.poll(1, Duration::ZERO, &StopSignal::never()).await;
        assert_eq!(summary.evaluated, 0);
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn test_poll_reports_listing_failure() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(RecordingSink::default());
        let mut monitor = monitor(&dir.path().join("missing"), sink.clone());

        let summary = monitor.poll(2, Duration::ZERO, &StopSignal::never()).await;
        assert_eq!(summary.iterations, 2);
        assert_eq!(sink.messages().len(), 2);
        assert!(sink.messages()[0].starts_with("System error"));
    }

    #[tokio::test]
    async fn test_poll_stops_on_signal() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(RecordingSink::default());
        let mut monitor = monitor(dir.path(), sink);

        let (handle, signal) = stop_pair();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.stop();
        });

        let summary = monitor.poll(1000, Duration::from_secs(1), &signal).await;
        assert!(summary.cancelled);
        assert_eq!(summary.iterations, 1);
    }

    #[tokio::test]
    async fn test_tracker_continuity_across_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        std::fs::write(&path, vec![b'a'; 100]).unwrap();

        let sink = Arc::new(RecordingSink::default());
        let mut first = monitor(dir.path(), sink.clone());
        first.scan_file(&path).await.unwrap();
        let tracker = first.into_tracker();

        std::fs::write(&path, vec![b'a'; 5000]).unwrap();
        let mut second = monitor(dir.path(), sink.clone()).with_tracker(tracker);
        let report = second.scan_file(&path).await.unwrap();
        assert_eq!(report.anomalies.len(), 1);

        let mut fresh = monitor(dir.path(), sink);
        assert!(!fresh.scan_file(&path).await.unwrap().has_anomaly());
    }

    #[tokio::test]
    async fn test_watch_evaluates_events_then_sweeps() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(RecordingSink::default());
        let mut monitor = monitor(dir.path(), sink.clone());

        let target = dir.path().join("contract.docx");
        let writer = tokio::spawn({
            let target = target.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                std::fs::write(&target, b"PK\x03\x04 small document").unwrap();
            }
        });

        let summary = monitor
            .watch(Duration::from_millis(400), &StopSignal::never())
            .await
            .unwrap();
        writer.await.unwrap();

        assert!(!summary.cancelled);
        assert!(summary.evaluated >= 1);
        assert!(summary.flagged.is_empty());
        assert!(summary.confirmed.is_empty());
        assert_eq!(monitor.tracker().previous(&target), Some(19));
    }

    #[tokio::test]
    async fn test_watch_covers_every_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("target")).unwrap();
        std::fs::create_dir(dir.path().join("projects")).unwrap();
        let sink = Arc::new(RecordingSink::default());
        let mut monitor = monitor(dir.path(), sink);

        let payroll = dir.path().join("target/payroll.lock");
        let plan = dir.path().join("projects/plan.lock");
        let writer = tokio::spawn({
            let (payroll, plan) = (payroll.clone(), plan.clone());
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                std::fs::write(plan, noise(4096)).unwrap();
                std::fs::write(payroll, noise(4096)).unwrap();
            }
        });

        let summary = monitor
            .watch(Duration::from_millis(500), &StopSignal::never())
            .await
            .unwrap();
        writer.await.unwrap();

        // Several events per file, one entry per file
        let mut flagged = summary.flagged.clone();
        flagged.sort();
        assert_eq!(flagged, vec![plan.clone(), payroll.clone()]);
        assert!(summary.evaluated >= 2);
        assert_eq!(monitor.tracker().previous(&payroll), Some(4096));
    }

    #[tokio::test]
    async fn test_watch_cancelled_skips_sweep() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"text").unwrap();
        let sink = Arc::new(RecordingSink::default());
        let mut monitor = monitor(dir.path(), sink);

        let (handle, signal) = stop_pair();
        handle.stop();

        let summary = monitor.watch(Duration::from_secs(30), &signal).await.unwrap();
        assert!(summary.cancelled);
        assert!(monitor.tracker().is_empty());
    }
}
