//! File system observation
//!
//! Two sources feed the monitor: a plain directory listing for polling, and
//! inotify for event-driven sessions.

mod inotify_watcher;

pub use inotify_watcher::InotifyWatcher;

use globset::GlobSet;
use std::path::{Path, PathBuf};

/// File system event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    /// Path of the affected file
    pub path: PathBuf,
    /// Type of event
    pub event_type: EventType,
    /// The subject is a directory
    pub is_dir: bool,
}

/// Type of file system event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// File was created
    Create,
    /// File was modified
    Modify,
    /// File was closed after writing
    CloseWrite,
    /// File was moved into a watched directory
    MovedIn,
    /// File was moved out of a watched directory
    MovedOut,
    /// File was deleted
    Delete,
}

impl EventType {
    /// Events whose subject still exists and should be evaluated
    pub fn warrants_evaluation(self) -> bool {
        matches!(
            self,
            Self::Create | Self::Modify | Self::CloseWrite | Self::MovedIn
        )
    }
}

/// Regular files directly inside `dir`, sorted, minus ignored paths
pub fn list_files(dir: &Path, exclude: &GlobSet, ignore: &[PathBuf]) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        if is_ignored(&path, exclude, ignore) {
            continue;
        }
        files.push(path);
    }

    files.sort();
    Ok(files)
}

/// Whether the monitor should skip a path
pub fn is_ignored(path: &Path, exclude: &GlobSet, ignore: &[PathBuf]) -> bool {
    if ignore.iter().any(|p| same_file(p, path)) {
        return true;
    }
    crate::config::is_excluded(exclude, path)
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
