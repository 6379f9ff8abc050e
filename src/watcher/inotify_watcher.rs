//! inotify-based file system watcher

use super::{EventType, FileEvent};
use crate::error::{GuardError, Result};
use inotify::{EventMask, Inotify, WatchDescriptor, WatchMask};
use std::collections::{HashMap, VecDeque};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use tokio::io::unix::AsyncFd;

fn watch_mask() -> WatchMask {
    WatchMask::MODIFY
        | WatchMask::CREATE
        | WatchMask::DELETE
        | WatchMask::CLOSE_WRITE
        | WatchMask::MOVED_FROM
        | WatchMask::MOVED_TO
}

/// inotify-based file system watcher
pub struct InotifyWatcher {
    /// Readiness registration, dropped before the inotify fd is closed
    async_fd: AsyncFd<RawFd>,
    /// inotify instance (opened non-blocking)
    inotify: Inotify,
    /// Map of watch descriptors to paths
    watches: HashMap<WatchDescriptor, PathBuf>,
    /// Events read but not yet handed out
    pending: VecDeque<FileEvent>,
    /// Event buffer
    buffer: [u8; 4096],
}

impl InotifyWatcher {
    /// Create a new inotify watcher. Must be called inside a Tokio runtime.
    pub fn new() -> Result<Self> {
        let inotify = Inotify::init()?;
        let async_fd = AsyncFd::new(inotify.as_raw_fd())?;

        Ok(Self {
            async_fd,
            inotify,
            watches: HashMap::new(),
            pending: VecDeque::new(),
            buffer: [0u8; 4096],
        })
    }

    /// Watch a directory and every subdirectory below it
    pub fn add(&mut self, path: &Path) -> Result<()> {
        let wd = self
            .inotify
            .watches()
            .add(path, watch_mask())
            .map_err(|source| GuardError::Watch {
                path: path.to_path_buf(),
                source,
            })?;

        self.watches.insert(wd, path.to_path_buf());

        if path.is_dir() {
            self.add_recursive(path)?;
        }

        Ok(())
    }

    fn add_recursive(&mut self, dir: &Path) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }

            match self.inotify.watches().add(&path, watch_mask()) {
                Ok(wd) => {
                    self.watches.insert(wd, path.clone());
                }
                Err(e) => tracing::warn!("Failed to watch {:?}: {}", path, e),
            }

            if let Err(e) = self.add_recursive(&path) {
                tracing::debug!("Skipping subtree {:?}: {}", path, e);
            }
        }

        Ok(())
    }

    /// Number of directories currently watched
    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }

    /// Wait for the next event
    ///
    /// Cancel-safe: events already read from the kernel stay queued if the
    /// returned future is dropped.
    pub async fn next_event(&mut self) -> Result<FileEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(event);
            }

            let mut guard = self.async_fd.readable().await?;

            let mut created_dirs = Vec::new();
            match self.inotify.read_events(&mut self.buffer) {
                Ok(events) => {
                    for event in events {
                        let Some(dir_path) = self.watches.get(&event.wd) else {
                            continue;
                        };

                        let file_path = match event.name {
                            Some(name) => dir_path.join(name),
                            None => dir_path.clone(),
                        };

                        let Some(event_type) = classify_mask(event.mask) else {
                            continue;
                        };

                        let is_dir = event.mask.contains(EventMask::ISDIR);
                        if is_dir && event_type == EventType::Create {
                            created_dirs.push(file_path.clone());
                        }

                        self.pending.push_back(FileEvent {
                            path: file_path,
                            event_type,
                            is_dir,
                        });
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    guard.clear_ready();
                }
                Err(e) => return Err(e.into()),
            }
            drop(guard);

            // New directories get watched too
            for dir in created_dirs {
                if let Err(e) = self.add(&dir) {
                    tracing::warn!("Failed to watch new directory {:?}: {}", dir, e);
                }
            }
        }
    }
}

fn classify_mask(mask: EventMask) -> Option<EventType> {
    if mask.contains(EventMask::CREATE) {
        Some(EventType::Create)
    } else if mask.contains(EventMask::MODIFY) {
        Some(EventType::Modify)
    } else if mask.contains(EventMask::CLOSE_WRITE) {
        Some(EventType::CloseWrite)
    } else if mask.contains(EventMask::MOVED_TO) {
        Some(EventType::MovedIn)
    } else if mask.contains(EventMask::MOVED_FROM) {
        Some(EventType::MovedOut)
    } else if mask.contains(EventMask::DELETE) {
        Some(EventType::Delete)
    } else {
        None
    }
}
