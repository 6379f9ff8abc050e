//! Reference list of known file extensions

use crate::error::{GuardError, Result};
use std::collections::HashSet;
use std::path::Path;

/// Lower-cased extensions without the leading dot
#[derive(Debug, Clone, Default)]
pub struct KnownExtensions {
    extensions: HashSet<String>,
}

impl KnownExtensions {
    /// Load a newline-delimited list. A missing or unreadable list is fatal.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| GuardError::ReferenceList {
            path: path.to_path_buf(),
            source,
        })?;

        let extensions = Self::parse(&content);
        tracing::info!("Loaded {} known extensions from {:?}", extensions.len(), path);
        Ok(extensions)
    }

    /// Parse list content. Blank lines are ignored, a leading dot is optional.
    pub fn parse(content: &str) -> Self {
        content.lines().collect()
    }

    /// Case-insensitive membership, leading dot ignored
    pub fn contains(&self, extension: &str) -> bool {
        self.extensions.contains(&normalize(extension))
    }

    /// Whether the path's extension is in the list
    pub fn recognizes(&self, path: &Path) -> bool {
        self.contains(&extension_of(path))
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for KnownExtensions {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let extensions = iter
            .into_iter()
            .map(|e| normalize(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        Self { extensions }
    }
}

/// Lower-cased extension of a path, empty when it has none
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn normalize(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_lowercase()
}
