//! Remembered state of the feed locations.
//!
//! The snapshot maps absolute file paths to the metadata observed during
//! the last committed scan. It is owned by the change detector alone.

use std::collections::HashMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::event::EventKind;

/// Metadata compared between scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    pub modified: SystemTime,
    pub len: u64,
}

impl FileMeta {
    pub fn new(modified: SystemTime, len: u64) -> Self {
        Self { modified, len }
    }

    /// Metadata for a regular file, `None` for anything else or when the
    /// platform cannot report a modification time.
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        if !metadata.is_file() {
            return None;
        }
        let modified = metadata.modified().ok()?;
        Some(Self::new(modified, metadata.len()))
    }
}

/// Classify an observed entry against what the snapshot remembers.
///
/// Returns `None` when the entry is unchanged.
pub fn classify(previous: Option<&FileMeta>, current: &FileMeta) -> Option<EventKind> {
    match previous {
        None => Some(EventKind::Create),
        Some(prev) if prev != current => Some(EventKind::Modified),
        Some(_) => None,
    }
}

/// Path -> last observed metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSnapshot {
    entries: HashMap<PathBuf, FileMeta>,
}

impl FileSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &Path) -> Option<&FileMeta> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn insert(&mut self, path: PathBuf, meta: FileMeta) {
        self.entries.insert(path, meta);
    }

    /// Forget a path. Returns `true` if it was present.
    pub fn remove(&mut self, path: &Path) -> bool {
        self.entries.remove(path).is_some()
    }

    /// Copy every entry located directly inside `dir` into `target`.
    ///
    /// Used to keep a location's files when its listing fails for a cycle.
    pub fn carry_over(&self, dir: &Path, target: &mut FileSnapshot) -> usize {
        let mut carried = 0;
        for (path, meta) in &self.entries {
            if path.parent() == Some(dir) {
                target.entries.insert(path.clone(), *meta);
                carried += 1;
            }
        }
        carried
    }

    /// Sorted list of remembered paths.
    pub fn paths(&self) -> Vec<&Path> {
        let mut paths: Vec<&Path> = self.entries.keys().map(PathBuf::as_path).collect();
        paths.sort();
        paths
    }
}
