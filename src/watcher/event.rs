//! Change events handed from the detector to the processors.

use std::fmt;
use std::path::{Path, PathBuf};

/// How a file changed since the last scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Path was not in the snapshot (never seen, or evicted after a failure).
    Create,
    /// Path was known but its timestamp or size changed.
    Modified,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Create => "CREATE",
            EventKind::Modified => "MODIFIED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified file change. Consumed by exactly one processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEvent {
    pub path: PathBuf,
    pub kind: EventKind,
}

impl FeedEvent {
    pub fn new(path: impl Into<PathBuf>, kind: EventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::new(path, EventKind::Create)
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self::new(path, EventKind::Modified)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for FeedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.path.display())
    }
}
