//! Polling change detection for feed directories.
//!
//! # Architecture
//!
//! ```text
//! ChangeDetector (one thread, owns FileSnapshot)
//!   - tick: list feeds, diff against snapshot
//!   - hand off FeedEvent ---------> event queue ---> processors
//!   - evict <---------------------- failure channel <-+
//! ```
//!
//! Deletions and renames are not reported. Subdirectories are not descended.

mod detector;
mod error;
mod event;
mod snapshot;

pub use detector::{
    ChangeDetector, DEFAULT_POLL_INTERVAL, DetectorChannels, FeedLocation, ScanReport,
};
pub use error::WatchError;
pub use event::{EventKind, FeedEvent};
pub use snapshot::{FileMeta, FileSnapshot, classify};
