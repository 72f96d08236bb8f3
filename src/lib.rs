//! Polling feed-directory relay.
//!
//! Watches configured directories, parses every new or changed file into a
//! [`Document`] and submits it to a remote collector. Files whose parse or
//! submission fails are offered again on a later scan.

pub mod cli;
pub mod config;
pub mod document;
pub mod logging;
pub mod metrics;
pub mod processor;
pub mod relay;
pub mod submit;
pub mod watcher;

pub use config::Settings;
pub use document::{Document, DocumentFormat, DocumentParser, ParseError};
pub use metrics::{RelayStats, StatsSnapshot};
pub use processor::{ProcessOutcome, Processor, ProcessorPool};
pub use relay::{FeedRelay, FeedRelayBuilder, RelayHandle, RelayReport};
pub use submit::{Acknowledgment, SubmitError, Submitter};
pub use watcher::{ChangeDetector, EventKind, FeedEvent, FileSnapshot, WatchError};
