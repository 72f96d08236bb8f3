//! Wiring of detector, event queue, processor pool and failure channel.
//!
//! ```text
//! ChangeDetector --events--> ProcessorPool --submit--> collector
//!        ^                         |
//!        +-------- failures -------+
//! ```
//!
//! All three channels are crossbeam channels. The failure channel is a
//! rendezvous; the event queue is one too unless a capacity is configured.
//! Closing the shutdown channel stops every thread.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Sender, bounded};

use crate::config::Settings;
use crate::document::{DocumentParser, parser_for};
use crate::metrics::{RelayStats, StatsSnapshot};
use crate::processor::{DEFAULT_WORKERS, Processor, ProcessorPool};
use crate::submit::{HttpSubmitter, Submitter};
use crate::watcher::{
    ChangeDetector, DEFAULT_POLL_INTERVAL, DetectorChannels, FileSnapshot, WatchError,
};

/// A configured, not yet started relay.
pub struct FeedRelay {
    feeds: Vec<PathBuf>,
    poll_interval: Duration,
    workers: usize,
    queue_capacity: usize,
    extensions: Vec<String>,
    retry_rejected: bool,
    parser: Arc<dyn DocumentParser>,
    submitter: Arc<dyn Submitter>,
}

impl std::fmt::Debug for FeedRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedRelay")
            .field("feeds", &self.feeds)
            .field("poll_interval", &self.poll_interval)
            .field("workers", &self.workers)
            .field("queue_capacity", &self.queue_capacity)
            .field("parser", &self.parser.name())
            .field("submitter", &self.submitter.name())
            .finish()
    }
}

impl FeedRelay {
    /// Create a builder for configuring the relay.
    pub fn builder() -> FeedRelayBuilder {
        FeedRelayBuilder::new()
    }

    /// Relay with the configured parser and an HTTP submitter.
    pub fn from_settings(settings: &Settings) -> Result<Self, WatchError> {
        let submitter =
            HttpSubmitter::from_config(&settings.submit).map_err(|e| WatchError::InitFailed {
                component: "submitter".to_string(),
                reason: e.to_string(),
            })?;
        crate::debug_event!("relay", "collector", "{}", submitter.endpoint());

        Self::builder()
            .feeds(settings.feeds.iter().cloned())
            .poll_interval(settings.watch.poll_interval())
            .workers(settings.watch.workers)
            .queue_capacity(settings.watch.queue_capacity)
            .extensions(settings.watch.extensions.iter().cloned())
            .retry_rejected(settings.submit.retry_rejected)
            .parser(parser_for(settings.parser.format))
            .submitter(Arc::new(submitter))
            .build()
    }

    /// Spawn the detector and the processor pool.
    pub fn start(self) -> Result<RelayHandle, WatchError> {
        let stats = Arc::new(RelayStats::new());

        let detector = ChangeDetector::new(&self.feeds)?
            .with_extensions(&self.extensions)
            .with_poll_interval(self.poll_interval)
            .with_stats(stats.clone());

        let processor = Processor::new(self.parser, self.submitter)
            .with_retry_rejected(self.retry_rejected)
            .with_stats(stats.clone());

        let (event_tx, event_rx) = bounded(self.queue_capacity);
        let (failure_tx, failure_rx) = bounded(0);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let pool = ProcessorPool::spawn(
            self.workers,
            processor,
            event_rx,
            failure_tx,
            shutdown_rx.clone(),
        )?;

        let channels = DetectorChannels {
            events: event_tx,
            failures: failure_rx,
            shutdown: shutdown_rx,
        };
        // On failure the closure and its channels are dropped, which stops the pool.
        let detector = thread::Builder::new()
            .name("feedwatch-detector".to_string())
            .spawn(move || detector.run(channels))
            .map_err(|e| WatchError::Spawn {
                thread: "detector".to_string(),
                source: e,
            })?;

        crate::log_event!(
            "relay",
            "started",
            "{} feed(s), {} worker(s)",
            self.feeds.len(),
            pool.size()
        );

        Ok(RelayHandle {
            shutdown: Some(shutdown_tx),
            detector,
            pool,
            stats,
        })
    }
}

/// Builder for constructing a [`FeedRelay`].
pub struct FeedRelayBuilder {
    feeds: Vec<PathBuf>,
    poll_interval: Duration,
    workers: usize,
    queue_capacity: usize,
    extensions: Vec<String>,
    retry_rejected: bool,
    parser: Option<Arc<dyn DocumentParser>>,
    submitter: Option<Arc<dyn Submitter>>,
}

impl FeedRelayBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            feeds: Vec::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            workers: DEFAULT_WORKERS,
            queue_capacity: 0,
            extensions: Vec::new(),
            retry_rejected: false,
            parser: None,
            submitter: None,
        }
    }

    /// Add one feed directory.
    pub fn feed(mut self, path: impl Into<PathBuf>) -> Self {
        self.feeds.push(path.into());
        self
    }

    /// Add several feed directories, scanned in this order.
    pub fn feeds(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.feeds.extend(paths);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Event queue capacity; 0 hands events over directly.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn extensions(mut self, extensions: impl IntoIterator<Item = String>) -> Self {
        self.extensions.extend(extensions);
        self
    }

    pub fn retry_rejected(mut self, retry: bool) -> Self {
        self.retry_rejected = retry;
        self
    }

    pub fn parser(mut self, parser: Arc<dyn DocumentParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn submitter(mut self, submitter: Arc<dyn Submitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }

    /// Build the relay.
    pub fn build(self) -> Result<FeedRelay, WatchError> {
        if self.feeds.is_empty() {
            return Err(WatchError::NoFeeds);
        }
        if self.workers == 0 || self.poll_interval.is_zero() {
            return Err(WatchError::InitFailed {
                component: "relay".to_string(),
                reason: "workers and poll interval must be non-zero".to_string(),
            });
        }

        let submitter = self.submitter.ok_or_else(|| WatchError::InitFailed {
            component: "relay".to_string(),
            reason: "Submitter is required".to_string(),
        })?;
        let parser = self
            .parser
            .unwrap_or_else(|| parser_for(Default::default()));

        Ok(FeedRelay {
            feeds: self.feeds,
            poll_interval: self.poll_interval,
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            extensions: self.extensions,
            retry_rejected: self.retry_rejected,
            parser,
            submitter,
        })
    }
}

impl Default for FeedRelayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary returned by [`RelayHandle::shutdown`].
#[derive(Debug, Clone)]
pub struct RelayReport {
    pub stats: StatsSnapshot,
    /// Events taken by processors, summed over workers.
    pub handled: usize,
    /// Snapshot held by the detector when it stopped.
    pub snapshot: FileSnapshot,
}

/// A running relay.
#[derive(Debug)]
pub struct RelayHandle {
    shutdown: Option<Sender<()>>,
    detector: JoinHandle<FileSnapshot>,
    pool: ProcessorPool,
    stats: Arc<RelayStats>,
}

impl RelayHandle {
    /// Counters so far.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Whether the detector thread is still running.
    pub fn is_running(&self) -> bool {
        !self.detector.is_finished()
    }

    /// Stop scanning, let in-flight events finish and join every thread.
    pub fn shutdown(mut self) -> Result<RelayReport, WatchError> {
        crate::log_event!("relay", "shutting down");
        // Closing the channel wakes the detector and every idle worker.
        drop(self.shutdown.take());

        let snapshot = self
            .detector
            .join()
            .map_err(|_| WatchError::ThreadPanicked {
                thread: "detector".to_string(),
            })?;
        let handled = self.pool.join()?;
        let stats = self.stats.snapshot();

        crate::log_event!(
            "relay",
            "stopped",
            "{} handled, {} delivered, {} failed, {} evictions",
            handled,
            stats.delivered,
            stats.parse_failures + stats.submit_failures,
            stats.evictions
        );

        Ok(RelayReport {
            stats,
            handled,
            snapshot,
        })
    }
}
