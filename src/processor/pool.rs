//! Fixed-size pool of processor threads.
//!
//! Every worker pulls one event at a time from the shared queue, so each
//! event is handled by exactly one worker. Failed paths go back to the
//! detector on the failure channel.

use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, select};

use super::Processor;
use crate::watcher::{FeedEvent, WatchError};

/// Default number of concurrent processors.
pub const DEFAULT_WORKERS: usize = 8;

/// Handle to the running worker threads.
#[derive(Debug)]
pub struct ProcessorPool {
    workers: Vec<JoinHandle<usize>>,
}

impl ProcessorPool {
    /// Spawn `size` workers draining `events`.
    ///
    /// Workers exit when `events` is closed or `shutdown` fires; an event
    /// already taken is always finished first.
    pub fn spawn(
        size: usize,
        processor: Processor,
        events: Receiver<FeedEvent>,
        failures: Sender<PathBuf>,
        shutdown: Receiver<()>,
    ) -> Result<Self, WatchError> {
        let size = size.max(1);
        let mut workers = Vec::with_capacity(size);

        for id in 0..size {
            let processor = processor.clone();
            let events = events.clone();
            let failures = failures.clone();
            let shutdown = shutdown.clone();

            let handle = thread::Builder::new()
                .name(format!("feedwatch-processor-{id}"))
                .spawn(move || worker_loop(id, processor, events, failures, shutdown))
                .map_err(|e| WatchError::Spawn {
                    thread: format!("processor-{id}"),
                    source: e,
                })?;
            workers.push(handle);
        }

        crate::debug_event!("pool", "started", "{size} workers");
        Ok(Self { workers })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Wait for every worker and return the number of events they handled.
    pub fn join(self) -> Result<usize, WatchError> {
        let mut handled = 0;
        let mut panicked = None;

        for (id, handle) in self.workers.into_iter().enumerate() {
            match handle.join() {
                Ok(count) => handled += count,
                Err(_) => panicked = Some(format!("processor-{id}")),
            }
        }

        match panicked {
            Some(thread) => Err(WatchError::ThreadPanicked { thread }),
            None => Ok(handled),
        }
    }
}

fn worker_loop(
    id: usize,
    processor: Processor,
    events: Receiver<FeedEvent>,
    failures: Sender<PathBuf>,
    shutdown: Receiver<()>,
) -> usize {
    let mut handled = 0;

    loop {
        let next = select! {
            recv(events) -> msg => msg.ok(),
            recv(shutdown) -> _ => None,
        };
        let Some(event) = next else {
            break;
        };

        let outcome = processor.process(&event);
        handled += 1;

        if outcome.needs_retry(processor.retry_rejected()) {
            // Blocks until the detector takes it; a stopped detector has nothing to retry.
            if failures.send(event.path).is_err() {
                crate::debug_event!("pool", "failure not reported", "detector stopped");
            }
        }
    }

    tracing::trace!("[pool] worker {id} exiting after {handled} events");
    handled
}
