//! Polling change detector.
//!
//! On every tick the detector lists each feed location, diffs the entries
//! against its [`FileSnapshot`] and hands one [`FeedEvent`] at a time to the
//! processors. Paths reported back on the failure channel are evicted from
//! the snapshot so the next scan offers them again as [`EventKind::Create`].
//!
//! The snapshot is owned by the detector thread; processors never see it.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, never, select, tick};

use super::error::WatchError;
use super::event::{EventKind, FeedEvent};
use super::snapshot::{FileMeta, FileSnapshot, classify};
use crate::metrics::RelayStats;

/// Default delay between scans.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A configured feed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedLocation {
    /// Path as written in the configuration.
    pub configured: PathBuf,
    /// Absolute form used for snapshot keys.
    pub absolute: PathBuf,
}

impl FeedLocation {
    pub fn resolve(configured: &Path) -> Result<Self, WatchError> {
        let absolute = std::path::absolute(configured).map_err(|e| WatchError::InvalidFeed {
            path: configured.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            configured: configured.to_path_buf(),
            absolute,
        })
    }
}

/// Outcome of one scan cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub created: usize,
    pub modified: usize,
    pub unchanged: usize,
    /// Locations that could not be listed this cycle.
    pub failed_locations: Vec<PathBuf>,
    /// Whether the candidate snapshot replaced the previous one.
    pub committed: bool,
    /// Whether the cycle stopped early because the hand-off was refused.
    pub interrupted: bool,
}

impl ScanReport {
    pub fn events(&self) -> usize {
        self.created + self.modified
    }
}

/// Channels the detector's control loop waits on.
pub struct DetectorChannels {
    /// Event queue towards the processors.
    pub events: Sender<FeedEvent>,
    /// Paths whose processing failed.
    pub failures: Receiver<PathBuf>,
    /// Closed (or signalled) to stop the detector.
    pub shutdown: Receiver<()>,
}

/// Single-writer owner of the snapshot.
#[derive(Debug)]
pub struct ChangeDetector {
    locations: Vec<FeedLocation>,
    snapshot: FileSnapshot,
    /// Lowercase extensions without the dot; empty accepts every file.
    extensions: Vec<String>,
    poll_interval: Duration,
    stats: Arc<RelayStats>,
}

impl ChangeDetector {
    /// Create a detector for `feeds`, scanned in the given order.
    ///
    /// Duplicate locations are dropped so a file is never emitted twice per cycle.
    pub fn new(feeds: &[PathBuf]) -> Result<Self, WatchError> {
        if feeds.is_empty() {
            return Err(WatchError::NoFeeds);
        }

        let mut seen = HashSet::new();
        let mut locations = Vec::with_capacity(feeds.len());
        for feed in feeds {
            let location = FeedLocation::resolve(feed)?;
            if seen.insert(location.absolute.clone()) {
                locations.push(location);
            } else {
                crate::debug_event!("detector", "duplicate feed ignored", "{}", feed.display());
            }
        }

        Ok(Self {
            locations,
            snapshot: FileSnapshot::new(),
            extensions: Vec::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            stats: Arc::new(RelayStats::new()),
        })
    }

    /// Only pick up files with one of these extensions.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_stats(mut self, stats: Arc<RelayStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn locations(&self) -> &[FeedLocation] {
        &self.locations
    }

    pub fn snapshot(&self) -> &FileSnapshot {
        &self.snapshot
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Forget `path` so the next scan reports it as new.
    ///
    /// Only evictions of known paths are counted.
    pub fn evict(&mut self, path: &Path) -> bool {
        let removed = self.snapshot.remove(path);
        if removed {
            self.stats.record_eviction();
        }
        crate::debug_event!(
            "detector",
            "evicted",
            "{} (was known: {removed})",
            path.display()
        );
        removed
    }

    /// Run one scan cycle, passing each event to `emit` as it is found.
    ///
    /// `emit` returns `false` to abort the cycle; an aborted cycle leaves the
    /// snapshot untouched. A cycle that observes no entries at all also
    /// keeps the previous snapshot.
    pub fn scan_cycle<F>(&mut self, mut emit: F) -> ScanReport
    where
        F: FnMut(FeedEvent) -> bool,
    {
        self.stats.record_scan();

        let mut candidate = FileSnapshot::new();
        let mut report = ScanReport::default();

        for location in &self.locations {
            let entries = match list_location(&location.absolute, &self.extensions) {
                Ok(entries) => entries,
                Err(e) => {
                    self.stats.record_listing_failure();
                    let carried = self.snapshot.carry_over(&location.absolute, &mut candidate);
                    crate::debug_event!(
                        "detector",
                        "listing failed",
                        "{}: {e} (kept {carried} entries)",
                        location.configured.display()
                    );
                    report.failed_locations.push(location.configured.clone());
                    continue;
                }
            };

            for (path, meta) in entries {
                let kind = classify(self.snapshot.get(&path), &meta);
                candidate.insert(path.clone(), meta);

                let Some(kind) = kind else {
                    report.unchanged += 1;
                    continue;
                };

                if !emit(FeedEvent::new(path, kind)) {
                    report.interrupted = true;
                    return report;
                }

                match kind {
                    EventKind::Create => {
                        report.created += 1;
                        self.stats.record_created();
                    }
                    EventKind::Modified => {
                        report.modified += 1;
                        self.stats.record_modified();
                    }
                }
            }
        }

        if candidate.is_empty() {
            tracing::trace!("[detector] empty scan, keeping previous snapshot");
        } else {
            self.snapshot = candidate;
            report.committed = true;
        }

        report
    }

    /// Run one cycle and collect its events instead of handing them off.
    pub fn scan_once(&mut self) -> (Vec<FeedEvent>, ScanReport) {
        let mut events = Vec::new();
        let report = self.scan_cycle(|event| {
            events.push(event);
            true
        });
        (events, report)
    }

    /// Control loop: scan on every tick, evict failed paths, stop on shutdown.
    ///
    /// Failures arriving while an event is being handed off are applied once
    /// the cycle has committed its snapshot, so an evicted path is always
    /// reported as new on a later scan. Returns the final snapshot.
    pub fn run(mut self, channels: DetectorChannels) -> FileSnapshot {
        let DetectorChannels {
            events,
            mut failures,
            shutdown,
        } = channels;
        let ticker = tick(self.poll_interval);

        crate::log_event!(
            "detector",
            "started",
            "{} feed(s) every {:?}",
            self.locations.len(),
            self.poll_interval
        );

        loop {
            let wake = select! {
                recv(ticker) -> _ => Wake::Tick,
                recv(failures) -> msg => Wake::Failure(msg.ok()),
                recv(shutdown) -> _ => Wake::Shutdown,
            };

            match wake {
                Wake::Tick => {
                    let mut deferred = Vec::new();
                    let report = self.scan_cycle(|event| {
                        hand_off(&events, event, &mut failures, &shutdown, &mut deferred)
                    });
                    for path in deferred {
                        self.evict(&path);
                    }

                    if report.interrupted {
                        break;
                    }
                    if report.events() > 0 || !report.failed_locations.is_empty() {
                        crate::debug_event!(
                            "detector",
                            "scan",
                            "{} created, {} modified, {} unchanged, {} unreadable",
                            report.created,
                            report.modified,
                            report.unchanged,
                            report.failed_locations.len()
                        );
                    }
                }
                Wake::Failure(Some(path)) => {
                    self.evict(&path);
                }
                // Every processor is gone; stop polling the closed channel.
                Wake::Failure(None) => failures = never(),
                Wake::Shutdown => break,
            }
        }

        crate::log_event!(
            "detector",
            "stopped",
            "{} known file(s)",
            self.snapshot.len()
        );
        self.snapshot
    }
}

/// What woke the detector up.
enum Wake {
    Tick,
    /// `None` once every processor has dropped its failure sender.
    Failure(Option<PathBuf>),
    Shutdown,
}

/// Offer one event to the processors, servicing failures while waiting.
///
/// Returns `false` on shutdown or when no processor is left to receive.
fn hand_off(
    events: &Sender<FeedEvent>,
    event: FeedEvent,
    failures: &mut Receiver<PathBuf>,
    shutdown: &Receiver<()>,
    deferred: &mut Vec<PathBuf>,
) -> bool {
    loop {
        let failures_rx: &Receiver<PathBuf> = failures;
        let wake = select! {
            send(events, event.clone()) -> res => {
                if res.is_err() {
                    tracing::warn!("[detector] event queue closed, no processors left");
                }
                return res.is_ok();
            }
            recv(failures_rx) -> msg => Wake::Failure(msg.ok()),
            recv(shutdown) -> _ => Wake::Shutdown,
        };

        match wake {
            Wake::Failure(Some(path)) => deferred.push(path),
            Wake::Failure(None) => *failures = never(),
            Wake::Tick | Wake::Shutdown => return false,
        }
    }
}

/// Regular files directly inside `dir`, sorted by path.
fn list_location(dir: &Path, extensions: &[String]) -> io::Result<Vec<(PathBuf, FileMeta)>> {
    let mut entries = Vec::new();

    for entry in fs::read_dir(dir)? {
        let Ok(entry) = entry else {
            continue;
        };
        let path = dir.join(entry.file_name());

        if !has_wanted_extension(&path, extensions) {
            continue;
        }

        // Follows symlinks; entries that vanish mid-listing are skipped.
        let Some(meta) = fs::metadata(&path)
            .ok()
            .and_then(|metadata| FileMeta::from_metadata(&metadata))
        else {
            continue;
        };

        entries.push((path, meta));
    }

    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}

fn has_wanted_extension(path: &Path, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .is_some_and(|ext| extensions.contains(&ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use filetime::{FileTime, set_file_mtime};
    use std::thread;
    use tempfile::TempDir;

    fn detector_for(dirs: &[&Path]) -> ChangeDetector {
        let feeds: Vec<PathBuf> = dirs.iter().map(|d| d.to_path_buf()).collect();
        ChangeDetector::new(&feeds).unwrap()
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        std::path::absolute(&path).unwrap()
    }

    #[test]
    fn test_new_file_emits_single_create() {
        let temp = TempDir::new().unwrap();
        let mut detector = detector_for(&[temp.path()]);

        let (events, report) = detector.scan_once();
        assert!(events.is_empty());
        assert!(!report.committed, "empty directory keeps the empty snapshot");

        let path = write(temp.path(), "f.xml", "<k>v</k>");
        let (events, report) = detector.scan_once();
        assert_eq!(events, vec![FeedEvent::created(&path)]);
        assert_eq!(report.created, 1);
        assert!(report.committed);

        // Nothing changed, nothing emitted
        let (events, report) = detector.scan_once();
        assert!(events.is_empty());
        assert_eq!(report.unchanged, 1);
    }

    #[test]
    fn test_timestamp_change_emits_single_modified() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "f.xml", "<k>v</k>");
        set_file_mtime(&path, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();

        let mut detector = detector_for(&[temp.path()]);
        let (events, _) = detector.scan_once();
        assert_eq!(events, vec![FeedEvent::created(&path)]);

        set_file_mtime(&path, FileTime::from_unix_time(1_600_000_100, 0)).unwrap();
        let (events, report) = detector.scan_once();
        assert_eq!(events, vec![FeedEvent::modified(&path)]);
        assert_eq!(report.modified, 1);

        let (events, _) = detector.scan_once();
        assert!(events.is_empty(), "unchanged timestamp emits nothing");
    }

    #[test]
    fn test_size_change_with_same_timestamp_is_modified() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "f.xml", "<k>v</k>");
        let mtime = FileTime::from_unix_time(1_600_000_000, 0);
        set_file_mtime(&path, mtime).unwrap();

        let mut detector = detector_for(&[temp.path()]);
        detector.scan_once();

        fs::write(&path, "<k>longer value</k>").unwrap();
        set_file_mtime(&path, mtime).unwrap();

        let (events, _) = detector.scan_once();
        assert_eq!(events, vec![FeedEvent::modified(&path)]);
    }

    #[test]
    fn test_snapshot_matches_observed_entries() {
        let temp = TempDir::new().unwrap();
        let a = write(temp.path(), "a.xml", "a");
        let b = write(temp.path(), "b.xml", "b");

        let mut detector = detector_for(&[temp.path()]);
        detector.scan_once();
        assert_eq!(detector.snapshot().paths(), vec![a.as_path(), b.as_path()]);

        fs::remove_file(&b).unwrap();
        let c = write(temp.path(), "c.xml", "c");
        let (events, report) = detector.scan_once();

        assert_eq!(events, vec![FeedEvent::created(&c)]);
        assert!(report.committed);
        // No stale entries survive, no observed entries are missing
        assert_eq!(detector.snapshot().paths(), vec![a.as_path(), c.as_path()]);
    }

    #[test]
    fn test_evicted_path_is_created_again() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "f.xml", "<k>v</k>");

        let mut detector = detector_for(&[temp.path()]);
        detector.scan_once();

        assert!(detector.evict(&path));
        assert!(!detector.snapshot().contains(&path));
        assert!(!detector.evict(&path), "second eviction is a no-op");

        let (events, _) = detector.scan_once();
        assert_eq!(events, vec![FeedEvent::created(&path)]);
        assert!(detector.snapshot().contains(&path));
    }

    #[test]
    fn test_unknown_path_eviction_is_not_counted() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "f.xml", "<k>v</k>");
        let stats = Arc::new(RelayStats::new());

        let mut detector = detector_for(&[temp.path()]).with_stats(stats.clone());
        assert!(!detector.evict(&path), "not scanned yet");
        assert_eq!(stats.snapshot().evictions, 0);

        detector.scan_once();
        assert!(detector.evict(&path));
        assert!(!detector.evict(&path));
        assert_eq!(stats.snapshot().evictions, 1);
    }

    #[test]
    fn test_all_empty_scan_keeps_previous_snapshot() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "f.xml", "<k>v</k>");

        let mut detector = detector_for(&[temp.path()]);
        detector.scan_once();

        fs::remove_file(&path).unwrap();
        let (events, report) = detector.scan_once();
        assert!(events.is_empty());
        assert!(!report.committed);
        assert!(detector.snapshot().contains(&path));
    }

    #[test]
    fn test_unreadable_location_keeps_its_entries() {
        let temp = TempDir::new().unwrap();
        let dir_a = temp.path().join("a");
        let dir_b = temp.path().join("b");
        fs::create_dir_all(&dir_a).unwrap();
        fs::create_dir_all(&dir_b).unwrap();
        let a = write(&dir_a, "one.xml", "1");
        let b = write(&dir_b, "two.xml", "2");
        let b_meta = fs::metadata(&b).unwrap();

        let mut detector = detector_for(&[dir_a.as_path(), dir_b.as_path()]);
        detector.scan_once();

        fs::remove_dir_all(&dir_b).unwrap();
        let (events, report) = detector.scan_once();

        assert!(events.is_empty());
        assert!(report.committed);
        assert_eq!(report.failed_locations, vec![dir_b.clone()]);
        assert!(detector.snapshot().contains(&a));
        assert_eq!(
            detector.snapshot().get(&b),
            FileMeta::from_metadata(&b_meta).as_ref(),
            "entries of the unreadable location are kept unchanged"
        );
    }

    #[test]
    fn test_missing_location_is_skipped() {
        let temp = TempDir::new().unwrap();
        let present = write(temp.path(), "f.xml", "x");

        let mut detector = detector_for(&[temp.path().join("missing").as_path(), temp.path()]);
        let (events, report) = detector.scan_once();

        assert_eq!(events, vec![FeedEvent::created(&present)]);
        assert_eq!(report.failed_locations.len(), 1);
    }

    #[test]
    fn test_events_follow_location_then_name_order() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("first");
        let second = temp.path().join("second");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();

        let s_a = write(&second, "a.xml", "");
        let f_c = write(&first, "c.xml", "");
        let f_b = write(&first, "b.xml", "");

        let mut detector = detector_for(&[first.as_path(), second.as_path()]);
        let (events, _) = detector.scan_once();
        let paths: Vec<_> = events.iter().map(|e| e.path.clone()).collect();
        assert_eq!(paths, vec![f_b, f_c, s_a]);
    }

    #[test]
    fn test_directories_and_unwanted_extensions_are_ignored() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("nested.xml")).unwrap();
        let wanted = write(temp.path(), "report.XML", "");
        write(temp.path(), "notes.txt", "");

        let mut detector = detector_for(&[temp.path()]).with_extensions([".xml"]);
        let (events, _) = detector.scan_once();
        assert_eq!(events, vec![FeedEvent::created(&wanted)]);
    }

    #[test]
    fn test_duplicate_feeds_are_scanned_once() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "f.xml", "");

        let mut detector = detector_for(&[temp.path(), temp.path()]);
        assert_eq!(detector.locations().len(), 1);
        let (events, _) = detector.scan_once();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_no_feeds_is_an_error() {
        assert!(matches!(
            ChangeDetector::new(&[]),
            Err(WatchError::NoFeeds)
        ));
    }

    #[test]
    fn test_refused_hand_off_does_not_commit() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.xml", "");
        write(temp.path(), "b.xml", "");

        let mut detector = detector_for(&[temp.path()]);
        let report = detector.scan_cycle(|_| false);

        assert!(report.interrupted);
        assert!(!report.committed);
        assert_eq!(report.created, 0);
        assert!(detector.snapshot().is_empty());
    }

    #[test]
    fn test_run_loop_retries_after_failure_report() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "f.xml", "<k>v</k>");

        let (event_tx, event_rx) = bounded(0);
        let (failure_tx, failure_rx) = bounded(0);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let detector = detector_for(&[temp.path()]).with_poll_interval(Duration::from_millis(10));
        let handle = thread::spawn(move || {
            detector.run(DetectorChannels {
                events: event_tx,
                failures: failure_rx,
                shutdown: shutdown_rx,
            })
        });

        let first = event_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(first, FeedEvent::created(&path));

        // Unchanged file: no further events
        assert!(event_rx.recv_timeout(Duration::from_millis(100)).is_err());

        failure_tx.send(path.clone()).unwrap();
        let retried = event_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(retried, FeedEvent::created(&path));

        drop(shutdown_tx);
        let snapshot = handle.join().unwrap();
        assert!(snapshot.contains(&path));
    }

    #[test]
    fn test_failure_during_hand_off_is_evicted_after_commit() {
        let temp = TempDir::new().unwrap();
        let a = write(temp.path(), "a.xml", "<k>a</k>");
        let b = write(temp.path(), "b.xml", "<k>b</k>");

        let (event_tx, event_rx) = bounded(0);
        let (failure_tx, failure_rx) = bounded(0);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let detector = detector_for(&[temp.path()]).with_poll_interval(Duration::from_millis(10));
        let handle = thread::spawn(move || {
            detector.run(DetectorChannels {
                events: event_tx,
                failures: failure_rx,
                shutdown: shutdown_rx,
            })
        });

        let first = event_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(first, FeedEvent::created(&a));

        // The detector is now blocked offering `b`; the failure must still be taken
        failure_tx
            .send_timeout(a.clone(), Duration::from_secs(5))
            .unwrap();

        let second = event_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(second, FeedEvent::created(&b));

        let retried = event_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(retried, FeedEvent::created(&a));

        drop(shutdown_tx);
        let snapshot = handle.join().unwrap();
        assert!(snapshot.contains(&a));
        assert!(snapshot.contains(&b));
    }

    #[test]
    fn test_shutdown_unblocks_pending_hand_off() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "f.xml", "");

        // Nobody ever receives from the queue
        let (event_tx, _event_rx) = bounded::<FeedEvent>(0);
        let (_failure_tx, failure_rx) = bounded::<PathBuf>(0);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let detector = detector_for(&[temp.path()]).with_poll_interval(Duration::from_millis(10));
        let handle = thread::spawn(move || {
            detector.run(DetectorChannels {
                events: event_tx,
                failures: failure_rx,
                shutdown: shutdown_rx,
            })
        });

        thread::sleep(Duration::from_millis(50));
        drop(shutdown_tx);

        let snapshot = handle.join().unwrap();
        assert!(snapshot.is_empty(), "interrupted scan must not commit");
    }
}
