//! Per-event work: parse the file, submit the document.
//!
//! A [`Processor`] never touches the detector's snapshot. Whether a failed
//! event is offered again is decided by [`ProcessOutcome::needs_retry`]; the
//! pool reports those paths on the failure channel.

mod pool;

pub use pool::{DEFAULT_WORKERS, ProcessorPool};

use std::sync::Arc;

use crate::document::{DocumentParser, ParseError};
use crate::metrics::RelayStats;
use crate::submit::{SubmitError, Submitter};
use crate::watcher::FeedEvent;

/// Result of processing one event.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// Submitted and acknowledged with `true`.
    Delivered,
    /// Submitted, but the collector answered `false`.
    Rejected,
    ParseFailed(ParseError),
    SubmitFailed(SubmitError),
}

impl ProcessOutcome {
    /// Whether the file should be evicted and offered again on a later scan.
    pub fn needs_retry(&self, retry_rejected: bool) -> bool {
        match self {
            ProcessOutcome::Delivered => false,
            ProcessOutcome::Rejected => retry_rejected,
            ProcessOutcome::ParseFailed(_) | ProcessOutcome::SubmitFailed(_) => true,
        }
    }
}

/// Parses and submits feed files. Cheap to clone; one clone per worker.
#[derive(Clone)]
pub struct Processor {
    parser: Arc<dyn DocumentParser>,
    submitter: Arc<dyn Submitter>,
    retry_rejected: bool,
    stats: Arc<RelayStats>,
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("parser", &self.parser.name())
            .field("submitter", &self.submitter.name())
            .field("retry_rejected", &self.retry_rejected)
            .finish()
    }
}

impl Processor {
    pub fn new(parser: Arc<dyn DocumentParser>, submitter: Arc<dyn Submitter>) -> Self {
        Self {
            parser,
            submitter,
            retry_rejected: false,
            stats: Arc::new(RelayStats::new()),
        }
    }

    /// Also retry files the collector answered `false` for.
    pub fn with_retry_rejected(mut self, retry: bool) -> Self {
        self.retry_rejected = retry;
        self
    }

    pub fn with_stats(mut self, stats: Arc<RelayStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn retry_rejected(&self) -> bool {
        self.retry_rejected
    }

    /// Parse `event.path` and submit the result.
    ///
    /// Blocks for the duration of the parse and the submission.
    pub fn process(&self, event: &FeedEvent) -> ProcessOutcome {
        crate::log_event!("processor", event.kind, "{}", event.path.display());
        self.stats.record_processed();

        let document = match self.parser.parse(&event.path) {
            Ok(document) => document,
            Err(e) => {
                self.stats.record_parse_failure();
                tracing::warn!("[processor] {} parse failed: {e}", self.parser.name());
                return ProcessOutcome::ParseFailed(e);
            }
        };

        match self.submitter.submit(document) {
            Ok(ack) if ack.accepted => {
                self.stats.record_delivered();
                crate::log_event!("processor", "acknowledged", "true {}", event.path.display());
                ProcessOutcome::Delivered
            }
            Ok(_) => {
                self.stats.record_rejected();
                tracing::warn!(
                    "[processor] collector rejected {}",
                    event.path.display()
                );
                ProcessOutcome::Rejected
            }
            Err(e) => {
                self.stats.record_submit_failure();
                tracing::warn!("[processor] {} submit failed: {e}", self.submitter.name());
                ProcessOutcome::SubmitFailed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, XmlParser};
    use crate::submit::Acknowledgment;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records documents and answers with a fixed result.
    struct ScriptedSubmitter {
        received: Mutex<Vec<Document>>,
        reply: fn() -> Result<Acknowledgment, SubmitError>,
    }

    impl ScriptedSubmitter {
        fn new(reply: fn() -> Result<Acknowledgment, SubmitError>) -> Arc<Self> {
            Arc::new(Self {
                received: Mutex::new(Vec::new()),
                reply,
            })
        }
    }

    impl Submitter for ScriptedSubmitter {
        fn name(&self) -> &str {
            "scripted"
        }

        fn submit(&self, document: Document) -> Result<Acknowledgment, SubmitError> {
            self.received.lock().unwrap().push(document);
            (self.reply)()
        }
    }

    fn feed_file(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("a.dat");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parsed_document_is_submitted() {
        let temp = TempDir::new().unwrap();
        let path = feed_file(temp.path(), "<k>v</k>");
        let submitter = ScriptedSubmitter::new(|| Ok(Acknowledgment::accepted()));
        let stats = Arc::new(RelayStats::new());

        let processor =
            Processor::new(Arc::new(XmlParser::new()), submitter.clone()).with_stats(stats.clone());
        let outcome = processor.process(&FeedEvent::created(&path));

        assert!(matches!(outcome, ProcessOutcome::Delivered));
        assert!(!outcome.needs_retry(true));

        let received = submitter.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(
            serde_json::to_value(&received[0]).unwrap(),
            serde_json::json!({"k": "v"})
        );
        assert_eq!(stats.snapshot().delivered, 1);
    }

    #[test]
    fn test_parse_failure_skips_submission() {
        let temp = TempDir::new().unwrap();
        let path = feed_file(temp.path(), "<unclosed>");
        let submitter = ScriptedSubmitter::new(|| Ok(Acknowledgment::accepted()));

        let processor = Processor::new(Arc::new(XmlParser::new()), submitter.clone());
        let outcome = processor.process(&FeedEvent::modified(&path));

        assert!(matches!(outcome, ProcessOutcome::ParseFailed(_)));
        assert!(outcome.needs_retry(false));
        assert!(submitter.received.lock().unwrap().is_empty());
    }

    #[test]
    fn test_submit_failure_is_retryable() {
        let temp = TempDir::new().unwrap();
        let path = feed_file(temp.path(), "<k>v</k>");
        let submitter = ScriptedSubmitter::new(|| {
            Err(SubmitError::Status {
                endpoint: "http://collector/data".to_string(),
                status: 503,
            })
        });

        let processor = Processor::new(Arc::new(XmlParser::new()), submitter);
        let outcome = processor.process(&FeedEvent::created(&path));

        assert!(matches!(outcome, ProcessOutcome::SubmitFailed(_)));
        assert!(outcome.needs_retry(false));
    }

    #[test]
    fn test_rejection_retry_is_opt_in() {
        let temp = TempDir::new().unwrap();
        let path = feed_file(temp.path(), "<k>v</k>");
        let submitter = ScriptedSubmitter::new(|| Ok(Acknowledgment::rejected()));

        let processor = Processor::new(Arc::new(XmlParser::new()), submitter);
        let outcome = processor.process(&FeedEvent::created(&path));

        assert!(matches!(outcome, ProcessOutcome::Rejected));
        assert!(!outcome.needs_retry(false));
        assert!(outcome.needs_retry(true));
    }
}
