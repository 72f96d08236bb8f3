//! Delivery of parsed documents to the remote collector.

mod http;

pub use http::HttpSubmitter;

use thiserror::Error;

use crate::document::Document;

/// Result reported by the collector for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acknowledgment {
    /// `true` when the collector accepted the document.
    pub accepted: bool,
}

impl Acknowledgment {
    pub fn accepted() -> Self {
        Self { accepted: true }
    }

    pub fn rejected() -> Self {
        Self { accepted: false }
    }
}

/// Errors from serializing or delivering a document.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to build HTTP client: {reason}")]
    Client { reason: String },

    #[error("Request to {endpoint} failed: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("Collector at {endpoint} answered with status {status}")]
    Status { endpoint: String, status: u16 },
}

/// Sends documents downstream.
///
/// Implementations are shared by every processor thread and may block.
pub trait Submitter: Send + Sync {
    /// Submitter name for logging.
    fn name(&self) -> &str;

    /// Serialize and deliver one document.
    fn submit(&self, document: Document) -> Result<Acknowledgment, SubmitError>;
}
