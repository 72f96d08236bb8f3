//! HTTP submitter: one JSON POST per document, boolean reply.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;

use super::{Acknowledgment, SubmitError, Submitter};
use crate::config::SubmitConfig;
use crate::document::Document;

/// Posts each document as JSON and reads a JSON `true`/`false` reply.
#[derive(Debug, Clone)]
pub struct HttpSubmitter {
    client: Client,
    endpoint: String,
}

impl HttpSubmitter {
    /// Create a submitter for `endpoint` with a per-request timeout.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SubmitError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SubmitError::Client {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config(config: &SubmitConfig) -> Result<Self, SubmitError> {
        Self::new(config.endpoint.clone(), config.timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Submitter for HttpSubmitter {
    fn name(&self) -> &str {
        "http"
    }

    fn submit(&self, document: Document) -> Result<Acknowledgment, SubmitError> {
        let payload = document.to_json_bytes()?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .map_err(|e| SubmitError::Transport {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SubmitError::Status {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        // Anything other than a JSON boolean counts as "not accepted".
        match response.json::<bool>() {
            Ok(accepted) => Ok(Acknowledgment { accepted }),
            Err(e) => {
                crate::debug_event!("submit", "unreadable acknowledgment", "{e}");
                Ok(Acknowledgment::rejected())
            }
        }
    }
}
