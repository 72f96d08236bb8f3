//! Parser contract and format selection.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::{Document, XmlParser};

/// Errors from turning a file into a [`Document`].
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed XML in {path}: {reason}")]
    Xml { path: PathBuf, reason: String },

    #[error("Malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("No root element in {path}")]
    MissingRoot { path: PathBuf },

    #[error("Top-level JSON value in {path} is not an object")]
    NotAnObject { path: PathBuf },
}

impl ParseError {
    /// Path of the file that failed to parse.
    pub fn path(&self) -> &Path {
        match self {
            ParseError::FileRead { path, .. }
            | ParseError::Xml { path, .. }
            | ParseError::Json { path, .. }
            | ParseError::MissingRoot { path }
            | ParseError::NotAnObject { path } => path,
        }
    }
}

/// Turns a file into a structured document.
///
/// Implementations are shared by every processor thread.
pub trait DocumentParser: Send + Sync {
    /// Parser name for logging.
    fn name(&self) -> &str;

    /// Read and parse the file at `path`.
    fn parse(&self, path: &Path) -> Result<Document, ParseError>;
}

/// Supported feed file formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    #[default]
    Xml,
    Json,
}

/// Parser for the configured format.
pub fn parser_for(format: DocumentFormat) -> Arc<dyn DocumentParser> {
    match format {
        DocumentFormat::Xml => Arc::new(XmlParser::new()),
        DocumentFormat::Json => Arc::new(JsonParser),
    }
}

/// Parser for files that already hold a JSON object.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonParser;

impl DocumentParser for JsonParser {
    fn name(&self) -> &str {
        "json"
    }

    fn parse(&self, path: &Path) -> Result<Document, ParseError> {
        let bytes = std::fs::read(path).map_err(|e| ParseError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let value: Value = serde_json::from_slice(&bytes).map_err(|e| ParseError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;

        match value {
            Value::Object(map) => Ok(Document::from(map)),
            _ => Err(ParseError::NotAnObject {
                path: path.to_path_buf(),
            }),
        }
    }
}
