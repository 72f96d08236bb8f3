//! Structured documents extracted from feed files.
//!
//! A [`Document`] is an ordered key/value tree. Parsers turn a file's bytes
//! into one; submitters serialize it for the collector. Key order is the
//! order in which the parser encountered fields.

mod parser;
mod xml;

pub use parser::{DocumentFormat, DocumentParser, JsonParser, ParseError, parser_for};
pub use xml::XmlParser;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered key/value tree produced by a [`DocumentParser`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Insert a field, keeping its original position if it already existed.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Wire payload for the collector.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.0)
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_preserves_insertion_order() {
        let mut doc = Document::new();
        doc.insert("zeta", "last letter");
        doc.insert("alpha", 1);
        doc.insert("mid", json!({"b": 2, "a": 1}));

        let keys: Vec<_> = doc.keys().cloned().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);

        let payload = String::from_utf8(doc.to_json_bytes().unwrap()).unwrap();
        assert_eq!(
            payload,
            r#"{"zeta":"last letter","alpha":1,"mid":{"b":2,"a":1}}"#
        );
    }

    #[test]
    fn test_document_from_map() {
        let map = json!({"k": "v"}).as_object().cloned().unwrap();
        let doc = Document::from(map);
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.get("k"), Some(&json!("v")));
        assert!(!doc.is_empty());
    }
}
