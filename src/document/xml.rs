//! XML feed files to [`Document`].
//!
//! Mapping rules:
//! - The root element becomes the single top-level key.
//! - An element with neither attributes nor children maps to its text (`""` when empty).
//! - Attributes map to `-name` keys, child elements to their tag name.
//! - Repeated sibling tags collapse into an array in document order.
//! - Text next to attributes or children is kept under `#text`.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};

use super::{Document, DocumentParser, ParseError};

/// Key prefix for attributes.
pub const ATTR_PREFIX: &str = "-";
/// Key for element text that sits next to attributes or children.
pub const TEXT_KEY: &str = "#text";

/// Parser for XML feed files.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlParser;

impl XmlParser {
    pub fn new() -> Self {
        Self
    }
}

/// An element that is still open.
struct Frame {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>, path: &Path) -> Result<Self, ParseError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut fields = Map::new();

        for attr in start.attributes() {
            let attr = attr.map_err(|e| xml_error(path, e))?;
            let key = format!(
                "{ATTR_PREFIX}{}",
                String::from_utf8_lossy(attr.key.as_ref())
            );
            let value = attr.unescape_value().map_err(|e| xml_error(path, e))?;
            fields.insert(key, Value::String(value.into_owned()));
        }

        Ok(Self {
            name,
            fields,
            text: String::new(),
        })
    }

    fn close(self) -> (String, Value) {
        let Frame {
            name,
            mut fields,
            text,
        } = self;

        if fields.is_empty() {
            return (name, Value::String(text));
        }
        if !text.is_empty() {
            fields.insert(TEXT_KEY.to_string(), Value::String(text));
        }
        (name, Value::Object(fields))
    }
}

/// Add a child under `key`, turning repeated keys into an array.
fn attach(fields: &mut Map<String, Value>, key: String, value: Value) {
    match fields.get_mut(&key) {
        None => {
            fields.insert(key, value);
        }
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

fn xml_error(path: &Path, e: impl std::fmt::Display) -> ParseError {
    ParseError::Xml {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

impl DocumentParser for XmlParser {
    fn name(&self) -> &str {
        "xml"
    }

    fn parse(&self, path: &Path) -> Result<Document, ParseError> {
        let file = File::open(path).map_err(|e| ParseError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut reader = Reader::from_reader(BufReader::new(file));
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Frame> = Vec::new();
        let mut document = Document::new();
        let mut buf = Vec::new();

        // Finished elements go to their parent, or become the root.
        let mut finish = |stack: &mut Vec<Frame>, frame: Frame| -> Result<(), ParseError> {
            let (name, value) = frame.close();
            match stack.last_mut() {
                Some(parent) => attach(&mut parent.fields, name, value),
                None if document.is_empty() => {
                    document.insert(name, value);
                }
                None => return Err(xml_error(path, "multiple root elements")),
            }
            Ok(())
        };

        loop {
            match reader
                .read_event_into(&mut buf)
                .map_err(|e| xml_error(path, e))?
            {
                Event::Start(start) => stack.push(Frame::open(&start, path)?),
                Event::Empty(start) => {
                    let frame = Frame::open(&start, path)?;
                    finish(&mut stack, frame)?;
                }
                Event::End(_) => match stack.pop() {
                    Some(frame) => finish(&mut stack, frame)?,
                    None => return Err(xml_error(path, "unexpected closing tag")),
                },
                Event::Text(text) => {
                    if let Some(frame) = stack.last_mut() {
                        let text = text.unescape().map_err(|e| xml_error(path, e))?;
                        frame.text.push_str(text.trim());
                    }
                }
                Event::CData(data) => {
                    if let Some(frame) = stack.last_mut() {
                        frame.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::Eof => break,
                // Declarations, comments, processing instructions, doctype
                _ => {}
            }
            buf.clear();
        }

        if let Some(open) = stack.last() {
            return Err(xml_error(path, format!("unclosed element <{}>", open.name)));
        }
        if document.is_empty() {
            return Err(ParseError::MissingRoot {
                path: path.to_path_buf(),
            });
        }

        Ok(document)
    }
}
