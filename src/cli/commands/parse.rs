//! Parse command - print a feed file as a JSON document.

use std::path::Path;

use anyhow::Context;

use crate::config::Settings;
use crate::document::parser_for;

/// Parse `file_path` with the configured format and print the document.
pub fn run(file_path: &Path, settings: &Settings) -> anyhow::Result<()> {
    let parser = parser_for(settings.parser.format);
    let document = parser
        .parse(file_path)
        .with_context(|| format!("{} parser", parser.name()))?;

    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}
