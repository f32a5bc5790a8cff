use serde_json::Value;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::record::Record;

/// Placeholder key always bound to the textual rendering of the records.
pub const TABLE_DATA_KEY: &str = "TABLE_DATA";

/// Line emitted for `TABLE_DATA` when there are no records.
pub const NO_DATA_TEXT: &str = "No data available";

const VALUE_SEPARATOR: &str = " \t ";

/// Why a custom template could not be used. The orchestrator treats either
/// variant as the signal to fall back to from-scratch assembly.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// The template file is absent from the storage disk.
    #[error("Template not found: {0}")]
    NotFound(String),

    /// The template bytes could not be opened or rewritten as a DOCX
    /// package.
    #[error("Template could not be processed: {0}")]
    Malformed(String),
}

/// Flat placeholder -> value map applied to a custom template. Keys are
/// used verbatim; insertion order is kept and `set` replaces an existing
/// key in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceholderMap {
    entries: Vec<(String, String)>,
}

impl PlaceholderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the map for an export: `TABLE_DATA` first, then the
    /// user-supplied variables coerced to strings.
    pub fn build(records: &[Record], variables: &HashMap<String, Value>) -> Self {
        let mut map = Self::new();
        map.set(TABLE_DATA_KEY, render_table_text(records));
        for (name, value) in variables {
            map.set(name.clone(), coerce_to_string(value));
        }
        map
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// Plain-text rendering of the records for the `TABLE_DATA` placeholder:
/// one line per record, values joined by a tab-surrounded separator, nulls
/// as `-`.
pub fn render_table_text(records: &[Record]) -> String {
    if records.is_empty() {
        return NO_DATA_TEXT.to_string();
    }

    records
        .iter()
        .map(|record| {
            record
                .values()
                .map(|v| v.render())
                .collect::<Vec<_>>()
                .join(VALUE_SEPARATOR)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Coerce a variable value to its placeholder string. Scalars are
/// stringified directly (strings without quotes); anything structured is
/// serialized as JSON.
fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(_) | Value::Bool(_) => value.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Substitute `${NAME}` placeholders in an existing DOCX template.
///
/// The package is rewritten entry by entry; only the main document part and
/// header/footer parts are touched, everything else is copied through
/// untouched. Any failure to open or rewrite the package surfaces as
/// `TemplateError::Malformed` so the caller can fall back.
pub fn fill(template: &[u8], placeholders: &PlaceholderMap) -> Result<Vec<u8>, TemplateError> {
    let mut archive = ZipArchive::new(Cursor::new(template)).map_err(malformed)?;
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(malformed)?;
        let name = entry.name().to_string();

        if is_substitutable_part(&name) {
            let mut xml = String::new();
            entry.read_to_string(&mut xml).map_err(malformed)?;
            let replaced = substitute(&xml, placeholders);
            zip.start_file(name.as_str(), options).map_err(malformed)?;
            zip.write_all(replaced.as_bytes()).map_err(malformed)?;
        } else {
            let mut raw = Vec::new();
            entry.read_to_end(&mut raw).map_err(malformed)?;
            zip.start_file(name.as_str(), options).map_err(malformed)?;
            zip.write_all(&raw).map_err(malformed)?;
        }
    }

    let cursor = zip.finish().map_err(malformed)?;
    Ok(cursor.into_inner())
}

fn malformed(err: impl std::fmt::Display) -> TemplateError {
    TemplateError::Malformed(err.to_string())
}

/// Parts of the package that may carry `${NAME}` markers.
fn is_substitutable_part(name: &str) -> bool {
    name == "word/document.xml"
        || (name.starts_with("word/header") && name.ends_with(".xml"))
        || (name.starts_with("word/footer") && name.ends_with(".xml"))
}

/// Replace `${NAME}` markers in a single pass over the original text.
/// Markers appearing inside a substituted value are emitted literally, so
/// one placeholder's value can never trigger another substitution.
fn substitute(xml: &str, placeholders: &PlaceholderMap) -> String {
    let mut result = String::with_capacity(xml.len());
    let mut rest = xml;
    while let Some(start) = rest.find("${") {
        let Some(close) = rest[start..].find('}') else {
            break;
        };
        let marker_end = start + close + 1;
        let name = &rest[start + 2..start + close];
        match placeholders.get(name) {
            Some(value) => {
                result.push_str(&rest[..start]);
                result.push_str(&xml_escape(value));
            }
            // Unknown markers stay untouched.
            None => result.push_str(&rest[..marker_end]),
        }
        rest = &rest[marker_end..];
    }
    result.push_str(rest);
    result
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CellValue;
    use serde_json::json;

    fn sample_records() -> Vec<Record> {
        vec![
            Record::new().set("name", "Ann").set("age", 30i64),
            Record::new().set("name", "Bo").set("age", CellValue::Null),
        ]
    }

    /// Build a minimal DOCX-shaped package containing the given
    /// document.xml body text plus one binary part.
    fn template_with_body(body: &str) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(format!("<w:document><w:t>{body}</w:t></w:document>").as_bytes())
            .unwrap();
        zip.start_file("word/media/image1.png", options).unwrap();
        zip.write_all(&[0x89, 0x50, 0x4E, 0x47]).unwrap();
        zip.finish().unwrap().into_inner()
    }

    fn read_part(package: &[u8], name: &str) -> Vec<u8> {
        let mut archive = ZipArchive::new(Cursor::new(package)).unwrap();
        let mut entry = archive.by_name(name).unwrap();
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_render_table_text_lines() {
        let text = render_table_text(&sample_records());
        assert_eq!(text.lines().count(), 2);
        assert_eq!(text, "Ann \t 30\nBo \t -");
    }

    #[test]
    fn test_render_table_text_empty() {
        assert_eq!(render_table_text(&[]), "No data available");
    }

    #[test]
    fn test_placeholder_map_coercion() {
        let mut variables = HashMap::new();
        variables.insert("TITLE".to_string(), json!("Q1 Report"));
        variables.insert("COUNT".to_string(), json!(5));
        variables.insert("TAGS".to_string(), json!(["a", "b"]));

        let map = PlaceholderMap::build(&sample_records(), &variables);
        assert_eq!(map.get("TITLE"), Some("Q1 Report"));
        assert_eq!(map.get("COUNT"), Some("5"));
        assert_eq!(map.get("TAGS"), Some(r#"["a","b"]"#));
        assert_eq!(map.get("TABLE_DATA"), Some("Ann \t 30\nBo \t -"));
    }

    #[test]
    fn test_placeholder_keys_are_verbatim() {
        let mut map = PlaceholderMap::new();
        map.set(" Title ", "padded");
        assert_eq!(map.get(" Title "), Some("padded"));
        assert_eq!(map.get("Title"), None);
    }

    #[test]
    fn test_fill_substitutes_and_escapes() {
        let template = template_with_body("${TITLE} / ${TABLE_DATA}");
        let mut variables = HashMap::new();
        variables.insert("TITLE".to_string(), json!("Cats & Dogs"));
        let placeholders = PlaceholderMap::build(&sample_records(), &variables);

        let filled = fill(&template, &placeholders).unwrap();
        let document = String::from_utf8(read_part(&filled, "word/document.xml")).unwrap();
        assert!(document.contains("Cats &amp; Dogs"));
        assert!(document.contains("Ann \t 30"));
        assert!(!document.contains("${TITLE}"));
    }

    #[test]
    fn test_fill_leaves_unknown_placeholders_and_binary_parts() {
        let template = template_with_body("${UNKNOWN}");
        let placeholders = PlaceholderMap::build(&[], &HashMap::new());

        let filled = fill(&template, &placeholders).unwrap();
        let document = String::from_utf8(read_part(&filled, "word/document.xml")).unwrap();
        assert!(document.contains("${UNKNOWN}"));
        assert_eq!(
            read_part(&filled, "word/media/image1.png"),
            vec![0x89, 0x50, 0x4E, 0x47]
        );
    }

    #[test]
    fn test_marker_in_substituted_value_is_not_rescanned() {
        let template = template_with_body("${FIRST} ${SECOND}");
        let mut placeholders = PlaceholderMap::new();
        placeholders.set("FIRST", "${SECOND}");
        placeholders.set("SECOND", "two");

        let filled = fill(&template, &placeholders).unwrap();
        let document = String::from_utf8(read_part(&filled, "word/document.xml")).unwrap();
        // FIRST's value lands literally; only the template's own markers
        // are substituted.
        assert!(document.contains("${SECOND} two"));
    }

    #[test]
    fn test_unterminated_marker_is_left_alone() {
        let template = template_with_body("${OPEN");
        let mut placeholders = PlaceholderMap::new();
        placeholders.set("OPEN", "value");

        let filled = fill(&template, &placeholders).unwrap();
        let document = String::from_utf8(read_part(&filled, "word/document.xml")).unwrap();
        assert!(document.contains("${OPEN"));
    }

    #[test]
    fn test_fill_rejects_garbage() {
        let placeholders = PlaceholderMap::new();
        let err = fill(b"not a zip archive", &placeholders).unwrap_err();
        assert!(matches!(err, TemplateError::Malformed(_)));
    }
}
