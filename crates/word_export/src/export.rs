use anyhow::{anyhow, Result};
use chrono::Local;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::TemplateConfig;
use crate::layout;
use crate::record::Record;
use crate::storage::{DiskManager, Storage};
use crate::template::{self, PlaceholderMap, TemplateError};
use crate::writer::{DocumentWriter, DocxWriter};

/// Logical prefix under which export files are stored.
const EXPORT_DIR: &str = "exports";

/// Per-call export options. Built with consuming-builder methods; the
/// finished value is immutable for the duration of the export.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    filename: Option<String>,
    custom_template_path: Option<String>,
    custom_template_variables: HashMap<String, Value>,
}

impl ExportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output filename, used verbatim. When unset a timestamped name is
    /// generated.
    pub fn filename(self, filename: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
            ..self
        }
    }

    /// Path (on the configured storage disk) of a DOCX template to fill
    /// instead of assembling a document from scratch.
    pub fn custom_template(self, path: impl Into<String>) -> Self {
        Self {
            custom_template_path: Some(path.into()),
            ..self
        }
    }

    /// Placeholder variables substituted into the custom template.
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom_template_variables
            .insert(name.into(), value.into());
        self
    }

    pub fn variables(mut self, variables: HashMap<String, Value>) -> Self {
        self.custom_template_variables.extend(variables);
        self
    }

    /// The same options with the custom template stripped; used for the
    /// fallback path.
    fn without_template(&self) -> Self {
        Self {
            filename: self.filename.clone(),
            custom_template_path: None,
            custom_template_variables: HashMap::new(),
        }
    }
}

/// Where an export landed. The file is transient: the caller is expected
/// to deliver it and delete it afterwards.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    /// Name of the storage disk the file was written to.
    pub disk: String,
    /// Path relative to the disk root, e.g. `exports/report.docx`.
    pub path: String,
    /// Absolute filesystem location for delivery.
    pub absolute_path: PathBuf,
    pub filename: String,
}

/// Top-level export entry point: selects between from-scratch assembly and
/// custom-template filling, names the artifact, and persists it.
pub struct Exporter {
    config: TemplateConfig,
    disks: DiskManager,
    writer: Box<dyn DocumentWriter>,
}

impl Exporter {
    pub fn new(config: TemplateConfig, disks: DiskManager) -> Self {
        Self {
            config,
            disks,
            writer: Box::new(DocxWriter::new()),
        }
    }

    /// Swap the document writer, mainly for tests and alternative OOXML
    /// backends.
    pub fn with_writer(mut self, writer: Box<dyn DocumentWriter>) -> Self {
        self.writer = writer;
        self
    }

    /// Layer a flat map of dotted-key overrides onto the template config.
    pub fn with_template_overrides(mut self, overrides: HashMap<String, Value>) -> Self {
        self.config = self.config.with_overrides(overrides);
        self
    }

    pub fn without_header(mut self) -> Self {
        self.config = self.config.with_override("header.enabled", false);
        self
    }

    pub fn without_footer(mut self) -> Self {
        self.config = self.config.with_override("footer.enabled", false);
        self
    }

    pub fn with_header_text(mut self, text: impl Into<String>) -> Self {
        self.config = self.config.with_override("header.text", text.into());
        self
    }

    pub fn with_footer_text(mut self, text: impl Into<String>) -> Self {
        self.config = self.config.with_override("footer.text", text.into());
        self
    }

    /// Run an export and persist the resulting document.
    ///
    /// A custom template that is missing or malformed falls back to the
    /// from-scratch path with the template option stripped -- at most one
    /// retry. Storage and writer failures are fatal and propagate.
    pub fn export(&self, records: &[Record], options: &ExportOptions) -> Result<ExportArtifact> {
        let disk_name = self.config.get_str_or("storage_disk", "local");
        let disk = self
            .disks
            .disk(&disk_name)
            .ok_or_else(|| anyhow!("Unknown storage disk: {disk_name}"))?;

        let bytes = match &options.custom_template_path {
            Some(template_path) => {
                match self.fill_custom_template(disk, template_path, records, options) {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        warn!("Custom template unusable, falling back to default assembly: {err}");
                        return self.export(records, &options.without_template());
                    }
                }
            }
            None => self.render_from_scratch(records, disk)?,
        };

        let filename = options
            .filename
            .clone()
            .unwrap_or_else(default_filename);
        let path = format!("{EXPORT_DIR}/{filename}");

        disk.make_directory(EXPORT_DIR)?;
        disk.put(&path, &bytes)?;
        info!("Export written to {path} on disk {disk_name}");

        Ok(ExportArtifact {
            disk: disk_name,
            absolute_path: disk.absolute_path(&path),
            path,
            filename,
        })
    }

    fn render_from_scratch(&self, records: &[Record], disk: &dyn Storage) -> Result<Vec<u8>> {
        let plan = layout::assemble(&self.config, records, disk);
        debug!("Assembled layout plan for {} records", records.len());
        self.writer.render(&plan)
    }

    fn fill_custom_template(
        &self,
        disk: &dyn Storage,
        template_path: &str,
        records: &[Record],
        options: &ExportOptions,
    ) -> Result<Vec<u8>, TemplateError> {
        if !disk.exists(template_path) {
            return Err(TemplateError::NotFound(template_path.to_string()));
        }
        let template = disk
            .read(template_path)
            .map_err(|e| TemplateError::Malformed(e.to_string()))?;

        let placeholders = PlaceholderMap::build(records, &options.custom_template_variables);
        template::fill(&template, &placeholders)
    }
}

/// Timestamped default filename. Two exports within the same clock second
/// can collide; callers needing uniqueness supply their own filename.
fn default_filename() -> String {
    format!(
        "filament-export-{}.docx",
        Local::now().format("%Y%m%d_%H%M%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CellValue;
    use crate::storage::LocalDisk;
    use crate::template::TABLE_DATA_KEY;
    use serde_json::json;
    use std::io::Read;

    fn sample_records() -> Vec<Record> {
        vec![
            Record::new().set("name", "Ann").set("age", 30i64),
            Record::new().set("name", "Bo").set("age", CellValue::Null),
        ]
    }

    fn exporter_on(dir: &std::path::Path) -> Exporter {
        Exporter::new(TemplateConfig::default(), DiskManager::local(dir))
    }

    fn read_document_xml(artifact: &ExportArtifact) -> String {
        let bytes = std::fs::read(&artifact.absolute_path).unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let mut entry = archive.by_name("word/document.xml").unwrap();
        let mut xml = String::new();
        entry.read_to_string(&mut xml).unwrap();
        xml
    }

    #[test]
    fn test_export_writes_docx_under_exports_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = exporter_on(dir.path())
            .export(&sample_records(), &ExportOptions::new())
            .unwrap();

        assert!(artifact.path.starts_with("exports/"));
        assert!(artifact.filename.starts_with("filament-export-"));
        assert!(artifact.filename.ends_with(".docx"));
        let bytes = std::fs::read(&artifact.absolute_path).unwrap();
        assert_eq!(&bytes[0..2], b"PK");
    }

    #[test]
    fn test_export_honors_caller_filename() {
        let dir = tempfile::tempdir().unwrap();
        let options = ExportOptions::new().filename("people.docx");
        let artifact = exporter_on(dir.path())
            .export(&sample_records(), &options)
            .unwrap();

        assert_eq!(artifact.filename, "people.docx");
        assert_eq!(artifact.path, "exports/people.docx");
        assert_eq!(artifact.disk, "local");
    }

    #[test]
    fn test_missing_template_falls_back_to_default_assembly() {
        let dir = tempfile::tempdir().unwrap();
        let options = ExportOptions::new()
            .custom_template("templates/absent.docx")
            .filename("fallback.docx");
        let artifact = exporter_on(dir.path())
            .export(&sample_records(), &options)
            .unwrap();

        // Fallback produced a normal table-bodied document, not an error.
        let xml = read_document_xml(&artifact);
        assert!(xml.contains("Ann"));
        assert!(xml.contains("Bo"));
    }

    #[test]
    fn test_malformed_template_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let disk = LocalDisk::new(dir.path());
        disk.put("templates/broken.docx", b"definitely not a zip")
            .unwrap();

        let options = ExportOptions::new().custom_template("templates/broken.docx");
        let artifact = exporter_on(dir.path())
            .export(&sample_records(), &options)
            .unwrap();
        let bytes = std::fs::read(&artifact.absolute_path).unwrap();
        assert_eq!(&bytes[0..2], b"PK");
    }

    #[test]
    fn test_valid_template_is_filled() {
        let dir = tempfile::tempdir().unwrap();
        let disk = LocalDisk::new(dir.path());

        // Generate a template through the writer itself, with placeholder
        // markers in the body text.
        let template_exporter = exporter_on(dir.path()).with_header_text("${TITLE}");
        let seed = vec![Record::new().set("body", format!("${{{TABLE_DATA_KEY}}}"))];
        let template = template_exporter
            .export(&seed, &ExportOptions::new().filename("template.docx"))
            .unwrap();
        let template_bytes = std::fs::read(&template.absolute_path).unwrap();
        disk.put("templates/report.docx", &template_bytes).unwrap();

        let options = ExportOptions::new()
            .custom_template("templates/report.docx")
            .variable("TITLE", json!("Q1 Report"))
            .variable("COUNT", json!(5))
            .filename("filled.docx");
        let artifact = exporter_on(dir.path())
            .export(&sample_records(), &options)
            .unwrap();

        let xml = read_document_xml(&artifact);
        assert!(xml.contains("Ann \t 30"));
        assert!(!xml.contains("${TABLE_DATA}"));
    }

    #[test]
    fn test_unknown_disk_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = Exporter::new(
            TemplateConfig::default().with_override("storage_disk", "s3"),
            DiskManager::local(dir.path()),
        );
        let err = exporter
            .export(&sample_records(), &ExportOptions::new())
            .unwrap_err();
        assert!(err.to_string().contains("Unknown storage disk"));
    }

    #[test]
    fn test_convenience_toggles_layer_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = exporter_on(dir.path())
            .without_footer()
            .with_header_text("Acme");
        let artifact = exporter
            .export(&[], &ExportOptions::new().filename("empty.docx"))
            .unwrap();

        let xml = read_document_xml(&artifact);
        assert!(xml.contains("No data to export."));

        // The header override shows up in a header part of the package.
        let bytes = std::fs::read(&artifact.absolute_path).unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        let mut found = false;
        for name in names {
            if name.starts_with("word/header") && name.ends_with(".xml") {
                let mut entry = archive.by_name(&name).unwrap();
                let mut xml = String::new();
                entry.read_to_string(&mut xml).unwrap();
                found = found || xml.contains("Acme");
            }
        }
        assert!(found);
    }

    #[test]
    fn test_default_filename_pattern() {
        let name = default_filename();
        assert!(name.starts_with("filament-export-"));
        assert!(name.ends_with(".docx"));
        // filament-export-YYYYMMDD_HHMMSS.docx
        assert_eq!(name.len(), "filament-export-".len() + 15 + ".docx".len());
    }
}
