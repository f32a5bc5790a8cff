use anyhow::{Context, Result};
use std::path::Path;
use word_export::{CellValue, Record};

/// A source of tabular records. The concrete adapter is chosen once at
/// startup; everything downstream only sees `Record`s.
pub trait RecordSource {
    fn read(&self, path: &Path) -> Result<Vec<Record>>;
}

/// CSV-backed record source. With `has_headers` the first row names the
/// columns; otherwise columns are numbered `column_1`, `column_2`, ...
pub struct CsvSource {
    has_headers: bool,
}

impl CsvSource {
    pub fn new(has_headers: bool) -> Self {
        Self { has_headers }
    }
}

impl RecordSource for CsvSource {
    fn read(&self, path: &Path) -> Result<Vec<Record>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(self.has_headers)
            .from_path(path)
            .with_context(|| format!("Cannot open CSV file: {}", path.display()))?;

        let headers: Vec<String> = if self.has_headers {
            reader
                .headers()
                .context("Failed to read CSV headers")?
                .iter()
                .map(String::from)
                .collect()
        } else {
            Vec::new()
        };

        let mut records = Vec::new();
        for result in reader.records() {
            let row = result.context("Failed to read CSV record")?;
            let mut record = Record::new();
            for (index, field) in row.iter().enumerate() {
                let column = headers
                    .get(index)
                    .cloned()
                    .unwrap_or_else(|| format!("column_{}", index + 1));
                let value = if field.is_empty() {
                    CellValue::Null
                } else {
                    CellValue::Text(field.to_string())
                };
                record = record.set(column, value);
            }
            records.push(record);
        }

        Ok(records)
    }
}
