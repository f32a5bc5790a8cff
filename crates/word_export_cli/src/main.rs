mod source;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use word_export::{DiskManager, ExportOptions, Exporter, TemplateConfig};

use crate::source::{CsvSource, RecordSource};

/// Export tabular CSV data to a Word (.docx) document.
#[derive(Debug, Parser)]
#[command(name = "word-export", version)]
struct Cli {
    /// CSV file to export
    input: PathBuf,

    /// TOML file with the template configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Root directory of the local storage disk
    #[arg(long, default_value = "storage")]
    storage_root: PathBuf,

    /// Output filename (default: timestamped)
    #[arg(long)]
    filename: Option<String>,

    /// Path of a custom DOCX template on the storage disk
    #[arg(long)]
    template: Option<String>,

    /// Placeholder variable for the custom template, KEY=VALUE (repeatable)
    #[arg(long = "var", value_parser = parse_var)]
    vars: Vec<(String, String)>,

    /// Treat the first CSV row as data rather than column names
    #[arg(long)]
    headerless: bool,

    /// Disable the document header
    #[arg(long)]
    without_header: bool,

    /// Disable the document footer
    #[arg(long)]
    without_footer: bool,

    /// Override the header text
    #[arg(long)]
    header_text: Option<String>,

    /// Override the footer text
    #[arg(long)]
    footer_text: Option<String>,
}

fn main() -> Result<()> {
    init_logging();
    run(Cli::parse())
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => TemplateConfig::default(),
    };

    let csv_source = CsvSource::new(!cli.headerless);
    let records = csv_source.read(&cli.input)?;

    let mut exporter = Exporter::new(config, DiskManager::local(cli.storage_root.clone()));
    if cli.without_header {
        exporter = exporter.without_header();
    }
    if cli.without_footer {
        exporter = exporter.without_footer();
    }
    if let Some(text) = cli.header_text {
        exporter = exporter.with_header_text(text);
    }
    if let Some(text) = cli.footer_text {
        exporter = exporter.with_footer_text(text);
    }

    let mut options = ExportOptions::new();
    if let Some(filename) = cli.filename {
        options = options.filename(filename);
    }
    if let Some(template) = cli.template {
        options = options.custom_template(template);
    }
    for (name, value) in cli.vars {
        options = options.variable(name, value);
    }

    let artifact = exporter.export(&records, &options)?;
    println!("{}", artifact.absolute_path.display());
    Ok(())
}

/// Parse a TOML config file into the nested template config tree.
fn load_config(path: &Path) -> Result<TemplateConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read config file: {}", path.display()))?;
    let value: toml::Value = toml::from_str(&contents)
        .with_context(|| format!("Invalid TOML in config file: {}", path.display()))?;
    let tree = serde_json::to_value(value).context("Cannot convert config to JSON tree")?;
    Ok(TemplateConfig::new(tree))
}

fn parse_var(input: &str) -> Result<(String, String), String> {
    input
        .split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got `{input}`"))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
