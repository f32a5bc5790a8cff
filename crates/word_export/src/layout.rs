use std::path::PathBuf;
use tracing::debug;

use crate::config::TemplateConfig;
use crate::record::Record;
use crate::storage::Storage;
use crate::style::{px_to_twip, Alignment, TextStyle};

/// Default page-number field format. `{PAGE}` and `{NUMPAGES}` are dynamic
/// field markers resolved by the document writer.
pub const DEFAULT_PAGE_NUMBER_FORMAT: &str = "Page {PAGE} of {NUMPAGES}";

/// Body text used when there are no records to export.
pub const EMPTY_BODY_TEXT: &str = "No data to export.";

const DEFAULT_LOGO_WIDTH_PX: u64 = 100;
const DEFAULT_LOGO_HEIGHT_PX: u64 = 50;

const CELL_WIDTH_DXA: u32 = 2000;
const BORDER_SIZE: u32 = 6;
const BORDER_COLOR: &str = "999999";
const CELL_MARGIN_DXA: u32 = 80;

/// A styled, aligned run of text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub text: String,
    pub style: TextStyle,
    pub alignment: Alignment,
}

/// Image placed in the header, sized in twips.
#[derive(Debug, Clone, PartialEq)]
pub struct LogoSpec {
    pub source: PathBuf,
    pub width_twip: u32,
    pub height_twip: u32,
    pub alignment: Alignment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderSpec {
    pub logo: Option<LogoSpec>,
    pub text: Option<TextBlock>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageNumberSpec {
    pub format: String,
    pub alignment: Alignment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FooterSpec {
    pub text: Option<TextBlock>,
    pub page_numbers: Option<PageNumberSpec>,
}

/// Bordered data table: one row per record, cells already rendered to
/// strings (nulls as `-`).
#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    pub rows: Vec<Vec<String>>,
    pub cell_width: u32,
    pub border_size: u32,
    pub border_color: String,
    pub cell_margin: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BodySpec {
    Empty { text: String },
    Table(TableSpec),
}

/// Writer-agnostic description of the document to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutPlan {
    pub header: Option<HeaderSpec>,
    pub footer: Option<FooterSpec>,
    pub body: BodySpec,
}

/// Build the layout plan for a set of records under the given config.
///
/// Pure apart from storage existence checks for the header logo; calling
/// twice with identical inputs yields a structurally identical plan.
pub fn assemble(config: &TemplateConfig, records: &[Record], storage: &dyn Storage) -> LayoutPlan {
    LayoutPlan {
        header: assemble_header(config, storage),
        footer: assemble_footer(config),
        body: assemble_body(records),
    }
}

fn assemble_header(config: &TemplateConfig, storage: &dyn Storage) -> Option<HeaderSpec> {
    if !config.get_bool("header.enabled", true) {
        return None;
    }

    let logo = if config.get_bool("header.logo.enabled", false) {
        assemble_logo(config, storage)
    } else {
        None
    };

    let text = config
        .get_str("header.text")
        .filter(|t| !t.is_empty())
        .map(|t| TextBlock {
            text: t.to_string(),
            style: TextStyle::from_value(config.get("header.style")),
            alignment: config
                .get_str("header.style.alignment")
                .map(Alignment::from_name)
                .unwrap_or(Alignment::Center),
        });

    Some(HeaderSpec { logo, text })
}

fn assemble_logo(config: &TemplateConfig, storage: &dyn Storage) -> Option<LogoSpec> {
    let path = config.get_str("header.logo.path").filter(|p| !p.is_empty())?;
    if !storage.exists(path) {
        // Missing logo file is not an error; the header just goes without.
        debug!("Header logo not found on disk, skipping: {path}");
        return None;
    }

    Some(LogoSpec {
        source: storage.absolute_path(path),
        width_twip: px_to_twip(logo_px(config, "header.logo.width", DEFAULT_LOGO_WIDTH_PX)),
        height_twip: px_to_twip(logo_px(config, "header.logo.height", DEFAULT_LOGO_HEIGHT_PX)),
        alignment: config
            .get_str("header.logo.alignment")
            .map(Alignment::from_name)
            .unwrap_or(Alignment::Left),
    })
}

/// Configured logo dimension in pixels, clamped rather than truncated when
/// it exceeds `u32`.
fn logo_px(config: &TemplateConfig, path: &str, default: u64) -> u32 {
    u32::try_from(config.get_u64(path, default)).unwrap_or(u32::MAX)
}

fn assemble_footer(config: &TemplateConfig) -> Option<FooterSpec> {
    if !config.get_bool("footer.enabled", true) {
        return None;
    }

    let text = config
        .get_str("footer.text")
        .filter(|t| !t.is_empty())
        .map(|t| TextBlock {
            text: t.to_string(),
            style: TextStyle::from_value(config.get("footer.style")),
            alignment: config
                .get_str("footer.style.alignment")
                .map(Alignment::from_name)
                .unwrap_or(Alignment::Center),
        });

    let page_numbers = config
        .get_bool("footer.show_page_numbers", false)
        .then(|| PageNumberSpec {
            format: config.get_str_or("footer.page_number_format", DEFAULT_PAGE_NUMBER_FORMAT),
            alignment: config
                .get_str("footer.page_number_alignment")
                .map(Alignment::from_name)
                .unwrap_or(Alignment::Right),
        });

    Some(FooterSpec { text, page_numbers })
}

fn assemble_body(records: &[Record]) -> BodySpec {
    if records.is_empty() {
        return BodySpec::Empty {
            text: EMPTY_BODY_TEXT.to_string(),
        };
    }

    let rows = records
        .iter()
        .map(|record| record.values().map(|v| v.render()).collect())
        .collect();

    BodySpec::Table(TableSpec {
        rows,
        cell_width: CELL_WIDTH_DXA,
        border_size: BORDER_SIZE,
        border_color: BORDER_COLOR.to_string(),
        cell_margin: CELL_MARGIN_DXA,
    })
}
