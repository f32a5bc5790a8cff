use anyhow::{Context, Result};
use docx_rs::*;
use std::io::Cursor;

use crate::layout::{BodySpec, FooterSpec, HeaderSpec, LayoutPlan, PageNumberSpec, TableSpec, TextBlock};
use crate::style::Alignment;

const EMU_PER_TWIP: u32 = 635;

/// Serializes a layout plan to document bytes. Failures here are fatal to
/// the export; there is no fallback past this boundary.
pub trait DocumentWriter: Send + Sync {
    fn render(&self, plan: &LayoutPlan) -> Result<Vec<u8>>;
}

/// OOXML Word writer backed by `docx-rs`.
#[derive(Debug, Default)]
pub struct DocxWriter;

impl DocxWriter {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentWriter for DocxWriter {
    fn render(&self, plan: &LayoutPlan) -> Result<Vec<u8>> {
        let mut docx = Docx::new();

        if let Some(spec) = &plan.header {
            docx = docx.header(build_header(spec)?);
        }
        if let Some(spec) = &plan.footer {
            docx = docx.footer(build_footer(spec));
        }

        match &plan.body {
            BodySpec::Empty { text } => {
                docx = docx.add_paragraph(
                    Paragraph::new().add_run(Run::new().add_text(text.as_str())),
                );
            }
            BodySpec::Table(table) => {
                docx = docx.add_table(build_table(table));
            }
        }

        let mut buf = Cursor::new(Vec::new());
        docx.build()
            .pack(&mut buf)
            .map_err(|e| anyhow::anyhow!("Failed to pack DOCX: {}", e))?;

        Ok(buf.into_inner())
    }
}

fn build_header(spec: &HeaderSpec) -> Result<Header> {
    let mut header = Header::new();

    if let Some(logo) = &spec.logo {
        let bytes = std::fs::read(&logo.source)
            .with_context(|| format!("Cannot read logo image: {}", logo.source.display()))?;
        let pic = Pic::new(&bytes).size(
            logo.width_twip.saturating_mul(EMU_PER_TWIP),
            logo.height_twip.saturating_mul(EMU_PER_TWIP),
        );
        header = header.add_paragraph(
            Paragraph::new()
                .add_run(Run::new().add_image(pic))
                .align(alignment_type(logo.alignment)),
        );
    }

    if let Some(block) = &spec.text {
        header = header.add_paragraph(text_paragraph(block));
    }

    Ok(header)
}

fn build_footer(spec: &FooterSpec) -> Footer {
    let mut footer = Footer::new();

    if let Some(block) = &spec.text {
        footer = footer.add_paragraph(text_paragraph(block));
    }
    if let Some(page_numbers) = &spec.page_numbers {
        footer = footer.add_paragraph(page_number_paragraph(page_numbers));
    }

    footer
}

fn build_table(spec: &TableSpec) -> Table {
    let rows = spec
        .rows
        .iter()
        .map(|row| {
            let cells: Vec<TableCell> = row
                .iter()
                .map(|value| {
                    TableCell::new()
                        .width(spec.cell_width as usize, WidthType::Dxa)
                        .add_paragraph(
                            Paragraph::new().add_run(Run::new().add_text(value.as_str())),
                        )
                })
                .collect();
            TableRow::new(cells)
        })
        .collect();

    let mut borders = TableBorders::new();
    for position in [
        TableBorderPosition::Top,
        TableBorderPosition::Bottom,
        TableBorderPosition::Left,
        TableBorderPosition::Right,
        TableBorderPosition::InsideH,
        TableBorderPosition::InsideV,
    ] {
        borders = borders.set(
            TableBorder::new(position)
                .size(spec.border_size as usize)
                .color(spec.border_color.as_str()),
        );
    }

    let margin = spec.cell_margin as usize;
    Table::new(rows)
        .set_borders(borders)
        .margins(TableCellMargins::new().margin(margin, margin, margin, margin))
}

fn text_paragraph(block: &TextBlock) -> Paragraph {
    let mut run = Run::new().add_text(block.text.as_str());
    if let Some(size) = block.style.size {
        // Config sizes are points; run sizes are half-points, so 14pt = 28.
        run = run.size((size * 2) as usize);
    }
    if let Some(color) = &block.style.color {
        run = run.color(color.as_str());
    }
    if block.style.bold {
        run = run.bold();
    }
    if block.style.italic {
        run = run.italic();
    }
    Paragraph::new()
        .add_run(run)
        .align(alignment_type(block.alignment))
}

/// Render a page-number format string as literal runs interleaved with
/// PAGE / NUMPAGES field characters, which the consuming application
/// resolves at display time.
fn page_number_paragraph(spec: &PageNumberSpec) -> Paragraph {
    let mut paragraph = Paragraph::new().align(alignment_type(spec.alignment));
    for segment in field_segments(&spec.format) {
        paragraph = match segment {
            Segment::Literal(text) => paragraph.add_run(Run::new().add_text(text)),
            Segment::Field(instruction) => paragraph
                .add_run(Run::new().add_field_char(FieldCharType::Begin, false))
                .add_run(Run::new().add_instr_text(InstrText::Unsupported(instruction.to_string())))
                .add_run(Run::new().add_field_char(FieldCharType::End, false)),
        };
    }
    paragraph
}

#[derive(Debug, PartialEq)]
enum Segment {
    Literal(String),
    Field(&'static str),
}

fn field_segments(format: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = format;
    loop {
        let page = rest.find("{PAGE}");
        let numpages = rest.find("{NUMPAGES}");
        let (index, marker, instruction) = match (page, numpages) {
            (Some(p), Some(n)) if p <= n => (p, "{PAGE}", "PAGE"),
            (Some(p), None) => (p, "{PAGE}", "PAGE"),
            (_, Some(n)) => (n, "{NUMPAGES}", "NUMPAGES"),
            (None, None) => break,
        };
        if index > 0 {
            segments.push(Segment::Literal(rest[..index].to_string()));
        }
        segments.push(Segment::Field(instruction));
        rest = &rest[index + marker.len()..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest.to_string()));
    }
    segments
}

fn alignment_type(alignment: Alignment) -> AlignmentType {
    match alignment {
        Alignment::Left => AlignmentType::Left,
        Alignment::Center => AlignmentType::Center,
        Alignment::Right => AlignmentType::Right,
    }
}
