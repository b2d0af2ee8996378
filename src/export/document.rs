//! PDF and Word renditions of report tables.

use std::fs::File;
use std::io::BufWriter;
use std::iter;
use std::ops::Range;
use std::path::Path;

use docx_rs::{AlignmentType, Docx, Paragraph, Run, Table, TableCell, TableRow};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};

use crate::error::{AppError, Result};
use crate::report::{Cell, TableData};

// A4 landscape, millimetres
const PAGE_WIDTH: f32 = 297.0;
const PAGE_HEIGHT: f32 = 210.0;
const MARGIN: f32 = 15.0;
const LINE_HEIGHT: f32 = 5.0;
const TITLE_SIZE: f32 = 13.0;
const FONT_SIZE: f32 = 8.0;
/// Average Helvetica glyph width at `FONT_SIZE`.
const CHAR_WIDTH: f32 = 1.6;

/// Export a table to a PDF file: title, then the header repeated on every page.
pub fn export_table_to_pdf(table: &TableData, path: &Path) -> Result<()> {
    let rows = text_rows(table);
    let widths = column_widths(table, &rows);

    let (doc, first_page, first_layer) = PdfDocument::new(&table.title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Table");
    let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_error)?;

    let pages = page_ranges(rows.len(), rows_per_page());
    let page_count = pages.len();

    for (index, range) in pages.into_iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Table");
            doc.get_page(page).get_layer(layer)
        };

        let title = if page_count > 1 {
            format!("{} ({}/{})", table.title, index + 1, page_count)
        } else {
            table.title.clone()
        };

        let mut y = PAGE_HEIGHT - MARGIN;
        layer.use_text(title, TITLE_SIZE, Mm(MARGIN), Mm(y), &bold);
        y -= 2.0 * LINE_HEIGHT;
        write_line(&layer, &table.headers, &widths, y, &bold);

        for row in &rows[range] {
            y -= LINE_HEIGHT;
            write_line(&layer, row, &widths, y, &font);
        }
    }

    doc.save(&mut BufWriter::new(File::create(path)?)).map_err(pdf_error)?;
    Ok(())
}

/// Export a table to a Word document: a bold title paragraph and one table.
pub fn export_table_to_docx(table: &TableData, path: &Path) -> Result<()> {
    let rows = text_rows(table);

    let mut table_rows = Vec::with_capacity(rows.len() + 1);
    table_rows.push(TableRow::new(
        table.headers.iter().map(|h| text_cell(h, true, false)).collect(),
    ));
    for (texts, cells) in rows.iter().zip(&table.rows) {
        let row = texts
            .iter()
            .enumerate()
            .map(|(col, text)| text_cell(text, false, cells.get(col).is_some_and(Cell::is_numeric)))
            .collect();
        table_rows.push(TableRow::new(row));
    }

    let file = File::create(path)?;
    Docx::new()
        .add_paragraph(Paragraph::new().add_run(Run::new().add_text(table.title.as_str()).bold().size(28)))
        .add_table(Table::new(table_rows))
        .build()
        .pack(file)
        .map_err(|e| AppError::document(format!("Word document: {e}")))?;
    Ok(())
}

/// Cell texts for every row, padded to the header width.
pub(super) fn text_rows(table: &TableData) -> Vec<Vec<String>> {
    let columns = table.column_count();
    table
        .rows
        .iter()
        .map(|row| {
            (0..columns)
                .map(|col| row.get(col).map(Cell::as_text).unwrap_or_default())
                .collect()
        })
        .collect()
}

/// Data rows that fit below the title and header of one page.
fn rows_per_page() -> usize {
    ((PAGE_HEIGHT - 2.0 * MARGIN - 2.0 * LINE_HEIGHT) / LINE_HEIGHT) as usize
}

/// Row ranges per page. An empty table still gets one page with its header.
pub(super) fn page_ranges(row_count: usize, per_page: usize) -> Vec<Range<usize>> {
    if row_count == 0 || per_page == 0 {
        return vec![0..0];
    }
    (0..row_count)
        .step_by(per_page)
        .map(|start| start..(start + per_page).min(row_count))
        .collect()
}

/// Column widths proportional to the longest text, filling the printable width.
fn column_widths(table: &TableData, rows: &[Vec<String>]) -> Vec<f32> {
    let chars: Vec<f32> = table
        .headers
        .iter()
        .enumerate()
        .map(|(col, header)| {
            rows.iter()
                .map(|row| row[col].chars().count())
                .chain(iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
                .max(4) as f32
        })
        .collect();

    let total: f32 = chars.iter().sum();
    let usable = PAGE_WIDTH - 2.0 * MARGIN;
    chars.iter().map(|c| c / total * usable).collect()
}

fn write_line(layer: &PdfLayerReference, texts: &[String], widths: &[f32], y: f32, font: &IndirectFontRef) {
    let mut x = MARGIN;
    for (text, width) in texts.iter().zip(widths) {
        layer.use_text(fit(text, *width), FONT_SIZE, Mm(x), Mm(y), font);
        x += width;
    }
}

/// Cut text that would run into the next column.
fn fit(text: &str, width: f32) -> String {
    let max_chars = ((width / CHAR_WIDTH) as usize).saturating_sub(1);
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

fn text_cell(text: &str, bold: bool, numeric: bool) -> TableCell {
    let mut run = Run::new().add_text(text);
    if bold {
        run = run.bold();
    }
    let mut paragraph = Paragraph::new().add_run(run);
    if numeric {
        paragraph = paragraph.align(AlignmentType::Right);
    }
    TableCell::new().add_paragraph(paragraph)
}

fn pdf_error(e: impl std::fmt::Debug) -> AppError {
    AppError::document(format!("PDF: {e:?}"))
}
