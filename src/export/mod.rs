//! Export of report tables to Excel, CSV, PDF and Word files.

mod document;

pub use document::{export_table_to_docx, export_table_to_pdf};

use crate::error::Result;
use crate::report::{Cell, TableData};
use chrono::Local;
use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook, XlsxError};
use std::path::{Path, PathBuf};

/// Supported export file types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Excel,
    Csv,
    Pdf,
    Docx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Excel => "xlsx",
            ExportFormat::Csv => "csv",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Docx => "docx",
        }
    }

    fn filter_name(&self) -> &'static str {
        match self {
            ExportFormat::Excel => "Excel Files",
            ExportFormat::Csv => "CSV Files",
            ExportFormat::Pdf => "PDF Files",
            ExportFormat::Docx => "Word Documents",
        }
    }
}

/// Write a table in the given format.
pub fn export_table(table: &TableData, path: &Path, format: ExportFormat) -> Result<()> {
    match format {
        ExportFormat::Excel => export_table_to_excel(table, path)?,
        ExportFormat::Csv => export_table_to_csv(table, path)?,
        ExportFormat::Pdf => export_table_to_pdf(table, path)?,
        ExportFormat::Docx => export_table_to_docx(table, path)?,
    }
    tracing::info!("Exported '{}' ({} rows) to {}", table.title, table.row_count(), path.display());
    Ok(())
}

/// Export a table to an Excel file.
///
/// One sheet named after the title, a styled header row, money as numbers,
/// autofilter over the data and the header row frozen.
pub fn export_table_to_excel(table: &TableData, path: &Path) -> std::result::Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    worksheet.set_name(sheet_name(&table.title))?;

    // Header format
    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0x4472C4))
        .set_font_color(Color::White)
        .set_border(FormatBorder::Thin);

    let money_format = Format::new().set_num_format("#,##0.00");

    for (col, header) in table.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, header, &header_format)?;
        worksheet.set_column_width(col as u16, column_width(table, col))?;
    }

    // Data rows
    for (idx, cells) in table.rows.iter().enumerate() {
        let row = (idx + 1) as u32;

        for (col, cell) in cells.iter().enumerate() {
            let col = col as u16;
            match cell {
                // Blank cells are left unwritten
                Cell::Text(s) if s.is_empty() => {}
                Cell::Text(s) => {
                    worksheet.write_string(row, col, s)?;
                }
                Cell::Number(n) => {
                    worksheet.write_number_with_format(row, col, *n, &money_format)?;
                }
                Cell::Integer(n) => {
                    worksheet.write_number(row, col, *n as f64)?;
                }
            }
        }
    }

    // Autofilter
    if !table.rows.is_empty() && !table.headers.is_empty() {
        let last_row = table.rows.len() as u32;
        let last_col = (table.headers.len() - 1) as u16;
        worksheet.autofilter(0, 0, last_row, last_col)?;
    }

    // Freeze top row
    worksheet.set_freeze_panes(1, 0)?;

    workbook.save(path)?;
    Ok(())
}

/// Export a table to a CSV file: header line, then one record per row.
pub fn export_table_to_csv(table: &TableData, path: &Path) -> std::result::Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(Cell::as_text))?;
    }

    writer.flush()?;
    Ok(())
}

/// Open save file dialog in the export folder and return selected path.
pub fn show_save_dialog(directory: &Path, default_name: &str, format: ExportFormat) -> Option<PathBuf> {
    let mut dialog = rfd::FileDialog::new()
        .set_file_name(default_name)
        .add_filter(format.filter_name(), &[format.extension()]);
    if std::fs::create_dir_all(directory).is_ok() {
        dialog = dialog.set_directory(directory);
    }
    dialog.save_file()
}

/// Generate default filename for export.
pub fn generate_export_filename(prefix: &str, extension: &str) -> String {
    let now = Local::now();
    format!("{prefix}_{ts}.{extension}", ts = now.format("%Y%m%d_%H%M%S"))
}

/// Excel sheet names: at most 31 characters, none of `[]:*?/\`.
fn sheet_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '-' } else { c })
        .take(31)
        .collect();
    let cleaned = cleaned.trim().trim_matches('\'').to_string();
    if cleaned.is_empty() { "Report".to_string() } else { cleaned }
}

fn column_width(table: &TableData, col: usize) -> f64 {
    let widest = table
        .rows
        .iter()
        .filter_map(|row| row.get(col))
        .map(|cell| cell.as_text().chars().count())
        .chain(std::iter::once(table.headers[col].chars().count()))
        .max()
        .unwrap_or(10);
    (widest + 2).clamp(8, 50) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::document::{page_ranges, text_rows};
    use calamine::{Data, Reader, Xlsx, open_workbook};
    use std::io::Read;

    fn sample_table() -> TableData {
        let mut table = TableData::new(
            "Liquidation summary 2025-03-01 to 2025-03-31",
            &["Diet", "Requester", "Spent", "Days"],
        );
        table.push_row(vec![
            Cell::text("D-000001"),
            Cell::text("Ana, Pérez"),
            Cell::Number(45.5),
            Cell::Integer(2),
        ]);
        table.push_row(vec![Cell::text("D-000002"), Cell::empty(), Cell::Number(70.0), Cell::Integer(0)]);
        table.push_row(vec![Cell::text("Total"), Cell::empty(), Cell::Number(115.5)]);
        table
    }

    #[test]
    fn test_excel_matches_table_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.xlsx");
        let table = sample_table();

        export_table_to_excel(&table, &path).unwrap();

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        let sheet = workbook.sheet_names()[0].clone();
        assert!(sheet.starts_with("Liquidation summary"));
        assert!(sheet.chars().count() <= 31);
        let range = workbook.worksheet_range(&sheet).unwrap();

        assert_eq!(range.get_size(), (table.row_count() + 1, table.column_count()));
        assert_eq!(range.get_value((0, 0)), Some(&Data::String("Diet".to_string())));
        assert_eq!(range.get_value((1, 2)), Some(&Data::Float(45.5)));
        assert_eq!(range.get_value((3, 0)), Some(&Data::String("Total".to_string())));
    }

    #[test]
    fn test_excel_empty_table_has_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.xlsx");
        let table = TableData::new("Pending", &["Number", "Amount"]);

        export_table_to_excel(&table, &path).unwrap();

        let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
        let range = workbook.worksheet_range("Pending").unwrap();
        assert_eq!(range.get_size(), (1, 2));
    }

    #[test]
    fn test_csv_matches_table_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        let table = sample_table();

        export_table_to_csv(&table, &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.headers().unwrap().len(), table.column_count());

        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), table.row_count());
        assert!(records.iter().all(|r| r.len() == table.column_count()));
        assert_eq!(&records[0][1], "Ana, Pérez");
        assert_eq!(&records[0][2], "45.50");
        assert_eq!(&records[2][3], "");
    }

    #[test]
    fn test_export_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let table = sample_table();

        for format in [ExportFormat::Excel, ExportFormat::Csv, ExportFormat::Pdf, ExportFormat::Docx] {
            let path = dir.path().join(format!("out.{}", format.extension()));
            export_table(&table, &path, format).unwrap();
            assert!(path.is_file());
        }
    }

    /// Opening tags `<name>` or `<name ...>` in an XML part.
    fn count_tags(xml: &str, name: &str) -> usize {
        xml.matches(&format!("<{name}>")).count() + xml.matches(&format!("<{name} ")).count()
    }

    #[test]
    fn test_docx_matches_table_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.docx");
        let table = sample_table();

        export_table_to_docx(&table, &path).unwrap();

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();

        let lines = table.row_count() + 1;
        assert_eq!(count_tags(&xml, "w:tr"), lines);
        assert_eq!(count_tags(&xml, "w:tc"), lines * table.column_count());
        assert!(xml.contains("Ana, Pérez"));
        assert!(xml.contains("115.50"));
    }

    #[test]
    fn test_pdf_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.pdf");

        export_table_to_pdf(&sample_table(), &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn test_pdf_long_table_spans_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.pdf");
        let mut table = TableData::new("Diet register", &["Diet", "Amount"]);
        for i in 0..100 {
            table.push_row(vec![Cell::text(format!("D-{i:06}")), Cell::Number(i as f64)]);
        }

        export_table_to_pdf(&table, &path).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn test_document_rows_match_table_shape() {
        let table = sample_table();
        let rows = text_rows(&table);

        assert_eq!(rows.len(), table.row_count());
        assert!(rows.iter().all(|r| r.len() == table.column_count()));
        assert_eq!(rows[2], vec!["Total", "", "115.50", ""]);
    }

    #[test]
    fn test_pages_cover_every_row_once() {
        let pages = page_ranges(70, 34);
        assert_eq!(pages, vec![0..34, 34..68, 68..70]);
        assert_eq!(pages.iter().map(|r| r.len()).sum::<usize>(), 70);

        assert_eq!(page_ranges(34, 34), vec![0..34]);
        // Empty tables still print the header
        assert_eq!(page_ranges(0, 34), vec![0..0]);
    }

    #[test]
    fn test_sheet_name_sanitized() {
        assert_eq!(sheet_name("Cards [2025/03]"), "Cards -2025-03-");
        assert_eq!(sheet_name("   "), "Report");
    }

    #[test]
    fn test_generate_export_filename() {
        let name = generate_export_filename("card_statement", "csv");
        assert!(name.starts_with("card_statement_"));
        assert!(name.ends_with(".csv"));
    }
}
