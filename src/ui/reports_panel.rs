//! Reports panel with filters, table preview and Excel/CSV export.

use chrono::{Datelike, Local, Months};
use eframe::egui::{self, Align, Layout, RichText, ScrollArea, Ui};
use egui_phosphor::regular::{FILE_CSV, FILE_DOC, FILE_PDF, FILE_XLS, MAGNIFYING_GLASS};

use super::app::App;
use super::components::{
    back_button, colors, date_picker, panel_header, primary_button_with_icon, styled_button, styled_button_with_icon,
};
use crate::export::ExportFormat;
use crate::report::{ReportKind, TableData};

/// Show the reports panel.
///
/// Returns `true` if the back button was clicked.
pub fn show(app: &mut App, ui: &mut Ui) -> bool {
    let go_back = back_button(ui);

    panel_header(ui, "Reports");

    // Report kind
    ui.horizontal_wrapped(|ui| {
        ui.label("Report:");
        ui.add_space(10.0);

        for kind in ReportKind::ALL {
            if ui
                .selectable_label(app.report_filter.kind == kind, kind.label())
                .clicked()
                && app.report_filter.kind != kind
            {
                app.report_filter.kind = kind;
                app.report = None;
            }
        }
    });

    ui.add_space(10.0);

    // Date range filters
    ui.horizontal(|ui| {
        ui.label("From:");
        date_picker(ui, &mut app.report_filter.start_date, "report_start");

        ui.add_space(10.0);

        ui.label("To:");
        date_picker(ui, &mut app.report_filter.end_date, "report_end");

        ui.add_space(20.0);

        let today = Local::now().date_naive();
        let month_start = today.with_day(1).unwrap_or(today);

        if styled_button(ui, "This Month").clicked() {
            app.report_filter.start_date = month_start;
            app.report_filter.end_date = today;
        }

        if styled_button(ui, "Last Month").clicked() {
            let end = month_start.pred_opt().unwrap_or(month_start);
            app.report_filter.start_date = month_start.checked_sub_months(Months::new(1)).unwrap_or(month_start);
            app.report_filter.end_date = end;
        }

        if styled_button(ui, "This Year").clicked() {
            app.report_filter.start_date = today.with_ordinal(1).unwrap_or(today);
            app.report_filter.end_date = today;
        }
    });

    if app.report_filter.start_date > app.report_filter.end_date {
        ui.colored_label(colors::ERROR, "The start date is after the end date");
    }

    ui.add_space(10.0);

    // Department filter and generate button
    ui.horizontal(|ui| {
        ui.add_enabled_ui(app.report_filter.kind != ReportKind::CardStatement, |ui| {
            ui.label("Department:");
            egui::ComboBox::from_id_salt("report_dept_filter")
                .width(200.0)
                .selected_text(
                    app.report_filter
                        .department_id
                        .and_then(|id| app.departments.iter().find(|d| d.id == id))
                        .map(|d| d.name.as_str())
                        .unwrap_or("All Departments"),
                )
                .show_ui(ui, |ui| {
                    if ui
                        .selectable_label(app.report_filter.department_id.is_none(), "All Departments")
                        .clicked()
                    {
                        app.report_filter.department_id = None;
                    }
                    for dept in &app.departments {
                        if ui
                            .selectable_label(app.report_filter.department_id == Some(dept.id), &dept.name)
                            .clicked()
                        {
                            app.report_filter.department_id = Some(dept.id);
                        }
                    }
                });
        });

        ui.add_space(20.0);

        let valid = app.report_filter.start_date <= app.report_filter.end_date;
        ui.add_enabled_ui(valid && app.long_task.is_none(), |ui| {
            if primary_button_with_icon(ui, MAGNIFYING_GLASS, "Generate Report").clicked() {
                app.generate_report();
            }
        });
    });

    ui.add_space(10.0);

    // Export buttons and row count
    ui.horizontal(|ui| {
        ui.add_enabled_ui(app.report.is_some(), |ui| {
            if styled_button_with_icon(ui, FILE_XLS, "Export Excel").clicked() {
                app.export_report(ExportFormat::Excel);
            }

            ui.add_space(10.0);

            if styled_button_with_icon(ui, FILE_CSV, "Export CSV").clicked() {
                app.export_report(ExportFormat::Csv);
            }

            ui.add_space(10.0);

            if styled_button_with_icon(ui, FILE_PDF, "Export PDF").clicked() {
                app.export_report(ExportFormat::Pdf);
            }

            ui.add_space(10.0);

            if styled_button_with_icon(ui, FILE_DOC, "Export Word").clicked() {
                app.export_report(ExportFormat::Docx);
            }
        });

        ui.add_space(20.0);

        if let Some(table) = &app.report {
            ui.label(format!("{} rows", table.row_count()));
        }
    });

    ui.add_space(15.0);
    ui.separator();
    ui.add_space(10.0);

    match &app.report {
        Some(table) => show_table(table, ui),
        None => {
            ui.label("No data. Click 'Generate Report' to build the report.");
        }
    }

    go_back
}

fn show_table(table: &TableData, ui: &mut Ui) {
    ui.label(RichText::new(&table.title).strong());
    ui.add_space(8.0);

    ScrollArea::both().id_salt("report_scroll").show(ui, |ui| {
        egui::Grid::new("report_grid")
            .num_columns(table.column_count())
            .striped(true)
            .min_col_width(60.0)
            .spacing([12.0, 8.0])
            .show(ui, |ui| {
                for header in &table.headers {
                    ui.strong(header);
                }
                ui.end_row();

                for row in &table.rows {
                    let is_total = row.first().is_some_and(|c| c.as_text() == "Total");
                    for cell in row {
                        let mut text = RichText::new(cell.as_text());
                        if is_total {
                            text = text.strong();
                        }
                        if cell.is_numeric() {
                            ui.with_layout(Layout::right_to_left(Align::Center), |ui| ui.label(text));
                        } else {
                            ui.label(text);
                        }
                    }
                    ui.end_row();
                }

                if table.is_empty() {
                    ui.label("No rows for the selected filters.");
                    ui.end_row();
                }
            });
    });
}
