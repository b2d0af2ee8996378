//! Database maintenance panel: backups, restore and new accounting cycle.

use eframe::egui::{self, RichText, ScrollArea, Ui};
use egui_phosphor::regular::{ARCHIVE, ARROWS_CLOCKWISE, CLOCK_COUNTER_CLOCKWISE, DATABASE, TRASH};

use super::app::{App, ConfirmAction, DeleteTarget};
use super::components::{
    action_button, back_button, colors, danger_action_button, panel_header, primary_button_with_icon,
    styled_button_with_icon,
};

/// Show the backups panel.
///
/// Returns `true` if the back button was clicked.
pub fn show(app: &mut App, ui: &mut Ui) -> bool {
    let go_back = back_button(ui);

    panel_header(ui, "Backups");

    let busy = app.long_task.is_some();
    let admin = app.is_admin();

    ui.group(|ui| {
        ui.label(RichText::new("New Backup").strong());
        ui.add_space(5.0);
        ui.horizontal(|ui| {
            ui.label("Description:");
            ui.add(
                egui::TextEdit::singleline(&mut app.backup_description)
                    .desired_width(260.0)
                    .hint_text("Optional"),
            );
            ui.add_space(10.0);
            ui.add_enabled_ui(!busy, |ui| {
                if primary_button_with_icon(ui, DATABASE, "Backup Now").clicked() {
                    app.create_backup();
                }
            });
        });
        ui.add_space(5.0);
        let keep = match app.config.backup.keep_last {
            0 => "All backups are kept.".to_string(),
            n => format!("The newest {n} backups are kept, plus every cycle archive."),
        };
        ui.weak(format!("Folder: {}. {keep}", app.service.backup_dir().display()));
    });

    ui.add_space(15.0);

    ui.horizontal(|ui| {
        ui.label(RichText::new(format!("{} backups", app.backups.len())).strong());
        ui.add_space(10.0);
        if styled_button_with_icon(ui, ARROWS_CLOCKWISE, "Refresh").clicked() {
            app.load_backups();
        }
    });

    ui.add_space(10.0);

    ScrollArea::vertical()
        .id_salt("backups_scroll")
        .max_height(ui.available_height() * 0.6)
        .show(ui, |ui| {
            egui::Grid::new("backups_grid")
                .num_columns(5)
                .striped(true)
                .min_col_width(60.0)
                .spacing([12.0, 8.0])
                .show(ui, |ui| {
                    ui.strong("Created");
                    ui.strong("Description");
                    ui.strong("Size");
                    ui.strong("File");
                    ui.strong("Actions");
                    ui.end_row();

                    for backup in &app.backups {
                        ui.label(backup.created_at.format("%Y-%m-%d %H:%M:%S").to_string());
                        let description = backup.description.as_deref().unwrap_or("-");
                        if backup.is_cycle_archive() {
                            ui.label(description)
                                .on_hover_text("Cycle archive, never removed by automatic cleanup");
                        } else {
                            ui.label(description);
                        }
                        ui.label(backup.size_display());
                        ui.label(RichText::new(&backup.file_name).weak());

                        ui.horizontal(|ui| {
                            ui.add_enabled_ui(admin && !busy, |ui| {
                                if action_button(ui, CLOCK_COUNTER_CLOCKWISE, "Restore").clicked() {
                                    app.confirm_action =
                                        Some(ConfirmAction::Restore(backup.path.clone(), backup.file_name.clone()));
                                }
                            });
                            ui.add_space(4.0);
                            if danger_action_button(ui, TRASH, "Delete").clicked() {
                                app.delete_target =
                                    Some(DeleteTarget::Backup(backup.path.clone(), backup.file_name.clone()));
                                app.show_delete_confirm = true;
                            }
                        });
                        ui.end_row();
                    }
                });
        });

    ui.add_space(15.0);

    ui.group(|ui| {
        ui.label(RichText::new("New Cycle").strong());
        ui.add_space(5.0);
        ui.label(
            "Archives the current database and starts an empty cycle. Departments, requesters, accounts, \
             cards with their balances and users are kept.",
        );
        ui.add_space(5.0);

        if !admin {
            ui.colored_label(colors::WARNING, "Only administrators can start a new cycle.");
            return;
        }

        ui.horizontal(|ui| {
            ui.label("Cycle name:");
            ui.add(
                egui::TextEdit::singleline(&mut app.cycle_name)
                    .desired_width(200.0)
                    .hint_text("e.g. 2026"),
            );
            ui.add_space(10.0);
            let ready = !busy && !app.cycle_name.trim().is_empty();
            ui.add_enabled_ui(ready, |ui| {
                if styled_button_with_icon(ui, ARCHIVE, "Start New Cycle").clicked() {
                    app.confirm_action = Some(ConfirmAction::NewCycle(app.cycle_name.trim().to_string()));
                }
            });
        });
    });

    go_back
}
