//! Settings panel for organization, rates, backup and export options.

use eframe::egui::{self, RichText};

use super::app::App;
use super::components::{back_button, colors, panel_header};
use crate::config::{AppConfig, RateConfig};

/// Show the settings panel.
/// Returns `true` if the back button was clicked.
pub fn show(app: &mut App, ui: &mut egui::Ui) -> bool {
    let go_back = back_button(ui);
    panel_header(ui, "Settings");

    egui::ScrollArea::vertical().show(ui, |ui| {
        // Organization
        ui.group(|ui| {
            ui.heading("Organization");
            ui.add_space(5.0);

            egui::Grid::new("org_settings_grid")
                .num_columns(2)
                .spacing([10.0, 8.0])
                .show(ui, |ui| {
                    ui.label("Name:");
                    if ui.text_edit_singleline(&mut app.config.organization.name).changed() {
                        app.config_modified = true;
                    }
                    ui.end_row();
                });
        });

        ui.add_space(15.0);

        // Rates
        ui.group(|ui| {
            ui.heading("Per-Diem Rates");
            ui.add_space(5.0);

            if rates_grid(ui, &mut app.config.rates, "rate_settings_grid") {
                app.config_modified = true;
            }

            ui.add_space(5.0);
            ui.label(RichText::new("New rates apply to diets requested after saving.").small().weak());
        });

        ui.add_space(15.0);

        // Backups
        ui.group(|ui| {
            ui.heading("Backups");
            ui.add_space(5.0);

            egui::Grid::new("backup_settings_grid")
                .num_columns(2)
                .spacing([10.0, 8.0])
                .show(ui, |ui| {
                    ui.label("Backups kept:");
                    if ui
                        .add(egui::DragValue::new(&mut app.config.backup.keep_last).range(0..=1000))
                        .on_hover_text("0 keeps every backup")
                        .changed()
                    {
                        app.config_modified = true;
                    }
                    ui.end_row();

                    ui.label("Backup folder:");
                    ui.label(app.paths.backups.display().to_string());
                    ui.end_row();

                    ui.label("Export folder:");
                    ui.label(app.paths.exports.display().to_string());
                    ui.end_row();
                });
        });

        ui.add_space(15.0);

        // Locations
        ui.group(|ui| {
            ui.heading("Files");
            ui.add_space(5.0);

            egui::Grid::new("file_settings_grid")
                .num_columns(2)
                .spacing([10.0, 8.0])
                .show(ui, |ui| {
                    ui.label("Database:");
                    ui.label(app.paths.database.display().to_string());
                    ui.end_row();

                    ui.label("Configuration:");
                    ui.label(app.config_path.display().to_string());
                    ui.end_row();

                    ui.label("Logs:");
                    ui.label(app.paths.logs.display().to_string());
                    ui.end_row();
                });

            ui.add_space(5.0);
            ui.label(
                RichText::new("Locations are chosen in the setup wizard (run with --setup to change them).")
                    .small()
                    .weak(),
            );
        });

        ui.add_space(20.0);

        // Action buttons
        ui.horizontal(|ui| {
            let save_btn = egui::Button::new("Save Settings");
            if ui.add_enabled(app.config_modified, save_btn).clicked() {
                app.save_config();
            }

            if app.config_modified {
                ui.label(RichText::new("(unsaved changes)").color(colors::WARNING).italics());
            }

            if ui.button("Reset Rates to Defaults").clicked() {
                app.config.rates = AppConfig::default().rates;
                app.config_modified = true;
            }
        });
    });

    go_back
}

/// Editable grid of the four rates. Returns `true` when a value changed.
pub(super) fn rates_grid(ui: &mut egui::Ui, rates: &mut RateConfig, id: &str) -> bool {
    let mut changed = false;

    egui::Grid::new(id).num_columns(2).spacing([10.0, 8.0]).show(ui, |ui| {
        for (label, value) in [
            ("Breakfast:", &mut rates.breakfast),
            ("Lunch:", &mut rates.lunch),
            ("Dinner:", &mut rates.dinner),
            ("Lodging (per night):", &mut rates.lodging),
        ] {
            ui.label(label);
            changed |= ui
                .add(
                    egui::DragValue::new(value)
                        .range(0.0..=10_000.0)
                        .speed(0.5)
                        .fixed_decimals(2),
                )
                .changed();
            ui.end_row();
        }
    });

    changed
}
