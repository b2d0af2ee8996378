//! Login screen shown when user accounts exist.

use eframe::egui::{self, Key, RichText};

use super::app::App;
use super::components::{colors, primary_button_with_icon};

/// Show the login screen.
pub fn show(app: &mut App, ctx: &egui::Context) {
    egui::CentralPanel::default().show(ctx, |ui| {
        ui.vertical_centered(|ui| {
            ui.add_space(80.0);
            ui.label(RichText::new("Dietas Manager").size(32.0).strong());
            ui.add_space(5.0);
            ui.label(RichText::new(&app.config.organization.name).size(14.0).weak());
            ui.add_space(40.0);

            egui::Frame::group(ui.style()).show(ui, |ui| {
                ui.set_max_width(320.0);

                egui::Grid::new("login_grid")
                    .num_columns(2)
                    .spacing([12.0, 10.0])
                    .show(ui, |ui| {
                        ui.label("Username:");
                        ui.add(egui::TextEdit::singleline(&mut app.login_username).desired_width(180.0));
                        ui.end_row();

                        ui.label("Password:");
                        let response = ui.add(
                            egui::TextEdit::singleline(&mut app.login_password)
                                .password(true)
                                .desired_width(180.0),
                        );
                        if response.lost_focus() && ui.input(|i| i.key_pressed(Key::Enter)) {
                            app.login();
                        }
                        ui.end_row();
                    });

                ui.add_space(10.0);

                if let Some(error) = &app.login_error {
                    ui.colored_label(colors::ERROR, error);
                    ui.add_space(5.0);
                }

                let ready = !app.login_username.trim().is_empty() && !app.login_password.is_empty();
                ui.add_enabled_ui(ready, |ui| {
                    if primary_button_with_icon(ui, "", "Log In").clicked() {
                        app.login();
                    }
                });
            });
        });
    });
}
