//! User accounts panel. Only administrators reach it.

use eframe::egui::{self, RichText, ScrollArea, Ui};
use egui_phosphor::regular::{ARROWS_CLOCKWISE, PENCIL, PLUS, TRASH};

use super::app::{App, DataKind, DeleteTarget};
use super::components::{
    action_button, back_button, colors, danger_action_button, panel_header, primary_button_with_icon, styled_button,
    styled_button_with_icon, yes_no,
};
use super::forms::UserForm;
use crate::models::user::Role;

/// Show the users panel.
///
/// Returns `true` if the back button was clicked.
pub fn show(app: &mut App, ui: &mut Ui) -> bool {
    let go_back = back_button(ui);

    panel_header(ui, "Users");

    if !app.is_admin() {
        ui.colored_label(colors::WARNING, "Only administrators can manage users.");
        return go_back;
    }

    ui.horizontal(|ui| {
        if primary_button_with_icon(ui, PLUS, "Add User").clicked() {
            app.user_form = UserForm::open_new(app.users.is_empty());
        }

        ui.add_space(10.0);

        if styled_button_with_icon(ui, ARROWS_CLOCKWISE, "Refresh").clicked() {
            app.reload(DataKind::Users);
        }
    });

    ui.add_space(10.0);
    if app.users.is_empty() {
        ui.label(RichText::new("No users yet. Anyone can use the application until the first user is created.").weak());
    }
    ui.add_space(10.0);

    ScrollArea::vertical().id_salt("users_scroll").show(ui, |ui| {
        egui::Grid::new("users_grid")
            .num_columns(5)
            .striped(true)
            .min_col_width(60.0)
            .spacing([12.0, 8.0])
            .show(ui, |ui| {
                ui.strong("Username");
                ui.strong("Full Name");
                ui.strong("Role");
                ui.strong("Active");
                ui.strong("Actions");
                ui.end_row();

                for user in &app.users {
                    ui.label(&user.username);
                    ui.label(&user.full_name);
                    ui.label(Role::parse(&user.role).map(|r| r.label()).unwrap_or(user.role.as_str()));
                    ui.label(yes_no(user.is_active));

                    ui.horizontal(|ui| {
                        if action_button(ui, PENCIL, "Edit").clicked() {
                            app.user_form = UserForm::edit(user);
                        }
                        ui.add_space(4.0);
                        if danger_action_button(ui, TRASH, "Delete").clicked() {
                            app.delete_target = Some(DeleteTarget::User(user.id, user.username.clone()));
                            app.show_delete_confirm = true;
                        }
                    });
                    ui.end_row();
                }
            });
    });

    if app.user_form.is_open {
        show_form_dialog(app, ui.ctx());
    }

    go_back
}

fn show_form_dialog(app: &mut App, ctx: &egui::Context) {
    let title = if app.user_form.is_editing { "Edit User" } else { "Add User" };

    egui::Window::new(title)
        .collapsible(false)
        .resizable(false)
        .default_width(400.0)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.add_space(10.0);

            egui::Grid::new("user_form_grid")
                .num_columns(2)
                .spacing([20.0, 10.0])
                .show(ui, |ui| {
                    ui.label("Username:");
                    ui.add_enabled(
                        !app.user_form.is_editing,
                        egui::TextEdit::singleline(&mut app.user_form.username).desired_width(180.0),
                    );
                    ui.end_row();

                    ui.label("Full Name:");
                    ui.add(egui::TextEdit::singleline(&mut app.user_form.full_name).desired_width(250.0));
                    ui.end_row();

                    ui.label("Password:");
                    let hint = if app.user_form.is_editing {
                        "Leave empty to keep"
                    } else {
                        ""
                    };
                    ui.add(
                        egui::TextEdit::singleline(&mut app.user_form.password)
                            .password(true)
                            .desired_width(180.0)
                            .hint_text(hint),
                    );
                    ui.end_row();

                    ui.label("Role:");
                    egui::ComboBox::from_id_salt("user_form_role")
                        .width(180.0)
                        .selected_text(app.user_form.role.label())
                        .show_ui(ui, |ui| {
                            for role in Role::ALL {
                                ui.selectable_value(&mut app.user_form.role, role, role.label());
                            }
                        });
                    ui.end_row();

                    if app.user_form.is_editing {
                        ui.label("Active:");
                        ui.checkbox(&mut app.user_form.is_active, "");
                        ui.end_row();
                    }
                });

            ui.add_space(15.0);
            ui.separator();
            ui.add_space(10.0);

            ui.horizontal(|ui| {
                if styled_button(ui, "Cancel").clicked() {
                    app.user_form.reset();
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if primary_button_with_icon(ui, "", "Save").clicked() {
                        save_user(app);
                    }
                });
            });
        });
}

fn save_user(app: &mut App) {
    let form = &app.user_form;
    if form.is_editing
        && let Some(id) = form.id
    {
        match form.to_update() {
            Ok(data) => app.update_user(id, data),
            Err(e) => app.error_message = Some(e),
        }
    } else {
        match form.to_create() {
            Ok(data) => app.create_user(data),
            Err(e) => app.error_message = Some(e),
        }
    }
}
