//! Department management panel.

use eframe::egui::{self, ScrollArea, Ui};
use egui_phosphor::regular::{ARROWS_CLOCKWISE, PENCIL, PLUS, TRASH};

use super::app::{App, DataKind, DeleteTarget};
use super::components::{
    action_button, back_button, danger_action_button, panel_header, primary_button_with_icon, styled_button,
    styled_button_with_icon, yes_no,
};
use super::forms::CodeNameForm;

/// Result of one frame of a form dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogAction {
    None,
    Save,
    Cancel,
}

/// Show the departments panel.
///
/// Returns `true` if the back button was clicked.
pub fn show(app: &mut App, ui: &mut Ui) -> bool {
    let go_back = back_button(ui);

    panel_header(ui, "Departments");

    ui.horizontal(|ui| {
        if primary_button_with_icon(ui, PLUS, "Add Department").clicked() {
            app.department_form = CodeNameForm::open_new();
        }

        ui.add_space(10.0);

        if styled_button_with_icon(ui, ARROWS_CLOCKWISE, "Refresh").clicked() {
            app.reload(DataKind::Departments);
        }
    });

    ui.add_space(15.0);

    ui.label(format!("{} departments", app.departments.len()));
    ui.add_space(10.0);

    ScrollArea::vertical().id_salt("departments_scroll").show(ui, |ui| {
        egui::Grid::new("departments_grid")
            .num_columns(4)
            .striped(true)
            .min_col_width(60.0)
            .spacing([12.0, 8.0])
            .show(ui, |ui| {
                ui.strong("Code");
                ui.strong("Name");
                ui.strong("Active");
                ui.strong("Actions");
                ui.end_row();

                for dept in &app.departments {
                    ui.label(&dept.code);
                    ui.label(&dept.name);
                    ui.label(yes_no(dept.is_active));

                    ui.horizontal(|ui| {
                        if action_button(ui, PENCIL, "Edit").clicked() {
                            app.department_form = CodeNameForm::edit_department(dept);
                        }
                        ui.add_space(4.0);
                        if danger_action_button(ui, TRASH, "Delete").clicked() {
                            app.delete_target = Some(DeleteTarget::Department(dept.id, dept.name.clone()));
                            app.show_delete_confirm = true;
                        }
                    });
                    ui.end_row();
                }
            });
    });

    if app.department_form.is_open {
        let title = if app.department_form.is_editing {
            "Edit Department"
        } else {
            "Add Department"
        };
        match code_name_dialog(ui.ctx(), &mut app.department_form, title) {
            DialogAction::Save => save_department(app),
            DialogAction::Cancel => app.department_form.reset(),
            DialogAction::None => {}
        }
    }

    go_back
}

fn save_department(app: &mut App) {
    let form = &app.department_form;
    if form.is_editing
        && let Some(id) = form.id
    {
        match form.to_update_department() {
            Ok(data) => app.update_department(id, data),
            Err(e) => app.error_message = Some(e),
        }
    } else {
        match form.to_create_department() {
            Ok(data) => app.create_department(data),
            Err(e) => app.error_message = Some(e),
        }
    }
}

/// Dialog shared by departments and accounts.
pub(super) fn code_name_dialog(ctx: &egui::Context, form: &mut CodeNameForm, title: &str) -> DialogAction {
    let mut action = DialogAction::None;

    egui::Window::new(title)
        .collapsible(false)
        .resizable(false)
        .default_width(400.0)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.add_space(10.0);

            egui::Grid::new("code_name_form_grid")
                .num_columns(2)
                .spacing([20.0, 10.0])
                .show(ui, |ui| {
                    ui.label("Code:");
                    ui.add(egui::TextEdit::singleline(&mut form.code).desired_width(120.0));
                    ui.end_row();

                    ui.label("Name:");
                    ui.add(egui::TextEdit::singleline(&mut form.name).desired_width(250.0));
                    ui.end_row();

                    ui.label("Active:");
                    ui.checkbox(&mut form.is_active, "");
                    ui.end_row();
                });

            ui.add_space(15.0);
            ui.separator();
            ui.add_space(10.0);

            ui.horizontal(|ui| {
                if styled_button(ui, "Cancel").clicked() {
                    action = DialogAction::Cancel;
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if primary_button_with_icon(ui, "", "Save").clicked() {
                        action = DialogAction::Save;
                    }
                });
            });
        });

    action
}
