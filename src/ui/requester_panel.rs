//! Requester management panel with search and department filter.

use eframe::egui::{self, ScrollArea, Ui};
use egui_phosphor::regular::{ARROWS_CLOCKWISE, PENCIL, PLUS, TRASH};

use super::app::{App, DataKind, DeleteTarget};
use super::components::{
    action_button, back_button, danger_action_button, panel_header, primary_button_with_icon, styled_button,
    styled_button_with_icon, yes_no,
};
use super::forms::RequesterForm;

/// Show the requesters panel.
///
/// Returns `true` if the back button was clicked.
pub fn show(app: &mut App, ui: &mut Ui) -> bool {
    let go_back = back_button(ui);

    panel_header(ui, "Requesters");

    // Toolbar row 1: Action buttons
    ui.horizontal(|ui| {
        if primary_button_with_icon(ui, PLUS, "Add Requester").clicked() {
            app.requester_form = RequesterForm {
                is_active: true,
                is_open: true,
                ..Default::default()
            };
        }

        ui.add_space(10.0);

        if styled_button_with_icon(ui, ARROWS_CLOCKWISE, "Refresh").clicked() {
            app.reload(DataKind::Requesters);
        }
    });

    ui.add_space(10.0);

    // Toolbar row 2: Search and filter
    ui.horizontal(|ui| {
        ui.label("Search:");
        ui.add(
            egui::TextEdit::singleline(&mut app.requester_search)
                .desired_width(200.0)
                .hint_text("Name or identity..."),
        );

        ui.add_space(20.0);

        ui.label("Department:");
        department_combo(ui, app, "req_dept_filter");

        if !app.requester_search.is_empty() || app.requester_dept_filter.is_some() {
            ui.add_space(10.0);
            if styled_button(ui, "Clear").clicked() {
                app.requester_search.clear();
                app.requester_dept_filter = None;
            }
        }
    });

    ui.add_space(15.0);

    show_table(app, ui);

    if app.requester_form.is_open {
        show_form_dialog(app, ui.ctx());
    }

    go_back
}

fn department_combo(ui: &mut Ui, app: &mut App, id: &str) {
    egui::ComboBox::from_id_salt(id)
        .width(180.0)
        .selected_text(
            app.requester_dept_filter
                .and_then(|id| app.departments.iter().find(|d| d.id == id))
                .map(|d| d.name.as_str())
                .unwrap_or("All"),
        )
        .show_ui(ui, |ui| {
            if ui.selectable_label(app.requester_dept_filter.is_none(), "All").clicked() {
                app.requester_dept_filter = None;
            }
            for dept in &app.departments {
                if ui
                    .selectable_label(app.requester_dept_filter == Some(dept.id), &dept.name)
                    .clicked()
                {
                    app.requester_dept_filter = Some(dept.id);
                }
            }
        });
}

fn show_table(app: &mut App, ui: &mut Ui) {
    let search = app.requester_search.to_lowercase();
    let filtered: Vec<_> = app
        .requesters
        .iter()
        .filter(|r| {
            let search_match = search.is_empty()
                || r.full_name.to_lowercase().contains(&search)
                || r.identity_number.to_lowercase().contains(&search);
            let dept_match = app.requester_dept_filter.is_none_or(|id| r.department_id == id);
            search_match && dept_match
        })
        .collect();

    ui.label(format!("Showing {} of {} requesters", filtered.len(), app.requesters.len()));

    ui.add_space(10.0);

    ScrollArea::vertical().id_salt("requesters_scroll").show(ui, |ui| {
        egui::Grid::new("requesters_grid")
            .num_columns(6)
            .striped(true)
            .min_col_width(60.0)
            .spacing([12.0, 8.0])
            .show(ui, |ui| {
                ui.strong("Name");
                ui.strong("Identity");
                ui.strong("Position");
                ui.strong("Department");
                ui.strong("Active");
                ui.strong("Actions");
                ui.end_row();

                for requester in filtered {
                    ui.label(&requester.full_name);
                    ui.label(&requester.identity_number);
                    ui.label(requester.position.as_deref().unwrap_or("-"));

                    let dept_name = app
                        .departments
                        .iter()
                        .find(|d| d.id == requester.department_id)
                        .map(|d| d.name.as_str())
                        .unwrap_or("-");
                    ui.label(dept_name);
                    ui.label(yes_no(requester.is_active));

                    ui.horizontal(|ui| {
                        if action_button(ui, PENCIL, "Edit").clicked() {
                            app.requester_form = RequesterForm::edit(requester);
                        }
                        ui.add_space(4.0);
                        if danger_action_button(ui, TRASH, "Delete").clicked() {
                            app.delete_target =
                                Some(DeleteTarget::Requester(requester.id, requester.full_name.clone()));
                            app.show_delete_confirm = true;
                        }
                    });

                    ui.end_row();
                }
            });
    });
}

fn show_form_dialog(app: &mut App, ctx: &egui::Context) {
    let title = if app.requester_form.is_editing {
        "Edit Requester"
    } else {
        "Add Requester"
    };

    egui::Window::new(title)
        .collapsible(false)
        .resizable(false)
        .default_width(450.0)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.add_space(10.0);

            egui::Grid::new("req_form_grid")
                .num_columns(2)
                .spacing([20.0, 10.0])
                .show(ui, |ui| {
                    ui.label("Full Name:");
                    ui.add(egui::TextEdit::singleline(&mut app.requester_form.full_name).desired_width(250.0));
                    ui.end_row();

                    ui.label("Identity Number:");
                    ui.add(egui::TextEdit::singleline(&mut app.requester_form.identity_number).desired_width(150.0));
                    ui.end_row();

                    ui.label("Position:");
                    ui.add(
                        egui::TextEdit::singleline(&mut app.requester_form.position)
                            .desired_width(250.0)
                            .hint_text("Optional"),
                    );
                    ui.end_row();

                    ui.label("Department:");
                    egui::ComboBox::from_id_salt("req_form_dept")
                        .width(250.0)
                        .selected_text(
                            app.requester_form
                                .department_id
                                .and_then(|id| app.departments.iter().find(|d| d.id == id))
                                .map(|d| d.name.as_str())
                                .unwrap_or("Select..."),
                        )
                        .show_ui(ui, |ui| {
                            for dept in app.departments.iter().filter(|d| d.is_active) {
                                if ui
                                    .selectable_label(app.requester_form.department_id == Some(dept.id), &dept.name)
                                    .clicked()
                                {
                                    app.requester_form.department_id = Some(dept.id);
                                }
                            }
                        });
                    ui.end_row();

                    ui.label("Active:");
                    ui.checkbox(&mut app.requester_form.is_active, "");
                    ui.end_row();
                });

            ui.add_space(15.0);
            ui.separator();
            ui.add_space(10.0);

            ui.horizontal(|ui| {
                if styled_button(ui, "Cancel").clicked() {
                    app.requester_form.reset();
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if primary_button_with_icon(ui, "", "Save").clicked() {
                        save_requester(app);
                    }
                });
            });
        });
}

fn save_requester(app: &mut App) {
    let form = &app.requester_form;
    if form.is_editing
        && let Some(id) = form.id
    {
        match form.to_update() {
            Ok(data) => app.update_requester(id, data),
            Err(e) => app.error_message = Some(e),
        }
    } else {
        match form.to_create() {
            Ok(data) => app.create_requester(data),
            Err(e) => app.error_message = Some(e),
        }
    }
}
