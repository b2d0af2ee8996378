//! Expense account management panel.

use eframe::egui::{self, ScrollArea, Ui};
use egui_phosphor::regular::{ARROWS_CLOCKWISE, PENCIL, PLUS, TRASH};

use super::app::{App, DataKind, DeleteTarget};
use super::components::{
    action_button, back_button, danger_action_button, panel_header, primary_button_with_icon,
    styled_button_with_icon, yes_no,
};
use super::department_panel::{DialogAction, code_name_dialog};
use super::forms::CodeNameForm;

/// Show the accounts panel.
///
/// Returns `true` if the back button was clicked.
pub fn show(app: &mut App, ui: &mut Ui) -> bool {
    let go_back = back_button(ui);

    panel_header(ui, "Expense Accounts");

    ui.horizontal(|ui| {
        if primary_button_with_icon(ui, PLUS, "Add Account").clicked() {
            app.account_form = CodeNameForm::open_new();
        }

        ui.add_space(10.0);

        if styled_button_with_icon(ui, ARROWS_CLOCKWISE, "Refresh").clicked() {
            app.reload(DataKind::Accounts);
        }
    });

    ui.add_space(15.0);

    ui.label(format!("{} accounts", app.accounts.len()));
    ui.add_space(10.0);

    ScrollArea::vertical().id_salt("accounts_scroll").show(ui, |ui| {
        egui::Grid::new("accounts_grid")
            .num_columns(5)
            .striped(true)
            .min_col_width(60.0)
            .spacing([12.0, 8.0])
            .show(ui, |ui| {
                ui.strong("Code");
                ui.strong("Name");
                ui.strong("Cards");
                ui.strong("Active");
                ui.strong("Actions");
                ui.end_row();

                for account in &app.accounts {
                    ui.label(&account.code);
                    ui.label(&account.name);
                    let cards = app.cards.iter().filter(|c| c.account_id == Some(account.id)).count();
                    ui.label(cards.to_string());
                    ui.label(yes_no(account.is_active));

                    ui.horizontal(|ui| {
                        if action_button(ui, PENCIL, "Edit").clicked() {
                            app.account_form = CodeNameForm::edit_account(account);
                        }
                        ui.add_space(4.0);
                        if danger_action_button(ui, TRASH, "Delete").clicked() {
                            app.delete_target = Some(DeleteTarget::Account(account.id, account.name.clone()));
                            app.show_delete_confirm = true;
                        }
                    });
                    ui.end_row();
                }
            });
    });

    if app.account_form.is_open {
        let title = if app.account_form.is_editing {
            "Edit Account"
        } else {
            "Add Account"
        };
        match code_name_dialog(ui.ctx(), &mut app.account_form, title) {
            DialogAction::Save => save_account(app),
            DialogAction::Cancel => app.account_form.reset(),
            DialogAction::None => {}
        }
    }

    go_back
}

fn save_account(app: &mut App) {
    let form = &app.account_form;
    if form.is_editing
        && let Some(id) = form.id
    {
        match form.to_update_account() {
            Ok(data) => app.update_account(id, data),
            Err(e) => app.error_message = Some(e),
        }
    } else {
        match form.to_create_account() {
            Ok(data) => app.create_account(data),
            Err(e) => app.error_message = Some(e),
        }
    }
}
