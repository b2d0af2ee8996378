//! Diet requests panel: request, edit, cancel and liquidate per-diem advances.

use eframe::egui::{self, RichText, ScrollArea, Ui};
use egui_phosphor::regular::{ARROWS_CLOCKWISE, CHECK_CIRCLE, PENCIL, PLUS, TRASH, X_CIRCLE};

use super::app::{App, ConfirmAction, DataKind, DeleteTarget};
use super::components::{
    action_button, back_button, colors, danger_action_button, date_picker, money, panel_header,
    primary_button_with_icon, styled_button, styled_button_with_icon,
};
use super::forms::{DietForm, LiquidationForm};
use crate::entities::requesters;
use crate::models::diet::{DietStatus, PaymentMethod};
use crate::models::liquidation::Settlement;

/// Show the diets panel.
///
/// Returns `true` if the back button was clicked.
pub fn show(app: &mut App, ui: &mut Ui) -> bool {
    let go_back = back_button(ui);

    panel_header(ui, "Diets");

    ui.horizontal(|ui| {
        if primary_button_with_icon(ui, PLUS, "New Diet").clicked() {
            app.diet_form = DietForm::open_new();
        }

        ui.add_space(10.0);

        if styled_button_with_icon(ui, ARROWS_CLOCKWISE, "Refresh").clicked() {
            app.reload(DataKind::Diets);
        }
    });

    ui.add_space(10.0);

    ui.horizontal(|ui| {
        ui.label("Search:");
        ui.add(
            egui::TextEdit::singleline(&mut app.diet_search)
                .desired_width(200.0)
                .hint_text("Number, requester, destination..."),
        );

        ui.add_space(20.0);

        ui.label("Status:");
        if ui.selectable_label(app.diet_status_filter.is_none(), "All").clicked() {
            app.diet_status_filter = None;
        }
        for status in DietStatus::ALL {
            if ui
                .selectable_label(app.diet_status_filter == Some(status), status.label())
                .clicked()
            {
                app.diet_status_filter = Some(status);
            }
        }

        if !app.diet_search.is_empty() || app.diet_status_filter.is_some() {
            ui.add_space(10.0);
            if styled_button(ui, "Clear").clicked() {
                app.diet_search.clear();
                app.diet_status_filter = None;
            }
        }
    });

    ui.add_space(15.0);

    show_table(app, ui);

    if app.diet_form.is_open {
        show_diet_dialog(app, ui.ctx());
    }
    if app.liquidation_form.is_open {
        show_liquidation_dialog(app, ui.ctx());
    }

    go_back
}

fn requester_name(requesters: &[requesters::Model], id: i32) -> &str {
    requesters
        .iter()
        .find(|r| r.id == id)
        .map(|r| r.full_name.as_str())
        .unwrap_or("-")
}

fn show_table(app: &mut App, ui: &mut Ui) {
    let search = app.diet_search.to_lowercase();
    let filtered: Vec<_> = app
        .diets
        .iter()
        .filter(|d| {
            let search_match = search.is_empty()
                || d.number.to_lowercase().contains(&search)
                || d.destination.to_lowercase().contains(&search)
                || requester_name(&app.requesters, d.requester_id).to_lowercase().contains(&search);
            let status_match = app
                .diet_status_filter
                .is_none_or(|s| DietStatus::parse(&d.status) == Some(s));
            search_match && status_match
        })
        .collect();

    let pending: f64 = filtered
        .iter()
        .filter(|d| d.status == DietStatus::Pending.as_str())
        .map(|d| d.amount)
        .sum();
    ui.label(format!(
        "Showing {} of {} diets, {} pending liquidation",
        filtered.len(),
        app.diets.len(),
        money(pending)
    ));

    ui.add_space(10.0);

    ScrollArea::both().id_salt("diets_scroll").show(ui, |ui| {
        egui::Grid::new("diets_grid")
            .num_columns(9)
            .striped(true)
            .min_col_width(50.0)
            .spacing([12.0, 8.0])
            .show(ui, |ui| {
                ui.strong("Number");
                ui.strong("Requester");
                ui.strong("Destination");
                ui.strong("From");
                ui.strong("To");
                ui.strong("Amount");
                ui.strong("Payment");
                ui.strong("Status");
                ui.strong("Actions");
                ui.end_row();

                for diet in filtered {
                    let status = DietStatus::parse(&diet.status);

                    ui.label(&diet.number);
                    ui.label(requester_name(&app.requesters, diet.requester_id));
                    ui.label(&diet.destination);
                    ui.label(diet.start_date.to_string());
                    ui.label(diet.end_date.to_string());
                    ui.label(money(diet.amount));

                    let payment = PaymentMethod::parse(&diet.payment_method)
                        .map(|p| p.label())
                        .unwrap_or("-");
                    match diet.card_id.and_then(|id| app.cards.iter().find(|c| c.id == id)) {
                        Some(card) => ui.label(format!("{payment} {}", card.card_number)),
                        None => ui.label(payment),
                    };

                    let status_text = RichText::new(status.map(|s| s.label()).unwrap_or("?"));
                    match status {
                        Some(DietStatus::Pending) => ui.label(status_text.color(colors::WARNING)),
                        Some(DietStatus::Liquidated) => ui.label(status_text.color(colors::SUCCESS)),
                        _ => ui.label(status_text.color(colors::NEUTRAL)),
                    };

                    ui.horizontal(|ui| {
                        if status == Some(DietStatus::Pending) {
                            if action_button(ui, CHECK_CIRCLE, "Liquidate").clicked() {
                                app.liquidation_form = LiquidationForm::open_for(diet);
                            }
                            ui.add_space(4.0);
                            if action_button(ui, PENCIL, "Edit").clicked() {
                                app.diet_form = DietForm::edit(diet);
                            }
                            ui.add_space(4.0);
                            if danger_action_button(ui, X_CIRCLE, "Cancel diet").clicked() {
                                app.confirm_action = Some(ConfirmAction::CancelDiet(diet.id, diet.number.clone()));
                            }
                            ui.add_space(4.0);
                        }
                        if status != Some(DietStatus::Liquidated)
                            && danger_action_button(ui, TRASH, "Delete").clicked()
                        {
                            app.delete_target = Some(DeleteTarget::Diet(diet.id, diet.number.clone()));
                            app.show_delete_confirm = true;
                        }
                    });

                    ui.end_row();
                }
            });
    });
}

fn show_diet_dialog(app: &mut App, ctx: &egui::Context) {
    let editing = app.diet_form.is_editing;
    let title = if editing { "Edit Diet" } else { "New Diet" };

    egui::Window::new(title)
        .collapsible(false)
        .resizable(false)
        .default_width(480.0)
        .max_height(560.0)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.add_space(10.0);

            ScrollArea::vertical().max_height(460.0).show(ui, |ui| {
                egui::Grid::new("diet_form_grid")
                    .num_columns(2)
                    .spacing([20.0, 10.0])
                    .show(ui, |ui| {
                        ui.label("Requester:");
                        ui.add_enabled_ui(!editing, |ui| {
                            egui::ComboBox::from_id_salt("diet_form_requester")
                                .width(260.0)
                                .selected_text(
                                    app.diet_form
                                        .requester_id
                                        .map(|id| requester_name(&app.requesters, id))
                                        .unwrap_or("Select..."),
                                )
                                .show_ui(ui, |ui| {
                                    for requester in app.requesters.iter().filter(|r| r.is_active) {
                                        if ui
                                            .selectable_label(
                                                app.diet_form.requester_id == Some(requester.id),
                                                &requester.full_name,
                                            )
                                            .clicked()
                                        {
                                            app.diet_form.requester_id = Some(requester.id);
                                        }
                                    }
                                });
                        });
                        ui.end_row();

                        ui.label("Destination:");
                        ui.add(egui::TextEdit::singleline(&mut app.diet_form.destination).desired_width(260.0));
                        ui.end_row();

                        ui.label("Purpose:");
                        ui.add(
                            egui::TextEdit::multiline(&mut app.diet_form.purpose)
                                .desired_rows(2)
                                .desired_width(260.0),
                        );
                        ui.end_row();

                        ui.label("Account:");
                        egui::ComboBox::from_id_salt("diet_form_account")
                            .width(260.0)
                            .selected_text(
                                app.diet_form
                                    .account_id
                                    .and_then(|id| app.accounts.iter().find(|a| a.id == id))
                                    .map(|a| a.name.as_str())
                                    .unwrap_or("None"),
                            )
                            .show_ui(ui, |ui| {
                                if ui.selectable_label(app.diet_form.account_id.is_none(), "None").clicked() {
                                    app.diet_form.account_id = None;
                                }
                                for account in app.accounts.iter().filter(|a| a.is_active) {
                                    if ui
                                        .selectable_label(app.diet_form.account_id == Some(account.id), &account.name)
                                        .clicked()
                                    {
                                        app.diet_form.account_id = Some(account.id);
                                    }
                                }
                            });
                        ui.end_row();

                        ui.label("From:");
                        ui.add_enabled_ui(!editing, |ui| {
                            date_picker(ui, &mut app.diet_form.start_date, "diet_start");
                        });
                        ui.end_row();

                        ui.label("To:");
                        ui.add_enabled_ui(!editing, |ui| {
                            date_picker(ui, &mut app.diet_form.end_date, "diet_end");
                        });
                        ui.end_row();

                        let meals = &mut app.diet_form.meals;
                        for (label, value) in [
                            ("Breakfasts:", &mut meals.breakfasts),
                            ("Lunches:", &mut meals.lunches),
                            ("Dinners:", &mut meals.dinners),
                            ("Lodging nights:", &mut meals.lodging_nights),
                        ] {
                            ui.label(label);
                            ui.add_enabled(!editing, egui::DragValue::new(value).range(0..=366));
                            ui.end_row();
                        }

                        ui.label("Payment:");
                        ui.add_enabled_ui(!editing, |ui| {
                            ui.horizontal(|ui| {
                                for method in [PaymentMethod::Cash, PaymentMethod::Card] {
                                    ui.radio_value(&mut app.diet_form.payment_method, method, method.label());
                                }
                            });
                        });
                        ui.end_row();

                        if app.diet_form.payment_method == PaymentMethod::Card {
                            ui.label("Card:");
                            ui.add_enabled_ui(!editing, |ui| {
                                egui::ComboBox::from_id_salt("diet_form_card")
                                    .width(260.0)
                                    .selected_text(
                                        app.diet_form
                                            .card_id
                                            .and_then(|id| app.cards.iter().find(|c| c.id == id))
                                            .map(|c| format!("{} ({})", c.card_number, money(c.balance)))
                                            .unwrap_or_else(|| "Select...".to_string()),
                                    )
                                    .show_ui(ui, |ui| {
                                        for card in app.cards.iter().filter(|c| c.is_active) {
                                            let text = format!("{} ({})", card.card_number, money(card.balance));
                                            if ui
                                                .selectable_label(app.diet_form.card_id == Some(card.id), text)
                                                .clicked()
                                            {
                                                app.diet_form.card_id = Some(card.id);
                                            }
                                        }
                                    });
                            });
                            ui.end_row();
                        }
                    });

                ui.add_space(10.0);
                let amount = app.diet_form.meals.amount(&app.config.rates);
                ui.label(RichText::new(format!("Advance: {}", money(amount))).strong());
                if let Err(e) = app.diet_form.meals.validate(app.diet_form.start_date, app.diet_form.end_date) {
                    ui.colored_label(colors::ERROR, e);
                }
            });

            ui.add_space(15.0);
            ui.separator();
            ui.add_space(10.0);

            ui.horizontal(|ui| {
                if styled_button(ui, "Cancel").clicked() {
                    app.diet_form.reset();
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if primary_button_with_icon(ui, "", "Save").clicked() {
                        save_diet(app);
                    }
                });
            });
        });
}

fn save_diet(app: &mut App) {
    let form = &app.diet_form;
    if form.is_editing
        && let Some(id) = form.id
    {
        match form.to_update() {
            Ok(data) => app.update_diet(id, data),
            Err(e) => app.error_message = Some(e),
        }
    } else {
        match form.to_create() {
            Ok(data) => app.create_diet(data),
            Err(e) => app.error_message = Some(e),
        }
    }
}

fn show_liquidation_dialog(app: &mut App, ctx: &egui::Context) {
    egui::Window::new(format!("Liquidate Diet {}", app.liquidation_form.diet_number))
        .collapsible(false)
        .resizable(false)
        .default_width(400.0)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.add_space(10.0);

            egui::Grid::new("liquidation_form_grid")
                .num_columns(2)
                .spacing([20.0, 10.0])
                .show(ui, |ui| {
                    ui.label("Advance:");
                    ui.label(money(app.liquidation_form.advance));
                    ui.end_row();

                    ui.label("Amount Spent:");
                    ui.add(egui::TextEdit::singleline(&mut app.liquidation_form.amount_spent).desired_width(120.0));
                    ui.end_row();

                    ui.label("Date:");
                    date_picker(ui, &mut app.liquidation_form.liquidation_date, "liquidation_date");
                    ui.end_row();

                    ui.label("Notes:");
                    ui.add(
                        egui::TextEdit::singleline(&mut app.liquidation_form.notes)
                            .desired_width(220.0)
                            .hint_text("Optional"),
                    );
                    ui.end_row();
                });

            ui.add_space(10.0);
            match app.liquidation_form.to_create() {
                Ok(data) => {
                    let settlement = Settlement::compute(app.liquidation_form.advance, data.amount_spent);
                    if settlement.returned > 0.0 {
                        ui.label(format!("The requester returns {}", money(settlement.returned)));
                    } else if settlement.reimbursed > 0.0 {
                        ui.label(format!("The requester is reimbursed {}", money(settlement.reimbursed)));
                    } else {
                        ui.label("Nothing to return or reimburse");
                    }
                }
                Err(e) => {
                    ui.colored_label(colors::ERROR, e);
                }
            }

            ui.add_space(15.0);
            ui.separator();
            ui.add_space(10.0);

            ui.horizontal(|ui| {
                if styled_button(ui, "Cancel").clicked() {
                    app.liquidation_form.reset();
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if primary_button_with_icon(ui, CHECK_CIRCLE, "Liquidate").clicked() {
                        match app.liquidation_form.to_create() {
                            Ok(data) => app.create_liquidation(data),
                            Err(e) => app.error_message = Some(e),
                        }
                    }
                });
            });
        });
}
