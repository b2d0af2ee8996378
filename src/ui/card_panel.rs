//! Payment card panel: cards, balances and recharges.

use eframe::egui::{self, RichText, ScrollArea, Ui};
use egui_phosphor::regular::{ARROWS_CLOCKWISE, CLOCK_COUNTER_CLOCKWISE, PENCIL, PLUS, TRASH, WALLET};

use super::app::{App, DataKind, DeleteTarget};
use super::components::{
    action_button, back_button, colors, danger_action_button, date_picker, money, panel_header,
    primary_button_with_icon, styled_button, styled_button_with_icon, yes_no,
};
use super::forms::{CardForm, RechargeForm};

/// Show the cards panel.
///
/// Returns `true` if the back button was clicked.
pub fn show(app: &mut App, ui: &mut Ui) -> bool {
    let go_back = back_button(ui);

    panel_header(ui, "Payment Cards");

    ui.horizontal(|ui| {
        if primary_button_with_icon(ui, PLUS, "Add Card").clicked() {
            app.card_form = CardForm {
                is_active: true,
                is_open: true,
                ..Default::default()
            };
        }

        ui.add_space(10.0);

        if styled_button_with_icon(ui, ARROWS_CLOCKWISE, "Refresh").clicked() {
            app.reload(DataKind::Cards);
        }
    });

    ui.add_space(15.0);

    let total: f64 = app.cards.iter().map(|c| c.balance).sum();
    ui.label(format!("{} cards, total balance {}", app.cards.len(), money(total)));
    ui.add_space(10.0);

    ScrollArea::vertical()
        .id_salt("cards_scroll")
        .max_height(ui.available_height() * 0.55)
        .show(ui, |ui| {
            egui::Grid::new("cards_grid")
                .num_columns(6)
                .striped(true)
                .min_col_width(60.0)
                .spacing([12.0, 8.0])
                .show(ui, |ui| {
                    ui.strong("Number");
                    ui.strong("Description");
                    ui.strong("Account");
                    ui.strong("Balance");
                    ui.strong("Active");
                    ui.strong("Actions");
                    ui.end_row();

                    let mut history = None;
                    for card in &app.cards {
                        ui.label(&card.card_number);
                        ui.label(card.description.as_deref().unwrap_or("-"));

                        let account = card
                            .account_id
                            .and_then(|id| app.accounts.iter().find(|a| a.id == id))
                            .map(|a| format!("{} {}", a.code, a.name))
                            .unwrap_or_else(|| "-".to_string());
                        ui.label(account);

                        let balance = RichText::new(money(card.balance));
                        if card.balance < 0.0 {
                            ui.label(balance.color(colors::ERROR));
                        } else {
                            ui.label(balance);
                        }
                        ui.label(yes_no(card.is_active));

                        ui.horizontal(|ui| {
                            if action_button(ui, WALLET, "Recharge").clicked() {
                                app.recharge_form = RechargeForm::open_for(card);
                            }
                            ui.add_space(4.0);
                            if action_button(ui, CLOCK_COUNTER_CLOCKWISE, "Recharge history").clicked() {
                                history = Some(card.id);
                            }
                            ui.add_space(4.0);
                            if action_button(ui, PENCIL, "Edit").clicked() {
                                app.card_form = CardForm::edit(card);
                            }
                            ui.add_space(4.0);
                            if danger_action_button(ui, TRASH, "Delete").clicked() {
                                app.delete_target = Some(DeleteTarget::Card(card.id, card.card_number.clone()));
                                app.show_delete_confirm = true;
                            }
                        });
                        ui.end_row();
                    }

                    if let Some(card_id) = history {
                        app.recharges.clear();
                        app.load_recharges(card_id);
                    }
                });
        });

    ui.add_space(15.0);

    show_recharges(app, ui);

    if app.card_form.is_open {
        show_card_dialog(app, ui.ctx());
    }
    if app.recharge_form.is_open {
        show_recharge_dialog(app, ui.ctx());
    }

    go_back
}

fn show_recharges(app: &mut App, ui: &mut Ui) {
    let Some(card_id) = app.recharges_card_id else {
        return;
    };
    let card_number = app
        .cards
        .iter()
        .find(|c| c.id == card_id)
        .map(|c| c.card_number.clone())
        .unwrap_or_default();

    ui.separator();
    ui.horizontal(|ui| {
        ui.label(RichText::new(format!("Recharges of card {card_number}")).strong());
        if styled_button(ui, "Hide").clicked() {
            app.recharges_card_id = None;
            app.recharges.clear();
        }
    });
    ui.add_space(8.0);

    if app.recharges.is_empty() {
        ui.label(RichText::new("No recharges").weak());
        return;
    }

    ScrollArea::vertical().id_salt("recharges_scroll").show(ui, |ui| {
        egui::Grid::new("recharges_grid")
            .num_columns(4)
            .striped(true)
            .spacing([12.0, 6.0])
            .show(ui, |ui| {
                ui.strong("Date");
                ui.strong("Amount");
                ui.strong("Notes");
                ui.strong("");
                ui.end_row();

                for recharge in &app.recharges {
                    ui.label(recharge.recharge_date.to_string());
                    ui.label(money(recharge.amount));
                    ui.label(recharge.notes.as_deref().unwrap_or(""));
                    if danger_action_button(ui, TRASH, "Delete recharge").clicked() {
                        app.delete_target = Some(DeleteTarget::Recharge(
                            recharge.id,
                            format!("recharge of {} on {}", money(recharge.amount), recharge.recharge_date),
                        ));
                        app.show_delete_confirm = true;
                    }
                    ui.end_row();
                }
            });
    });
}

fn show_card_dialog(app: &mut App, ctx: &egui::Context) {
    let title = if app.card_form.is_editing { "Edit Card" } else { "Add Card" };

    egui::Window::new(title)
        .collapsible(false)
        .resizable(false)
        .default_width(420.0)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.add_space(10.0);

            egui::Grid::new("card_form_grid")
                .num_columns(2)
                .spacing([20.0, 10.0])
                .show(ui, |ui| {
                    ui.label("Card Number:");
                    ui.add(egui::TextEdit::singleline(&mut app.card_form.card_number).desired_width(200.0));
                    ui.end_row();

                    ui.label("Description:");
                    ui.add(
                        egui::TextEdit::singleline(&mut app.card_form.description)
                            .desired_width(250.0)
                            .hint_text("Optional"),
                    );
                    ui.end_row();

                    ui.label("Account:");
                    egui::ComboBox::from_id_salt("card_form_account")
                        .width(250.0)
                        .selected_text(
                            app.card_form
                                .account_id
                                .and_then(|id| app.accounts.iter().find(|a| a.id == id))
                                .map(|a| a.name.as_str())
                                .unwrap_or("None"),
                        )
                        .show_ui(ui, |ui| {
                            if ui.selectable_label(app.card_form.account_id.is_none(), "None").clicked() {
                                app.card_form.account_id = None;
                            }
                            for account in app.accounts.iter().filter(|a| a.is_active) {
                                if ui
                                    .selectable_label(app.card_form.account_id == Some(account.id), &account.name)
                                    .clicked()
                                {
                                    app.card_form.account_id = Some(account.id);
                                }
                            }
                        });
                    ui.end_row();

                    ui.label("Active:");
                    ui.checkbox(&mut app.card_form.is_active, "");
                    ui.end_row();
                });

            if !app.card_form.is_editing {
                ui.add_space(8.0);
                ui.weak("New cards start with a zero balance. Use Recharge to load money.");
            }

            ui.add_space(15.0);
            ui.separator();
            ui.add_space(10.0);

            ui.horizontal(|ui| {
                if styled_button(ui, "Cancel").clicked() {
                    app.card_form.reset();
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if primary_button_with_icon(ui, "", "Save").clicked() {
                        save_card(app);
                    }
                });
            });
        });
}

fn save_card(app: &mut App) {
    let form = &app.card_form;
    if form.is_editing
        && let Some(id) = form.id
    {
        match form.to_update() {
            Ok(data) => app.update_card(id, data),
            Err(e) => app.error_message = Some(e),
        }
    } else {
        match form.to_create() {
            Ok(data) => app.create_card(data),
            Err(e) => app.error_message = Some(e),
        }
    }
}

fn show_recharge_dialog(app: &mut App, ctx: &egui::Context) {
    egui::Window::new(format!("Recharge Card {}", app.recharge_form.card_number))
        .collapsible(false)
        .resizable(false)
        .default_width(380.0)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.add_space(10.0);

            egui::Grid::new("recharge_form_grid")
                .num_columns(2)
                .spacing([20.0, 10.0])
                .show(ui, |ui| {
                    ui.label("Amount:");
                    ui.add(
                        egui::TextEdit::singleline(&mut app.recharge_form.amount)
                            .desired_width(120.0)
                            .hint_text("0.00"),
                    );
                    ui.end_row();

                    ui.label("Date:");
                    date_picker(ui, &mut app.recharge_form.recharge_date, "recharge_date");
                    ui.end_row();

                    ui.label("Notes:");
                    ui.add(
                        egui::TextEdit::singleline(&mut app.recharge_form.notes)
                            .desired_width(220.0)
                            .hint_text("Optional"),
                    );
                    ui.end_row();
                });

            ui.add_space(15.0);
            ui.separator();
            ui.add_space(10.0);

            ui.horizontal(|ui| {
                if styled_button(ui, "Cancel").clicked() {
                    app.recharge_form.reset();
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if primary_button_with_icon(ui, WALLET, "Recharge").clicked() {
                        match app.recharge_form.to_create() {
                            Ok(data) => app.recharge_card(data),
                            Err(e) => app.error_message = Some(e),
                        }
                    }
                });
            });
        });
}
