//! Liquidations panel: settled diets and their returns or reimbursements.

use std::collections::HashMap;

use eframe::egui::{self, ScrollArea, Ui};
use egui_phosphor::regular::{ARROWS_CLOCKWISE, TRASH};

use super::app::{App, DataKind, DeleteTarget};
use super::components::{back_button, danger_action_button, money, panel_header, styled_button_with_icon};

/// Show the liquidations panel.
///
/// Returns `true` if the back button was clicked.
pub fn show(app: &mut App, ui: &mut Ui) -> bool {
    let go_back = back_button(ui);

    panel_header(ui, "Liquidations");

    ui.horizontal(|ui| {
        if styled_button_with_icon(ui, ARROWS_CLOCKWISE, "Refresh").clicked() {
            app.reload(DataKind::Liquidations);
        }
        ui.add_space(10.0);
        ui.weak("Liquidate pending diets from the Diets panel.");
    });

    ui.add_space(15.0);

    let returned: f64 = app.liquidations.iter().map(|l| l.amount_returned).sum();
    let reimbursed: f64 = app.liquidations.iter().map(|l| l.amount_reimbursed).sum();
    ui.label(format!(
        "{} liquidations, {} returned, {} reimbursed",
        app.liquidations.len(),
        money(returned),
        money(reimbursed)
    ));

    ui.add_space(10.0);

    let diets: HashMap<i32, _> = app.diets.iter().map(|d| (d.id, d)).collect();
    let requesters: HashMap<i32, &str> = app
        .requesters
        .iter()
        .map(|r| (r.id, r.full_name.as_str()))
        .collect();

    ScrollArea::both().id_salt("liquidations_scroll").show(ui, |ui| {
        egui::Grid::new("liquidations_grid")
            .num_columns(9)
            .striped(true)
            .min_col_width(50.0)
            .spacing([12.0, 8.0])
            .show(ui, |ui| {
                ui.strong("Diet");
                ui.strong("Requester");
                ui.strong("Date");
                ui.strong("Advance");
                ui.strong("Spent");
                ui.strong("Returned");
                ui.strong("Reimbursed");
                ui.strong("Notes");
                ui.strong("");
                ui.end_row();

                for liquidation in &app.liquidations {
                    let diet = diets.get(&liquidation.diet_id);
                    let number = diet.map(|d| d.number.clone()).unwrap_or_else(|| "-".to_string());

                    ui.label(&number);
                    ui.label(
                        diet.and_then(|d| requesters.get(&d.requester_id))
                            .copied()
                            .unwrap_or("-"),
                    );
                    ui.label(liquidation.liquidation_date.to_string());
                    ui.label(diet.map(|d| money(d.amount)).unwrap_or_default());
                    ui.label(money(liquidation.amount_spent));
                    ui.label(money(liquidation.amount_returned));
                    ui.label(money(liquidation.amount_reimbursed));
                    ui.label(liquidation.notes.as_deref().unwrap_or(""));

                    if danger_action_button(ui, TRASH, "Delete and reopen the diet").clicked() {
                        app.delete_target = Some(DeleteTarget::Liquidation(liquidation.id, number));
                        app.show_delete_confirm = true;
                    }
                    ui.end_row();
                }
            });
    });

    go_back
}
