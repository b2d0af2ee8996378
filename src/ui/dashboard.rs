//! Dashboard panel with stats, navigation cards, quick actions, and activity log.

use chrono::Local;
use eframe::egui::{self, Color32, CornerRadius, Margin, RichText, ScrollArea, Ui};
use egui_phosphor::regular::{BUILDINGS, CHART_BAR, CREDIT_CARD, DATABASE, RECEIPT, USERS};

use super::app::{App, LogLevel, Panel};
use super::components::{dashboard_card, money};
use super::forms::DietForm;
use crate::models::diet::DietStatus;

/// Show the dashboard panel.
///
/// Returns `Some(panel)` if navigation is requested.
pub fn show(app: &mut App, ui: &mut Ui) -> Option<Panel> {
    let mut next_panel = None;

    ui.vertical_centered(|ui| {
        ui.add_space(30.0);

        // Header
        ui.label(RichText::new("Dietas Manager").size(32.0).strong());
        ui.add_space(5.0);
        ui.label(RichText::new(&app.config.organization.name).size(14.0).weak());

        ui.add_space(30.0);

        let today = Local::now().date_naive();
        let pending: Vec<_> = app
            .diets
            .iter()
            .filter(|d| d.status == DietStatus::Pending.as_str())
            .collect();
        let overdue = pending.iter().filter(|d| d.end_date < today).count();
        let pending_amount: f64 = pending.iter().map(|d| d.amount).sum();
        let card_balance: f64 = app.cards.iter().filter(|c| c.is_active).map(|c| c.balance).sum();

        // Stat cards row
        ui.horizontal(|ui| {
            let available = ui.available_width();
            let start_offset = ((available - 700.0) / 2.0).max(0.0);
            ui.add_space(start_offset);

            stat_card(ui, "Requesters", &app.counts.requesters.to_string(), "Registered people");
            stat_card(
                ui,
                "Pending Diets",
                &pending.len().to_string(),
                &format!("{} awaiting liquidation", money(pending_amount)),
            );
            stat_card(ui, "Overdue", &overdue.to_string(), "Trips ended, not liquidated");
            stat_card(ui, "Card Balance", &money(card_balance), "Active cards");
        });

        ui.add_space(30.0);

        // Navigation cards row
        let available = ui.available_width();
        let num_cards = 6.0;
        let spacing = 20.0;
        let total_spacing = spacing * (num_cards - 1.0);
        let card_width = ((available - total_spacing) / num_cards).clamp(120.0, 200.0);
        let card_height = card_width * 0.75;
        let card_size = egui::vec2(card_width, card_height);
        let total_width = card_width * num_cards + total_spacing;
        let start_offset = ((available - total_width) / 2.0).max(0.0);

        ui.horizontal(|ui| {
            ui.add_space(start_offset);

            let cards = [
                ("Diets", "Requests and advances", RECEIPT, Panel::Diets),
                ("Requesters", "People and departments", USERS, Panel::Requesters),
                ("Cards", "Balances and recharges", CREDIT_CARD, Panel::Cards),
                ("Departments", "Organizational units", BUILDINGS, Panel::Departments),
                ("Reports", "Tables and export", CHART_BAR, Panel::Reports),
                ("Backups", "Backup and restore", DATABASE, Panel::Backups),
            ];
            for (i, (title, description, icon, panel)) in cards.into_iter().enumerate() {
                if i > 0 {
                    ui.add_space(spacing);
                }
                if dashboard_card(ui, title, description, icon, card_size).clicked() {
                    next_panel = Some(panel);
                }
            }
        });

        ui.add_space(30.0);
    });

    // Two-column layout: Quick Actions | Recent Activity
    let available_width = ui.available_width();
    let column_width = (available_width - 40.0) / 2.0;

    ui.horizontal(|ui| {
        ui.add_space(10.0);

        // Left column - Quick Actions
        ui.vertical(|ui| {
            ui.set_width(column_width);

            egui::Frame::new()
                .fill(ui.style().visuals.extreme_bg_color)
                .inner_margin(Margin::same(15))
                .corner_radius(CornerRadius::same(8))
                .show(ui, |ui| {
                    ui.set_min_width(column_width - 30.0);

                    ui.label(RichText::new("Quick Actions").strong());
                    ui.add_space(10.0);

                    if ui.button("New Diet").clicked() {
                        app.diet_form = DietForm::open_new();
                        next_panel = Some(Panel::Diets);
                    }

                    ui.add_space(5.0);

                    if ui.button("Pending Liquidations").clicked() {
                        app.diet_status_filter = Some(DietStatus::Pending);
                        next_panel = Some(Panel::Diets);
                    }

                    ui.add_space(5.0);

                    ui.add_enabled_ui(app.long_task.is_none(), |ui| {
                        if ui.button("Backup Now").clicked() {
                            app.create_backup();
                        }
                    });

                    if let Some(latest) = app.backups.first() {
                        ui.add_space(5.0);
                        ui.label(
                            RichText::new(format!(
                                "Last backup: {}",
                                latest.created_at.format("%Y-%m-%d %H:%M")
                            ))
                            .small()
                            .weak(),
                        );
                    }
                });
        });

        ui.add_space(20.0);

        // Right column - Recent Activity
        ui.vertical(|ui| {
            ui.set_width(column_width);

            egui::Frame::new()
                .fill(ui.style().visuals.extreme_bg_color)
                .inner_margin(Margin::same(15))
                .corner_radius(CornerRadius::same(8))
                .show(ui, |ui| {
                    ui.set_min_width(column_width - 30.0);

                    ui.horizontal(|ui| {
                        ui.label(RichText::new("Recent Activity").strong());
                        if !app.log_messages.is_empty() && ui.small_button("Clear").clicked() {
                            app.clear_log();
                        }
                    });
                    ui.add_space(10.0);

                    ScrollArea::vertical().max_height(150.0).show(ui, |ui| {
                        if app.log_messages.is_empty() {
                            ui.label(RichText::new("No recent activity").weak());
                        } else {
                            for entry in app.log_messages.iter().rev().take(10) {
                                let color = match entry.level {
                                    LogLevel::Info => Color32::GRAY,
                                    LogLevel::Success => Color32::from_rgb(100, 200, 100),
                                    LogLevel::Warning => Color32::from_rgb(230, 180, 50),
                                    LogLevel::Error => Color32::from_rgb(230, 100, 100),
                                };

                                ui.horizontal(|ui| {
                                    ui.label(
                                        RichText::new(entry.timestamp.format("%H:%M:%S").to_string())
                                            .small()
                                            .color(Color32::DARK_GRAY),
                                    );
                                    ui.label(RichText::new(&entry.message).color(color));
                                });
                            }
                        }
                    });
                });
        });
    });

    next_panel
}

/// Render a stat card with title, value, and subtitle.
fn stat_card(ui: &mut Ui, title: &str, value: &str, subtitle: &str) {
    egui::Frame::new()
        .fill(ui.style().visuals.extreme_bg_color)
        .inner_margin(Margin::same(15))
        .outer_margin(Margin::same(5))
        .corner_radius(CornerRadius::same(8))
        .show(ui, |ui| {
            ui.set_min_width(150.0);

            ui.vertical(|ui| {
                ui.label(RichText::new(title).small());
                ui.label(RichText::new(value).heading().strong());
                ui.label(RichText::new(subtitle).small().weak());
            });
        });
}
