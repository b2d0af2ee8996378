//! First-run setup wizard for configuration.

use std::path::{Path, PathBuf};
use std::sync::mpsc;

use eframe::egui::{self, RichText};

use super::components::colors;
use super::settings_panel::rates_grid;
use crate::config::AppConfig;
use crate::db;

/// Database check state.
#[derive(Default, Clone)]
pub enum ConnectionTestState {
    #[default]
    NotTested,
    Testing,
    Success(String),
    Failed(String),
}

/// Setup wizard state.
pub struct SetupWizard {
    /// Current step (0-4).
    pub current_step: usize,
    /// Configuration being built.
    pub config: AppConfig,
    /// Database open/create check state.
    pub db_test_state: ConnectionTestState,
    /// Wizard completed flag.
    pub completed: bool,
    database_input: String,
    backup_input: String,
    export_input: String,
}

impl Default for SetupWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl SetupWizard {
    pub fn new() -> Self {
        Self::from_config(AppConfig::default())
    }

    /// Start from an existing configuration, e.g. to change locations.
    pub fn from_config(config: AppConfig) -> Self {
        Self {
            current_step: 0,
            database_input: config.database.path.display().to_string(),
            backup_input: config.backup.directory.display().to_string(),
            export_input: config.export.directory.display().to_string(),
            config,
            db_test_state: ConnectionTestState::NotTested,
            completed: false,
        }
    }

    /// Check if user can proceed to next step.
    pub fn can_proceed(&self) -> bool {
        match self.current_step {
            0 => true,
            1 => !self.config.organization.name.trim().is_empty(),
            2 => self.validate_storage_step().is_ok() && matches!(self.db_test_state, ConnectionTestState::Success(_)),
            3 => self.config.validate().is_ok(),
            4 => true,
            _ => false,
        }
    }

    fn validate_storage_step(&self) -> Result<(), String> {
        if self.database_input.trim().is_empty() {
            return Err("Database file is required".to_string());
        }
        if self.backup_input.trim().is_empty() {
            return Err("Backup folder is required".to_string());
        }
        if self.export_input.trim().is_empty() {
            return Err("Export folder is required".to_string());
        }
        Ok(())
    }

    /// Copy the text inputs into the configuration.
    fn apply_storage_inputs(&mut self) {
        self.config.database.path = PathBuf::from(self.database_input.trim());
        self.config.backup.directory = PathBuf::from(self.backup_input.trim());
        self.config.export.directory = PathBuf::from(self.export_input.trim());
    }

    /// Get step title.
    fn step_title(&self) -> &'static str {
        match self.current_step {
            0 => "Welcome",
            1 => "Organization",
            2 => "Storage",
            3 => "Per-Diem Rates",
            4 => "Confirmation",
            _ => "Setup",
        }
    }

    /// Total number of steps.
    const TOTAL_STEPS: usize = 5;
}

/// Setup wizard application.
pub struct SetupApp {
    pub wizard: SetupWizard,
    pub initial_error: Option<String>,
    pub config_path: PathBuf,
    pub rt: tokio::runtime::Runtime,
    db_test_rx: Option<mpsc::Receiver<Result<String, String>>>,
}

impl SetupApp {
    pub fn new(
        wizard: SetupWizard,
        initial_error: Option<String>,
        config_path: PathBuf,
        rt: tokio::runtime::Runtime,
    ) -> Self {
        Self {
            wizard,
            initial_error,
            config_path,
            rt,
            db_test_rx: None,
        }
    }

    /// Open (or create) the chosen database file asynchronously.
    fn start_db_test(&mut self) {
        self.wizard.apply_storage_inputs();
        let path = self.wizard.config.resolve_paths(&self.config_path).database;
        let (tx, rx) = mpsc::channel();
        self.db_test_rx = Some(rx);
        self.wizard.db_test_state = ConnectionTestState::Testing;

        self.rt.spawn(async move {
            let result = test_database(&path).await;
            let _ = tx.send(result);
        });
    }

    /// Check for async test results.
    fn poll_test_results(&mut self) {
        if let Some(rx) = &self.db_test_rx
            && let Ok(result) = rx.try_recv()
        {
            self.wizard.db_test_state = match result {
                Ok(summary) => ConnectionTestState::Success(summary),
                Err(e) => ConnectionTestState::Failed(e),
            };
            self.db_test_rx = None;
        }
    }
}

impl eframe::App for SetupApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Poll async test results
        self.poll_test_results();

        // Request repaint while testing
        if matches!(self.wizard.db_test_state, ConnectionTestState::Testing) {
            ctx.request_repaint();
        }

        // Show initial error dialog
        if let Some(err) = self.initial_error.clone() {
            egui::Window::new("Configuration Error")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.colored_label(colors::ERROR, &err);
                    ui.add_space(10.0);
                    if ui.button("OK").clicked() {
                        self.initial_error = None;
                    }
                });
            return;
        }

        // Main wizard panel
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(20.0);

                // Header
                ui.horizontal(|ui| {
                    ui.heading(RichText::new("Dietas Manager Setup").size(24.0).strong());
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.label(format!(
                            "Step {} of {}",
                            self.wizard.current_step + 1,
                            SetupWizard::TOTAL_STEPS
                        ));
                    });
                });

                ui.separator();
                ui.add_space(10.0);

                // Step title
                ui.heading(self.wizard.step_title());
                ui.add_space(20.0);

                // Step content
                let needs_db_test = match self.wizard.current_step {
                    0 => {
                        show_welcome_step(ui);
                        false
                    }
                    1 => {
                        show_organization_step(ui, &mut self.wizard);
                        false
                    }
                    2 => show_storage_step(ui, &mut self.wizard, &self.config_path),
                    3 => {
                        show_rates_step(ui, &mut self.wizard);
                        false
                    }
                    4 => {
                        show_confirmation_step(ui, &self.wizard, &self.config_path);
                        false
                    }
                    _ => false,
                };

                if needs_db_test {
                    self.start_db_test();
                }

                ui.add_space(30.0);
                ui.separator();

                // Navigation buttons
                ui.horizontal(|ui| {
                    if self.wizard.current_step > 0 && ui.button("< Back").clicked() {
                        self.wizard.current_step -= 1;
                    }

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if self.wizard.current_step < SetupWizard::TOTAL_STEPS - 1 {
                            let btn_text = if self.wizard.current_step == 0 {
                                "Get Started >"
                            } else {
                                "Next >"
                            };
                            let enabled = self.wizard.can_proceed();
                            if ui.add_enabled(enabled, egui::Button::new(btn_text)).clicked() {
                                self.wizard.current_step += 1;
                            }
                        } else if ui.button("Save & Exit").clicked() {
                            self.wizard.completed = true;
                        }
                    });
                });
            });
        });

        // Handle completion
        if self.wizard.completed {
            self.wizard.apply_storage_inputs();
            let result = self
                .wizard
                .config
                .validate()
                .and_then(|()| self.wizard.config.save(&self.config_path));
            match result {
                Ok(()) => {
                    tracing::info!("Configuration written to {}", self.config_path.display());
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
                Err(e) => {
                    self.initial_error = Some(format!("Failed to save config: {e}"));
                    self.wizard.completed = false;
                }
            }
        }
    }
}

fn show_welcome_step(ui: &mut egui::Ui) {
    ui.label("Welcome to Dietas Manager!");
    ui.add_space(10.0);
    ui.label("This wizard will help you configure the application.");
    ui.add_space(20.0);
    ui.label("You will choose:");
    ui.add_space(5.0);
    ui.label("  - The organization name printed on reports");
    ui.label("  - Where the database, backups and exports are stored");
    ui.label("  - The per-diem rates for meals and lodging");
}

fn show_organization_step(ui: &mut egui::Ui, wizard: &mut SetupWizard) {
    egui::Grid::new("org_grid")
        .num_columns(2)
        .spacing([20.0, 8.0])
        .show(ui, |ui| {
            ui.label("Organization name:");
            ui.add(egui::TextEdit::singleline(&mut wizard.config.organization.name).desired_width(280.0));
            ui.end_row();
        });
}

fn show_storage_step(ui: &mut egui::Ui, wizard: &mut SetupWizard, config_path: &Path) -> bool {
    let mut needs_test = false;

    ui.label("Relative paths are stored next to the configuration file:");
    ui.label(RichText::new(config_path.display().to_string()).weak());
    ui.add_space(10.0);

    let mut changed = false;
    egui::Grid::new("storage_grid")
        .num_columns(3)
        .spacing([20.0, 8.0])
        .striped(true)
        .show(ui, |ui| {
            ui.label("Database file:");
            changed |= ui.text_edit_singleline(&mut wizard.database_input).changed();
            if ui.button("Browse...").clicked()
                && let Some(path) = rfd::FileDialog::new()
                    .add_filter("SQLite database", &["db", "sqlite"])
                    .set_file_name("dietas.db")
                    .save_file()
            {
                wizard.database_input = path.display().to_string();
                changed = true;
            }
            ui.end_row();

            ui.label("Backup folder:");
            changed |= ui.text_edit_singleline(&mut wizard.backup_input).changed();
            if ui.button("Browse...").clicked()
                && let Some(path) = rfd::FileDialog::new().pick_folder()
            {
                wizard.backup_input = path.display().to_string();
                changed = true;
            }
            ui.end_row();

            ui.label("Export folder:");
            changed |= ui.text_edit_singleline(&mut wizard.export_input).changed();
            if ui.button("Browse...").clicked()
                && let Some(path) = rfd::FileDialog::new().pick_folder()
            {
                wizard.export_input = path.display().to_string();
                changed = true;
            }
            ui.end_row();
        });

    if changed {
        wizard.apply_storage_inputs();
        wizard.db_test_state = ConnectionTestState::NotTested;
    }

    ui.add_space(20.0);

    if let Err(e) = wizard.validate_storage_step() {
        ui.colored_label(colors::ERROR, e);
        return false;
    }

    ui.horizontal(|ui| {
        let testing = matches!(wizard.db_test_state, ConnectionTestState::Testing);
        if ui.add_enabled(!testing, egui::Button::new("Open Database")).clicked() {
            needs_test = true;
        }

        ui.add_space(10.0);

        match &wizard.db_test_state {
            ConnectionTestState::NotTested => {
                ui.label("Not checked");
            }
            ConnectionTestState::Testing => {
                ui.spinner();
                ui.label("Opening...");
            }
            ConnectionTestState::Success(summary) => {
                ui.colored_label(colors::SUCCESS, summary);
            }
            ConnectionTestState::Failed(e) => {
                ui.colored_label(colors::ERROR, format!("Failed: {e}"));
            }
        }
    });

    needs_test
}

fn show_rates_step(ui: &mut egui::Ui, wizard: &mut SetupWizard) {
    ui.label("Amounts paid per meal and per lodging night.");
    ui.add_space(10.0);

    rates_grid(ui, &mut wizard.config.rates, "wizard_rates_grid");

    if let Err(e) = wizard.config.validate() {
        ui.add_space(10.0);
        ui.colored_label(colors::ERROR, e.to_string());
    }
}

fn show_confirmation_step(ui: &mut egui::Ui, wizard: &SetupWizard, config_path: &Path) {
    ui.label("Review your configuration:");
    ui.add_space(10.0);

    let paths = wizard.config.resolve_paths(config_path);

    egui::Frame::group(ui.style()).show(ui, |ui| {
        ui.heading("Organization");
        ui.label(format!("  {}", wizard.config.organization.name));
    });

    ui.add_space(10.0);

    egui::Frame::group(ui.style()).show(ui, |ui| {
        ui.heading("Storage");
        ui.label(format!("  Database: {}", paths.database.display()));
        ui.label(format!("  Backups: {}", paths.backups.display()));
        ui.label(format!("  Exports: {}", paths.exports.display()));
    });

    ui.add_space(10.0);

    egui::Frame::group(ui.style()).show(ui, |ui| {
        let rates = &wizard.config.rates;
        ui.heading("Rates");
        ui.label(format!("  Breakfast: {:.2}", rates.breakfast));
        ui.label(format!("  Lunch: {:.2}", rates.lunch));
        ui.label(format!("  Dinner: {:.2}", rates.dinner));
        ui.label(format!("  Lodging: {:.2}", rates.lodging));
    });

    ui.add_space(20.0);
    ui.label("Click 'Save & Exit' to save and close the wizard.");
    ui.label("Start the application again to begin working.");
}

/// Open or create the database and report what it holds.
async fn test_database(path: &Path) -> Result<String, String> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }

    let conn = db::connect(path).await.map_err(|e| e.to_string())?;
    let counts = match db::test_connection(&conn).await {
        Ok(()) => db::get_table_counts(&conn).await.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    let _ = conn.close().await;
    let counts = counts?;

    Ok(if counts.diets == 0 && counts.requesters == 0 {
        "Database ready (empty)".to_string()
    } else {
        format!("Database ready ({} requesters, {} diets)", counts.requesters, counts.diets)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wizard_steps_gate_progress() {
        let mut wizard = SetupWizard::new();
        assert!(wizard.can_proceed());

        wizard.current_step = 1;
        wizard.config.organization.name = " ".to_string();
        assert!(!wizard.can_proceed());
        wizard.config.organization.name = "Town Hall".to_string();
        assert!(wizard.can_proceed());

        wizard.current_step = 2;
        assert!(!wizard.can_proceed(), "database must be opened first");
        wizard.db_test_state = ConnectionTestState::Success("ok".to_string());
        assert!(wizard.can_proceed());
        wizard.backup_input.clear();
        assert!(!wizard.can_proceed());
    }

    #[test]
    fn test_apply_storage_inputs() {
        let mut wizard = SetupWizard::new();
        wizard.database_input = " data/dietas.db ".to_string();
        wizard.backup_input = "/mnt/backups".to_string();
        wizard.apply_storage_inputs();

        assert_eq!(wizard.config.database.path, PathBuf::from("data/dietas.db"));
        assert_eq!(wizard.config.backup.directory, PathBuf::from("/mnt/backups"));
    }

    #[tokio::test]
    async fn test_database_check_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dietas.db");

        let summary = test_database(&path).await.unwrap();
        assert!(summary.contains("empty"));
        assert!(path.is_file());
    }
}
