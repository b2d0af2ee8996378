//! GUI panels and application state.

pub mod account_panel;
pub mod app;
pub mod backup_panel;
pub mod card_panel;
pub mod components;
pub mod dashboard;
pub mod department_panel;
pub mod diet_panel;
pub mod forms;
pub mod liquidation_panel;
pub mod login;
pub mod reports_panel;
pub mod requester_panel;
pub mod settings_panel;
pub mod setup_wizard;
pub mod user_panel;

pub use app::App;
pub use setup_wizard::{SetupApp, SetupWizard};
