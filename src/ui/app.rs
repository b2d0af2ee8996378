//! Main application UI.

use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Local, NaiveDate};
use eframe::egui::{self, Align, Layout, RichText};
use sea_orm::DatabaseConnection;
use tokio::sync::mpsc;

use crate::backup::{BackupInfo, CycleOutcome, DatabaseService, RestoreOutcome, StartupState};
use crate::config::{AppConfig, AppPaths};
use crate::db::{self, TableCounts};
use crate::entities::{accounts, card_recharges, cards, departments, diets, liquidations, requesters, users};
use crate::export::{self, ExportFormat};
use crate::models::account::{CreateAccount, UpdateAccount};
use crate::models::card::{CreateCard, CreateRecharge, UpdateCard};
use crate::models::department::{CreateDepartment, UpdateDepartment};
use crate::models::diet::{CreateDiet, DietStatus, UpdateDiet};
use crate::models::liquidation::CreateLiquidation;
use crate::models::requester::{CreateRequester, UpdateRequester};
use crate::models::user::{CreateUser, Role, UpdateUser};
use crate::report::{self, ReportKind, ReportParams, TableData};

use super::components::colors;
use super::forms::{
    CardForm, CodeNameForm, DietForm, LiquidationForm, RechargeForm, RequesterForm, UserForm,
};
use super::{
    account_panel, backup_panel, card_panel, dashboard, department_panel, diet_panel, liquidation_panel, login,
    reports_panel, requester_panel, settings_panel, user_panel,
};

/// Current panel being displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Panel {
    #[default]
    Dashboard,
    Departments,
    Accounts,
    Requesters,
    Cards,
    Diets,
    Liquidations,
    Reports,
    Backups,
    Users,
    Settings,
}

impl Panel {
    /// Get the display name for the panel.
    pub fn name(&self) -> &'static str {
        match self {
            Panel::Dashboard => "Dashboard",
            Panel::Departments => "Departments",
            Panel::Accounts => "Accounts",
            Panel::Requesters => "Requesters",
            Panel::Cards => "Cards",
            Panel::Diets => "Diets",
            Panel::Liquidations => "Liquidations",
            Panel::Reports => "Reports",
            Panel::Backups => "Backups",
            Panel::Users => "Users",
            Panel::Settings => "Settings",
        }
    }
}

/// Cached data sets that can be reloaded after a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Departments,
    Accounts,
    Requesters,
    Cards,
    Users,
    Diets,
    Liquidations,
}

/// Who is using the application.
#[derive(Debug, Clone, Default)]
pub enum AuthState {
    /// Waiting for the user count.
    #[default]
    Checking,
    /// Users exist and nobody has logged in yet.
    LoginRequired,
    /// No users are defined; everything is allowed.
    Open,
    LoggedIn(users::Model),
}

/// Messages from async tasks to UI.
pub enum UiMessage {
    // Data loading
    DepartmentsLoaded(Vec<departments::Model>),
    AccountsLoaded(Vec<accounts::Model>),
    RequestersLoaded(Vec<requesters::Model>),
    CardsLoaded(Vec<cards::Model>),
    RechargesLoaded(i32, Vec<card_recharges::Model>),
    UsersLoaded(Vec<users::Model>),
    DietsLoaded(Vec<diets::Model>),
    LiquidationsLoaded(Vec<liquidations::Model>),
    CountsLoaded(TableCounts),
    LoadError(String),

    // Login
    UserCountLoaded(u64),
    LoggedIn(users::Model),
    LoginFailed(String),

    // CRUD operations
    Saved { message: String, reload: Vec<DataKind> },
    OperationFailed(String),

    // Reports
    ReportReady(TableData),

    // Database maintenance
    BackupsListed(Vec<BackupInfo>),
    BackupCreated { backup: BackupInfo, pruned: usize },
    RestoreFinished(RestoreOutcome),
    CycleFinished(CycleOutcome),
    Reconnected(DatabaseConnection),
    TaskFailed(String),
}

/// Log level for UI messages.
#[derive(Clone, Copy, Debug)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Log entry for display in the UI.
#[derive(Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
    pub level: LogLevel,
}

/// Target for delete confirmation dialog.
#[derive(Clone)]
pub enum DeleteTarget {
    Department(i32, String),
    Account(i32, String),
    Requester(i32, String),
    Card(i32, String),
    Recharge(i32, String),
    User(i32, String),
    Diet(i32, String),
    Liquidation(i32, String),
    Backup(PathBuf, String),
}

/// Actions that need an explicit confirmation besides deletes.
#[derive(Clone)]
pub enum ConfirmAction {
    CancelDiet(i32, String),
    Restore(PathBuf, String),
    NewCycle(String),
}

/// Filter state for reports.
#[derive(Clone)]
pub struct ReportFilter {
    pub kind: ReportKind,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub department_id: Option<i32>,
}

impl Default for ReportFilter {
    fn default() -> Self {
        let today = Local::now().date_naive();
        Self {
            kind: ReportKind::default(),
            start_date: today.with_day(1).unwrap_or(today),
            end_date: today,
            department_id: None,
        }
    }
}

impl ReportFilter {
    pub fn params(&self) -> ReportParams {
        ReportParams {
            start_date: self.start_date,
            end_date: self.end_date,
            department_id: self.department_id,
            as_of: Local::now().date_naive(),
        }
    }
}

/// Main application state.
pub struct App {
    // Runtime and database
    pub rt: tokio::runtime::Runtime,
    pub pool: DatabaseConnection,
    pub service: DatabaseService,
    pub paths: AppPaths,

    // Message channel for async communication
    pub tx: mpsc::UnboundedSender<UiMessage>,
    pub rx: mpsc::UnboundedReceiver<UiMessage>,

    // Navigation
    pub current_panel: Panel,

    // Session
    pub auth: AuthState,
    pub login_username: String,
    pub login_password: String,
    pub login_error: Option<String>,

    // Cached data
    pub departments: Vec<departments::Model>,
    pub accounts: Vec<accounts::Model>,
    pub requesters: Vec<requesters::Model>,
    pub cards: Vec<cards::Model>,
    pub recharges: Vec<card_recharges::Model>,
    pub recharges_card_id: Option<i32>,
    pub users: Vec<users::Model>,
    pub diets: Vec<diets::Model>,
    pub liquidations: Vec<liquidations::Model>,
    pub counts: TableCounts,
    pub backups: Vec<BackupInfo>,

    // Forms
    pub department_form: CodeNameForm,
    pub account_form: CodeNameForm,
    pub requester_form: RequesterForm,
    pub card_form: CardForm,
    pub recharge_form: RechargeForm,
    pub user_form: UserForm,
    pub diet_form: DietForm,
    pub liquidation_form: LiquidationForm,

    // Search/filter state
    pub requester_search: String,
    pub requester_dept_filter: Option<i32>,
    pub diet_search: String,
    pub diet_status_filter: Option<DietStatus>,
    pub report_filter: ReportFilter,
    pub report: Option<TableData>,

    // Database maintenance
    pub backup_description: String,
    pub cycle_name: String,

    // Long-running task shown in a modal window
    pub long_task: Option<String>,
    /// Set once the live database was replaced; only closing the application is allowed.
    pub blocked: Option<String>,

    // Log messages
    pub log_messages: Vec<LogEntry>,

    // Configuration
    pub config: AppConfig,
    pub config_path: PathBuf,
    pub config_modified: bool,

    // Dialogs
    pub show_delete_confirm: bool,
    pub delete_target: Option<DeleteTarget>,
    pub confirm_action: Option<ConfirmAction>,
    pub error_message: Option<String>,
    pub success_message: Option<String>,
    pub warning_message: Option<String>,
}

impl App {
    pub fn new(
        pool: DatabaseConnection,
        config: AppConfig,
        config_path: PathBuf,
        rt: tokio::runtime::Runtime,
        startup: StartupState,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let paths = config.resolve_paths(&config_path);
        let service = DatabaseService::from_paths(&paths);

        let warning_message = match startup {
            StartupState::RecoveredRestore => Some(
                "The last database restore did not finish. The database from before it was put back."
                    .to_string(),
            ),
            StartupState::InterruptedRestore => Some(
                "The last database restore did not finish before the database was replaced. Nothing was changed."
                    .to_string(),
            ),
            StartupState::Clean | StartupState::RestartCompleted => None,
        };

        let mut app = Self {
            rt,
            pool,
            service,
            paths,
            tx,
            rx,
            current_panel: Panel::default(),
            auth: AuthState::default(),
            login_username: String::new(),
            login_password: String::new(),
            login_error: None,
            departments: Vec::new(),
            accounts: Vec::new(),
            requesters: Vec::new(),
            cards: Vec::new(),
            recharges: Vec::new(),
            recharges_card_id: None,
            users: Vec::new(),
            diets: Vec::new(),
            liquidations: Vec::new(),
            counts: TableCounts::default(),
            backups: Vec::new(),
            department_form: CodeNameForm::default(),
            account_form: CodeNameForm::default(),
            requester_form: RequesterForm::default(),
            card_form: CardForm::default(),
            recharge_form: RechargeForm::default(),
            user_form: UserForm::default(),
            diet_form: DietForm::default(),
            liquidation_form: LiquidationForm::default(),
            requester_search: String::new(),
            requester_dept_filter: None,
            diet_search: String::new(),
            diet_status_filter: None,
            report_filter: ReportFilter::default(),
            report: None,
            backup_description: String::new(),
            cycle_name: String::new(),
            long_task: None,
            blocked: None,
            log_messages: Vec::new(),
            config,
            config_path,
            config_modified: false,
            show_delete_confirm: false,
            delete_target: None,
            confirm_action: None,
            error_message: None,
            success_message: None,
            warning_message,
        };

        if startup == StartupState::RestartCompleted {
            app.log_success("Database restore completed before this start");
        }

        // Load initial data
        app.check_users();
        app.load_all();
        app.load_backups();

        app
    }

    /// Log a message to the UI log.
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.log_messages.push(LogEntry {
            timestamp: Local::now(),
            message: message.into(),
            level,
        });

        // Keep only last 100 messages
        if self.log_messages.len() > 100 {
            self.log_messages.remove(0);
        }
    }

    /// Log an info message.
    pub fn log_info(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    /// Log a success message.
    pub fn log_success(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Success, message);
    }

    /// Log a warning message.
    pub fn log_warning(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    /// Log an error message.
    pub fn log_error(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Whether the current session may manage users, restore and rotate cycles.
    pub fn is_admin(&self) -> bool {
        match &self.auth {
            AuthState::Open => true,
            AuthState::LoggedIn(user) => user.role == Role::Admin.as_str(),
            _ => false,
        }
    }

    pub fn session_name(&self) -> Option<&str> {
        match &self.auth {
            AuthState::LoggedIn(user) => Some(user.full_name.as_str()),
            _ => None,
        }
    }

    /// Spawn a database task whose result is sent back as a message.
    fn spawn_db<F, Fut>(&self, task: F)
    where
        F: FnOnce(DatabaseConnection) -> Fut + Send + 'static,
        Fut: Future<Output = UiMessage> + Send + 'static,
    {
        let pool = self.pool.clone();
        let tx = self.tx.clone();

        self.rt.spawn(async move {
            let _ = tx.send(task(pool).await);
        });
    }

    /// Run a write operation; success reloads the given data sets.
    fn run_write<F, Fut>(&self, reload: &[DataKind], task: F)
    where
        F: FnOnce(DatabaseConnection) -> Fut + Send + 'static,
        Fut: Future<Output = Result<String, String>> + Send + 'static,
    {
        let reload = reload.to_vec();
        self.spawn_db(move |pool| async move {
            match task(pool).await {
                Ok(message) => UiMessage::Saved { message, reload },
                Err(e) => UiMessage::OperationFailed(e),
            }
        });
    }

    // ===== Loading =====

    pub fn load_all(&mut self) {
        for kind in [
            DataKind::Departments,
            DataKind::Accounts,
            DataKind::Requesters,
            DataKind::Cards,
            DataKind::Users,
            DataKind::Diets,
            DataKind::Liquidations,
        ] {
            self.reload(kind);
        }
    }

    /// Reload one cached data set; table counts are refreshed with it.
    pub fn reload(&mut self, kind: DataKind) {
        match kind {
            DataKind::Departments => self.spawn_db(|pool| async move {
                match db::department::list_all(&pool).await {
                    Ok(list) => UiMessage::DepartmentsLoaded(list),
                    Err(e) => UiMessage::LoadError(e.to_string()),
                }
            }),
            DataKind::Accounts => self.spawn_db(|pool| async move {
                match db::account::list_all(&pool).await {
                    Ok(list) => UiMessage::AccountsLoaded(list),
                    Err(e) => UiMessage::LoadError(e.to_string()),
                }
            }),
            DataKind::Requesters => self.spawn_db(|pool| async move {
                match db::requester::list_all(&pool).await {
                    Ok(list) => UiMessage::RequestersLoaded(list),
                    Err(e) => UiMessage::LoadError(e.to_string()),
                }
            }),
            DataKind::Cards => {
                self.spawn_db(|pool| async move {
                    match db::card::list_all(&pool).await {
                        Ok(list) => UiMessage::CardsLoaded(list),
                        Err(e) => UiMessage::LoadError(e.to_string()),
                    }
                });
                if let Some(card_id) = self.recharges_card_id {
                    self.load_recharges(card_id);
                }
            }
            DataKind::Users => self.spawn_db(|pool| async move {
                match db::user::list_all(&pool).await {
                    Ok(list) => UiMessage::UsersLoaded(list),
                    Err(e) => UiMessage::LoadError(e.to_string()),
                }
            }),
            DataKind::Diets => self.spawn_db(|pool| async move {
                match db::diet::list_all(&pool).await {
                    Ok(list) => UiMessage::DietsLoaded(list),
                    Err(e) => UiMessage::LoadError(e.to_string()),
                }
            }),
            DataKind::Liquidations => self.spawn_db(|pool| async move {
                match db::liquidation::list_all(&pool).await {
                    Ok(list) => UiMessage::LiquidationsLoaded(list),
                    Err(e) => UiMessage::LoadError(e.to_string()),
                }
            }),
        }

        self.spawn_db(|pool| async move {
            match db::get_table_counts(&pool).await {
                Ok(counts) => UiMessage::CountsLoaded(counts),
                Err(e) => UiMessage::LoadError(e.to_string()),
            }
        });
    }

    pub fn load_recharges(&mut self, card_id: i32) {
        self.recharges_card_id = Some(card_id);
        self.spawn_db(move |pool| async move {
            match db::card::list_recharges(&pool, card_id).await {
                Ok(list) => UiMessage::RechargesLoaded(card_id, list),
                Err(e) => UiMessage::LoadError(e.to_string()),
            }
        });
    }

    // ===== Session =====

    fn check_users(&mut self) {
        self.spawn_db(|pool| async move {
            match db::user::count(&pool).await {
                Ok(count) => UiMessage::UserCountLoaded(count),
                Err(e) => UiMessage::LoadError(e.to_string()),
            }
        });
    }

    pub fn login(&mut self) {
        let username = self.login_username.clone();
        let password = std::mem::take(&mut self.login_password);

        self.spawn_db(move |pool| async move {
            match db::user::authenticate(&pool, &username, &password).await {
                Ok(Some(user)) => UiMessage::LoggedIn(user),
                Ok(None) => UiMessage::LoginFailed("Invalid username or password".to_string()),
                Err(e) => UiMessage::LoginFailed(e.to_string()),
            }
        });
    }

    pub fn logout(&mut self) {
        if let AuthState::LoggedIn(user) = &self.auth {
            tracing::info!("User {} logged out", user.username);
        }
        self.auth = AuthState::Checking;
        self.current_panel = Panel::Dashboard;
        self.login_password.clear();
        self.check_users();
    }

    // ===== Departments and accounts =====

    pub fn create_department(&mut self, data: CreateDepartment) {
        self.run_write(&[DataKind::Departments], move |pool| async move {
            if db::department::code_exists(&pool, &data.code, None).await.map_err(|e| e.to_string())? {
                return Err(format!("Department code '{}' already exists", data.code));
            }
            let dept = db::department::create(&pool, data).await.map_err(|e| e.to_string())?;
            Ok(format!("Department '{}' saved", dept.name))
        });
    }

    pub fn update_department(&mut self, id: i32, data: UpdateDepartment) {
        self.run_write(&[DataKind::Departments], move |pool| async move {
            if let Some(code) = &data.code
                && db::department::code_exists(&pool, code, Some(id)).await.map_err(|e| e.to_string())?
            {
                return Err(format!("Department code '{code}' already exists"));
            }
            match db::department::update(&pool, id, data).await.map_err(|e| e.to_string())? {
                Some(dept) => Ok(format!("Department '{}' saved", dept.name)),
                None => Err("Department not found".to_string()),
            }
        });
    }

    pub fn create_account(&mut self, data: CreateAccount) {
        self.run_write(&[DataKind::Accounts], move |pool| async move {
            if db::account::code_exists(&pool, &data.code, None).await.map_err(|e| e.to_string())? {
                return Err(format!("Account code '{}' already exists", data.code));
            }
            let account = db::account::create(&pool, data).await.map_err(|e| e.to_string())?;
            Ok(format!("Account '{}' saved", account.name))
        });
    }

    pub fn update_account(&mut self, id: i32, data: UpdateAccount) {
        self.run_write(&[DataKind::Accounts], move |pool| async move {
            if let Some(code) = &data.code
                && db::account::code_exists(&pool, code, Some(id)).await.map_err(|e| e.to_string())?
            {
                return Err(format!("Account code '{code}' already exists"));
            }
            match db::account::update(&pool, id, data).await.map_err(|e| e.to_string())? {
                Some(account) => Ok(format!("Account '{}' saved", account.name)),
                None => Err("Account not found".to_string()),
            }
        });
    }

    // ===== Requesters =====

    pub fn create_requester(&mut self, data: CreateRequester) {
        self.run_write(&[DataKind::Requesters], move |pool| async move {
            if db::requester::identity_exists(&pool, &data.identity_number, None)
                .await
                .map_err(|e| e.to_string())?
            {
                return Err(format!("Identity number '{}' is already registered", data.identity_number));
            }
            let requester = db::requester::create(&pool, data).await.map_err(|e| e.to_string())?;
            Ok(format!("Requester '{}' saved", requester.full_name))
        });
    }

    pub fn update_requester(&mut self, id: i32, data: UpdateRequester) {
        self.run_write(&[DataKind::Requesters], move |pool| async move {
            if let Some(identity) = &data.identity_number
                && db::requester::identity_exists(&pool, identity, Some(id))
                    .await
                    .map_err(|e| e.to_string())?
            {
                return Err(format!("Identity number '{identity}' is already registered"));
            }
            match db::requester::update(&pool, id, data).await.map_err(|e| e.to_string())? {
                Some(requester) => Ok(format!("Requester '{}' saved", requester.full_name)),
                None => Err("Requester not found".to_string()),
            }
        });
    }

    // ===== Cards =====

    pub fn create_card(&mut self, data: CreateCard) {
        self.run_write(&[DataKind::Cards], move |pool| async move {
            if db::card::number_exists(&pool, &data.card_number, None)
                .await
                .map_err(|e| e.to_string())?
            {
                return Err(format!("Card '{}' already exists", data.card_number));
            }
            let card = db::card::create(&pool, data).await.map_err(|e| e.to_string())?;
            Ok(format!("Card '{}' saved", card.card_number))
        });
    }

    pub fn update_card(&mut self, id: i32, data: UpdateCard) {
        self.run_write(&[DataKind::Cards], move |pool| async move {
            if let Some(number) = &data.card_number
                && db::card::number_exists(&pool, number, Some(id)).await.map_err(|e| e.to_string())?
            {
                return Err(format!("Card '{number}' already exists"));
            }
            match db::card::update(&pool, id, data).await.map_err(|e| e.to_string())? {
                Some(card) => Ok(format!("Card '{}' saved", card.card_number)),
                None => Err("Card not found".to_string()),
            }
        });
    }

    pub fn recharge_card(&mut self, data: CreateRecharge) {
        self.run_write(&[DataKind::Cards], move |pool| async move {
            let recharge = db::card::recharge(&pool, data).await.map_err(|e| e.to_string())?;
            Ok(format!("Card recharged with {:.2}", recharge.amount))
        });
    }

    // ===== Users =====

    pub fn create_user(&mut self, data: CreateUser) {
        self.run_write(&[DataKind::Users], move |pool| async move {
            let user = db::user::create(&pool, data).await.map_err(|e| e.to_string())?;
            Ok(format!("User '{}' saved", user.username))
        });
    }

    pub fn update_user(&mut self, id: i32, data: UpdateUser) {
        self.run_write(&[DataKind::Users], move |pool| async move {
            match db::user::update(&pool, id, data).await.map_err(|e| e.to_string())? {
                Some(user) => Ok(format!("User '{}' saved", user.username)),
                None => Err("User not found".to_string()),
            }
        });
    }

    // ===== Diets and liquidations =====

    pub fn create_diet(&mut self, data: CreateDiet) {
        let rates = self.config.rates;
        self.run_write(&[DataKind::Diets, DataKind::Cards], move |pool| async move {
            let diet = db::diet::create(&pool, &rates, data).await.map_err(|e| e.to_string())?;
            Ok(format!("Diet {} requested for {:.2}", diet.number, diet.amount))
        });
    }

    pub fn update_diet(&mut self, id: i32, data: UpdateDiet) {
        self.run_write(&[DataKind::Diets], move |pool| async move {
            match db::diet::update(&pool, id, data).await.map_err(|e| e.to_string())? {
                Some(diet) => Ok(format!("Diet {} saved", diet.number)),
                None => Err("Diet not found".to_string()),
            }
        });
    }

    pub fn cancel_diet(&mut self, id: i32) {
        self.run_write(&[DataKind::Diets, DataKind::Cards], move |pool| async move {
            let diet = db::diet::cancel(&pool, id).await.map_err(|e| e.to_string())?;
            Ok(format!("Diet {} cancelled", diet.number))
        });
    }

    pub fn create_liquidation(&mut self, data: CreateLiquidation) {
        self.run_write(
            &[DataKind::Liquidations, DataKind::Diets, DataKind::Cards],
            move |pool| async move {
                let liquidation = db::liquidation::create(&pool, data).await.map_err(|e| e.to_string())?;
                Ok(format!(
                    "Liquidation saved: returned {:.2}, reimbursed {:.2}",
                    liquidation.amount_returned, liquidation.amount_reimbursed
                ))
            },
        );
    }

    /// Delete the given record.
    fn delete(&mut self, target: DeleteTarget) {
        match target {
            DeleteTarget::Department(id, name) => self.run_write(&[DataKind::Departments], move |pool| async move {
                delete_result(db::department::delete(&pool, id).await, &name)
            }),
            DeleteTarget::Account(id, name) => self.run_write(&[DataKind::Accounts], move |pool| async move {
                delete_result(db::account::delete(&pool, id).await, &name)
            }),
            DeleteTarget::Requester(id, name) => self.run_write(&[DataKind::Requesters], move |pool| async move {
                delete_result(db::requester::delete(&pool, id).await, &name)
            }),
            DeleteTarget::Card(id, name) => self.run_write(&[DataKind::Cards], move |pool| async move {
                delete_result(db::card::delete(&pool, id).await, &name)
            }),
            DeleteTarget::Recharge(id, name) => self.run_write(&[DataKind::Cards], move |pool| async move {
                db::card::delete_recharge(&pool, id)
                    .await
                    .map(|()| format!("{name} deleted"))
                    .map_err(|e| e.to_string())
            }),
            DeleteTarget::User(id, name) => self.run_write(&[DataKind::Users], move |pool| async move {
                delete_result(db::user::delete(&pool, id).await, &name)
            }),
            DeleteTarget::Diet(id, name) => {
                self.run_write(&[DataKind::Diets, DataKind::Cards], move |pool| async move {
                    delete_result(db::diet::delete(&pool, id).await, &name)
                })
            }
            DeleteTarget::Liquidation(id, name) => self.run_write(
                &[DataKind::Liquidations, DataKind::Diets, DataKind::Cards],
                move |pool| async move { delete_result(db::liquidation::delete(&pool, id).await, &name) },
            ),
            DeleteTarget::Backup(path, name) => match self.service.delete_backup(&path) {
                Ok(()) => {
                    self.log_success(format!("Deleted backup {name}"));
                    self.load_backups();
                }
                Err(e) => {
                    self.error_message = Some(e.to_string());
                    self.log_error(e.to_string());
                }
            },
        }
    }

    // ===== Reports and export =====

    pub fn generate_report(&mut self) {
        let kind = self.report_filter.kind;
        let params = self.report_filter.params();
        self.long_task = Some(format!("Generating {}...", kind.label().to_lowercase()));

        self.spawn_db(move |pool| async move {
            match report::generate(&pool, kind, &params).await {
                Ok(table) => UiMessage::ReportReady(table),
                Err(e) => UiMessage::TaskFailed(e.to_string()),
            }
        });
    }

    /// Export the current report to a file chosen by the user.
    pub fn export_report(&mut self, format: ExportFormat) {
        let Some(table) = self.report.clone() else {
            self.error_message = Some("Generate a report first".to_string());
            return;
        };

        let filename = export::generate_export_filename(self.report_filter.kind.file_prefix(), format.extension());
        let Some(path) = export::show_save_dialog(&self.paths.exports, &filename, format) else {
            return;
        };

        match export::export_table(&table, &path, format) {
            Ok(()) => {
                self.success_message = Some(format!("Exported to: {}", path.display()));
                self.log_success(format!("Exported {}: {}", table.title, path.display()));
            }
            Err(e) => {
                self.error_message = Some(format!("Export failed: {e}"));
                self.log_error(format!("Export failed: {e}"));
            }
        }
    }

    // ===== Database maintenance =====

    pub fn load_backups(&mut self) {
        match self.service.list_backups() {
            Ok(list) => self.backups = list,
            Err(e) => self.log_error(format!("Could not list backups: {e}")),
        }
    }

    pub fn create_backup(&mut self) {
        let description = std::mem::take(&mut self.backup_description);
        let keep_last = self.config.backup.keep_last as usize;
        let service = self.service.clone();
        let tx = self.tx.clone();
        self.long_task = Some("Creating backup...".to_string());

        self.rt.spawn(async move {
            let msg = match service.create_backup(&description).await {
                Ok(backup) => {
                    let pruned = match service.prune_backups(keep_last) {
                        Ok(removed) => removed.len(),
                        Err(e) => {
                            tracing::warn!("Backup pruning failed: {e}");
                            0
                        }
                    };
                    UiMessage::BackupCreated { backup, pruned }
                }
                Err(e) => UiMessage::TaskFailed(format!("Backup failed: {e}")),
            };
            let _ = tx.send(msg);
        });
    }

    /// Close the pool, restore the backup, and reopen the database if the restore did not complete.
    pub fn restore_backup(&mut self, path: PathBuf) {
        let pool = self.pool.clone();
        let service = self.service.clone();
        let tx = self.tx.clone();
        self.long_task = Some("Restoring database...".to_string());

        self.rt.spawn(async move {
            if let Err(e) = pool.close().await {
                tracing::warn!("Closing the database before restore: {e}");
            }

            let outcome = service.restore_backup(&path).await;
            let reopen = matches!(outcome, RestoreOutcome::Rejected { .. } | RestoreOutcome::RolledBack { .. });
            let _ = tx.send(UiMessage::RestoreFinished(outcome));

            if reopen {
                reconnect(service.database_path(), &tx).await;
            }
        });
    }

    pub fn start_new_cycle(&mut self, name: String) {
        let pool = self.pool.clone();
        let service = self.service.clone();
        let tx = self.tx.clone();
        self.long_task = Some(format!("Starting cycle '{name}'..."));

        self.rt.spawn(async move {
            if let Err(e) = pool.close().await {
                tracing::warn!("Closing the database before new cycle: {e}");
            }

            let reopen = match service.start_new_cycle(&name).await {
                Ok(outcome) => {
                    let reopen = matches!(
                        outcome.restore,
                        RestoreOutcome::Rejected { .. } | RestoreOutcome::RolledBack { .. }
                    );
                    let _ = tx.send(UiMessage::CycleFinished(outcome));
                    reopen
                }
                Err(e) => {
                    let _ = tx.send(UiMessage::TaskFailed(format!("New cycle failed: {e}")));
                    true
                }
            };

            if reopen {
                reconnect(service.database_path(), &tx).await;
            }
        });
    }

    /// Save configuration to its file.
    pub fn save_config(&mut self) {
        if let Err(e) = self.config.validate() {
            self.error_message = Some(e.to_string());
            return;
        }

        match self.config.save(&self.config_path) {
            Ok(()) => {
                self.config_modified = false;
                self.success_message = Some("Settings saved".to_string());
                self.log_success("Settings saved");
                tracing::info!("Configuration saved to {}", self.config_path.display());
            }
            Err(e) => {
                tracing::error!("Failed to save config: {}", e);
                self.error_message = Some(format!("Failed to save settings: {e}"));
            }
        }
    }

    /// Clear the activity log.
    pub fn clear_log(&mut self) {
        self.log_messages.clear();
    }

    fn handle_restore_outcome(&mut self, outcome: &RestoreOutcome) {
        match outcome {
            RestoreOutcome::Restored { .. } => {
                self.log_success(outcome.message());
                self.blocked = Some(outcome.message());
            }
            RestoreOutcome::Unrecoverable { .. } => {
                self.log_error(outcome.message());
                self.blocked = Some(outcome.message());
            }
            RestoreOutcome::Rejected { .. } | RestoreOutcome::RolledBack { .. } => {
                self.log_error(outcome.message());
                self.error_message = Some(outcome.message());
            }
        }
        self.load_backups();
    }

    /// Poll async operation results.
    fn poll_async_results(&mut self) {
        // Poll UiMessage channel
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                UiMessage::DepartmentsLoaded(list) => self.departments = list,
                UiMessage::AccountsLoaded(list) => self.accounts = list,
                UiMessage::RequestersLoaded(list) => self.requesters = list,
                UiMessage::CardsLoaded(list) => self.cards = list,
                UiMessage::RechargesLoaded(card_id, list) => {
                    if self.recharges_card_id == Some(card_id) {
                        self.recharges = list;
                    }
                }
                UiMessage::UsersLoaded(list) => self.users = list,
                UiMessage::DietsLoaded(list) => self.diets = list,
                UiMessage::LiquidationsLoaded(list) => self.liquidations = list,
                UiMessage::CountsLoaded(counts) => self.counts = counts,
                UiMessage::LoadError(e) => {
                    self.error_message = Some(e.clone());
                    self.log_error(e);
                }
                UiMessage::UserCountLoaded(count) => {
                    // The first user created in an open session takes effect at the next login
                    if count == 0 {
                        self.auth = AuthState::Open;
                    } else if matches!(self.auth, AuthState::Checking) {
                        self.auth = AuthState::LoginRequired;
                    }
                }
                UiMessage::LoggedIn(user) => {
                    tracing::info!("User {} logged in", user.username);
                    self.log_info(format!("Logged in as {}", user.full_name));
                    self.login_error = None;
                    self.auth = AuthState::LoggedIn(user);
                }
                UiMessage::LoginFailed(e) => {
                    tracing::warn!("Login failed for '{}'", self.login_username);
                    self.login_error = Some(e);
                }
                UiMessage::Saved { message, reload } => {
                    self.success_message = Some(message.clone());
                    self.log_success(message);
                    self.close_forms();
                    for kind in reload {
                        self.reload(kind);
                    }
                }
                UiMessage::OperationFailed(e) => {
                    self.error_message = Some(e.clone());
                    self.log_error(e);
                }
                UiMessage::ReportReady(table) => {
                    self.long_task = None;
                    self.log_info(format!("{}: {} rows", table.title, table.row_count()));
                    self.report = Some(table);
                }
                UiMessage::BackupsListed(list) => self.backups = list,
                UiMessage::BackupCreated { backup, pruned } => {
                    self.long_task = None;
                    let mut message = format!("Backup created: {} ({})", backup.file_name, backup.size_display());
                    if pruned > 0 {
                        message.push_str(&format!(", {pruned} old backup(s) removed"));
                    }
                    self.success_message = Some(message.clone());
                    self.log_success(message);
                    self.load_backups();
                }
                UiMessage::RestoreFinished(outcome) => {
                    self.long_task = None;
                    self.handle_restore_outcome(&outcome);
                }
                UiMessage::CycleFinished(outcome) => {
                    self.long_task = None;
                    self.log_info(format!(
                        "Cycle archive {}, clean copy {}",
                        outcome.archive.file_name,
                        outcome.clean_copy.display()
                    ));
                    self.handle_restore_outcome(&outcome.restore);
                }
                UiMessage::Reconnected(pool) => {
                    self.pool = pool;
                    self.log_info("Database reopened");
                    self.load_all();
                }
                UiMessage::TaskFailed(e) => {
                    self.long_task = None;
                    self.error_message = Some(e.clone());
                    self.log_error(e);
                }
            }
        }
    }

    fn close_forms(&mut self) {
        self.department_form.reset();
        self.account_form.reset();
        self.requester_form.reset();
        self.card_form.reset();
        self.recharge_form.reset();
        self.user_form.reset();
        self.diet_form.reset();
        self.liquidation_form.reset();
    }

    /// Render menu bar.
    fn show_menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::MenuBar::new().ui(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Backup Now").clicked() {
                        self.create_backup();
                        ui.close();
                    }
                    if ui.button("Backups...").clicked() {
                        self.current_panel = Panel::Backups;
                        ui.close();
                    }
                    ui.separator();
                    if ui.button("Exit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                        ui.close();
                    }
                });
                ui.menu_button("Records", |ui| {
                    for panel in [
                        Panel::Departments,
                        Panel::Accounts,
                        Panel::Requesters,
                        Panel::Cards,
                        Panel::Diets,
                        Panel::Liquidations,
                        Panel::Reports,
                    ] {
                        if ui.button(panel.name()).clicked() {
                            self.current_panel = panel;
                            ui.close();
                        }
                    }
                });
                ui.menu_button("Settings", |ui| {
                    if ui.button("General").clicked() {
                        self.current_panel = Panel::Settings;
                        ui.close();
                    }
                    if ui.add_enabled(self.is_admin(), egui::Button::new("Users")).clicked() {
                        self.current_panel = Panel::Users;
                        ui.close();
                    }
                    if matches!(self.auth, AuthState::LoggedIn(_)) {
                        ui.separator();
                        if ui.button("Log Out").clicked() {
                            self.logout();
                            ui.close();
                        }
                    }
                });
            });
        });
    }

    /// Render status bar (display only, no interaction).
    fn show_status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar")
            .min_height(28.0)
            .show(ctx, |ui| {
                ui.disable();
                ui.horizontal(|ui| {
                    ui.label(format!("Database: {}", self.paths.database.display()));
                    ui.separator();
                    ui.label(&self.config.organization.name);

                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        if let Some(name) = self.session_name() {
                            ui.colored_label(colors::SUCCESS, format!("User: {name}"));
                        }
                        if let Some(task) = &self.long_task {
                            ui.label(task);
                            ui.spinner();
                        }
                    });
                });
            });
    }

    /// Block the window while a long task runs.
    fn show_long_task(&self, ctx: &egui::Context) {
        if let Some(task) = &self.long_task {
            egui::Modal::new(egui::Id::new("long_task_modal")).show(ctx, |ui| {
                ui.set_min_width(280.0);
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(task);
                });
                ui.add(egui::ProgressBar::new(0.0).animate(true).desired_width(260.0));
            });
        }
    }

    /// Render modal dialogs (error, success, warning, confirmations).
    fn show_dialogs(&mut self, ctx: &egui::Context) {
        // Error dialog
        if let Some(ref error) = self.error_message.clone() {
            egui::Window::new("Error")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.colored_label(colors::ERROR, error);
                    ui.add_space(10.0);
                    if ui.button("OK").clicked() {
                        self.error_message = None;
                    }
                });
        }

        // Success dialog
        if let Some(ref msg) = self.success_message.clone() {
            egui::Window::new("Success")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.colored_label(colors::SUCCESS, msg);
                    ui.add_space(10.0);
                    if ui.button("OK").clicked() {
                        self.success_message = None;
                    }
                });
        }

        // Warning dialog
        if let Some(ref msg) = self.warning_message.clone() {
            egui::Window::new("Warning")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.colored_label(colors::WARNING, msg);
                    ui.add_space(10.0);
                    if ui.button("OK").clicked() {
                        self.warning_message = None;
                    }
                });
        }

        // Delete confirmation dialog
        if self.show_delete_confirm
            && let Some(ref target) = self.delete_target.clone()
        {
            let (title, message) = match target {
                DeleteTarget::Department(_, name) => ("Delete Department", format!("Delete department '{name}'?")),
                DeleteTarget::Account(_, name) => ("Delete Account", format!("Delete account '{name}'?")),
                DeleteTarget::Requester(_, name) => ("Delete Requester", format!("Delete requester '{name}'?")),
                DeleteTarget::Card(_, name) => ("Delete Card", format!("Delete card '{name}'?")),
                DeleteTarget::Recharge(_, name) => (
                    "Delete Recharge",
                    format!("Delete {name}? The amount is taken back from the card."),
                ),
                DeleteTarget::User(_, name) => ("Delete User", format!("Delete user '{name}'?")),
                DeleteTarget::Diet(_, name) => (
                    "Delete Diet",
                    format!("Delete diet {name}? A card-paid advance is refunded to the card."),
                ),
                DeleteTarget::Liquidation(_, name) => (
                    "Delete Liquidation",
                    format!("Delete the liquidation of {name}? The diet becomes pending again."),
                ),
                DeleteTarget::Backup(_, name) => ("Delete Backup", format!("Delete backup '{name}'?")),
            };

            egui::Window::new(title)
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(message);
                    ui.add_space(10.0);
                    ui.horizontal(|ui| {
                        if ui.button("Cancel").clicked() {
                            self.show_delete_confirm = false;
                            self.delete_target = None;
                        }
                        if ui.button("Delete").clicked() {
                            self.confirm_delete();
                            self.show_delete_confirm = false;
                            self.delete_target = None;
                        }
                    });
                });
        }

        // Other confirmations
        if let Some(action) = self.confirm_action.clone() {
            let (title, message, button) = match &action {
                ConfirmAction::CancelDiet(_, number) => (
                    "Cancel Diet",
                    format!("Cancel diet {number}? A card-paid advance is refunded to the card."),
                    "Cancel Diet",
                ),
                ConfirmAction::Restore(_, name) => (
                    "Restore Backup",
                    format!(
                        "Replace the current database with '{name}'?\n\
                         A safety backup is taken first. The application must be restarted afterwards."
                    ),
                    "Restore",
                ),
                ConfirmAction::NewCycle(name) => (
                    "Start New Cycle",
                    format!(
                        "Start cycle '{name}'?\n\
                         The current database is archived, then diets, liquidations and recharges are removed. \
                         Master data and card balances are kept. The application must be restarted afterwards."
                    ),
                    "Start Cycle",
                ),
            };

            egui::Window::new(title)
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(message);
                    ui.add_space(10.0);
                    ui.horizontal(|ui| {
                        if ui.button("Back").clicked() {
                            self.confirm_action = None;
                        }
                        if ui.button(RichText::new(button).color(colors::ERROR)).clicked() {
                            self.confirm_action = None;
                            self.run_confirmed(action.clone());
                        }
                    });
                });
        }
    }

    /// Execute the confirmed delete operation.
    fn confirm_delete(&mut self) {
        if let Some(target) = self.delete_target.take() {
            self.log_info("Deleting record...");
            self.delete(target);
        }
    }

    fn run_confirmed(&mut self, action: ConfirmAction) {
        match action {
            ConfirmAction::CancelDiet(id, number) => {
                self.log_info(format!("Cancelling diet {number}"));
                self.cancel_diet(id);
            }
            ConfirmAction::Restore(path, name) => {
                self.log_info(format!("Restoring backup {name}"));
                self.restore_backup(path);
            }
            ConfirmAction::NewCycle(name) => {
                self.log_info(format!("Starting cycle {name}"));
                self.start_new_cycle(name);
            }
        }
    }

    /// The only screen left after the live database was replaced.
    fn show_blocked(&self, ctx: &egui::Context, message: &str) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(80.0);
                ui.label(RichText::new("Restart Required").size(28.0).strong());
                ui.add_space(20.0);
                ui.label(RichText::new(message).size(15.0));
                ui.add_space(30.0);
                if ui.button(RichText::new("Close Application").size(16.0)).clicked() {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
            });
        });
    }
}

/// Convert a repository delete result into a user message.
fn delete_result<E: std::fmt::Display>(result: Result<bool, E>, name: &str) -> Result<String, String> {
    match result {
        Ok(true) => Ok(format!("'{name}' deleted")),
        Ok(false) => Err(format!("'{name}' not found")),
        Err(e) => Err(format!("Could not delete '{name}': {e}")),
    }
}

async fn reconnect(path: &Path, tx: &mpsc::UnboundedSender<UiMessage>) {
    let msg = match db::connect(path).await {
        Ok(pool) => UiMessage::Reconnected(pool),
        Err(e) => UiMessage::TaskFailed(format!("Could not reopen the database: {e}")),
    };
    let _ = tx.send(msg);
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Poll async results
        self.poll_async_results();

        // Request repaint during async operations
        if self.long_task.is_some() || matches!(self.auth, AuthState::Checking) {
            ctx.request_repaint();
        }

        if let Some(message) = self.blocked.clone() {
            self.show_blocked(ctx, &message);
            return;
        }

        match self.auth {
            AuthState::Checking => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.centered_and_justified(|ui| ui.spinner());
                });
                return;
            }
            AuthState::LoginRequired => {
                login::show(self, ctx);
                return;
            }
            _ => {}
        }

        // Menu bar
        self.show_menu_bar(ctx);

        // Status bar
        self.show_status_bar(ctx);

        // Progress modal for long tasks
        self.show_long_task(ctx);

        // Modal dialogs (error, success, confirmations)
        self.show_dialogs(ctx);

        // Main content
        let go_back = egui::CentralPanel::default()
            .show(ctx, |ui| match self.current_panel {
                Panel::Dashboard => {
                    if let Some(next) = dashboard::show(self, ui) {
                        self.current_panel = next;
                    }
                    false
                }
                Panel::Departments => department_panel::show(self, ui),
                Panel::Accounts => account_panel::show(self, ui),
                Panel::Requesters => requester_panel::show(self, ui),
                Panel::Cards => card_panel::show(self, ui),
                Panel::Diets => diet_panel::show(self, ui),
                Panel::Liquidations => liquidation_panel::show(self, ui),
                Panel::Reports => reports_panel::show(self, ui),
                Panel::Backups => backup_panel::show(self, ui),
                Panel::Users => user_panel::show(self, ui),
                Panel::Settings => settings_panel::show(self, ui),
            })
            .inner;

        if go_back {
            self.current_panel = Panel::Dashboard;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_result_messages() {
        assert_eq!(delete_result::<String>(Ok(true), "ADM").unwrap(), "'ADM' deleted");
        assert!(delete_result::<String>(Ok(false), "ADM").unwrap_err().contains("not found"));
        assert!(
            delete_result::<String>(Err("FOREIGN KEY constraint failed".to_string()), "ADM")
                .unwrap_err()
                .contains("FOREIGN KEY")
        );
    }

    #[test]
    fn test_report_filter_defaults_to_month() {
        let filter = ReportFilter::default();
        assert_eq!(filter.start_date.day(), 1);
        assert!(filter.start_date <= filter.end_date);
        assert_eq!(filter.params().department_id, None);
    }
}
