//! Dietas Manager - Desktop manager for per-diem requests, cards and liquidations.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use eframe::egui;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use dietas_manager as app;

use app::backup::{DatabaseService, StartupState};
use app::config::{AppConfig, AppPaths, ConfigLoadResult};
use app::db;
use app::ui::{App, SetupApp, SetupWizard};

/// Desktop manager for per-diem requests, prepaid cards and liquidations.
#[derive(Parser)]
#[command(name = "dietas-manager", version)]
struct Cli {
    /// Use config.toml from current directory (dev mode)
    #[arg(long)]
    dev: bool,

    /// Open the setup wizard even when a valid configuration exists
    #[arg(long)]
    setup: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Create a backup of the database
    Backup {
        /// Short note added to the file name
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// List backups, newest first
    ListBackups,
    /// Replace the database with a backup file
    Restore {
        /// Backup file to restore
        file: PathBuf,
    },
    /// Archive the database and start a new cycle without movements
    NewCycle {
        /// Cycle name, e.g. the year
        name: String,
    },
}

/// Application launch mode.
enum LaunchMode {
    /// Normal operation with valid config.
    Normal(AppConfig),
    /// Setup wizard for first run or invalid config.
    Setup(SetupWizard, Option<String>),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Determine config path based on mode
    let config_path = if cli.dev {
        PathBuf::from("config.toml")
    } else {
        AppConfig::default_path()
    };

    let load_result = AppConfig::try_load(&config_path);

    // Initialize logging next to the database, or next to the config before setup
    let log_dir = match &load_result {
        ConfigLoadResult::Loaded(config) => config.resolve_paths(&config_path).logs,
        _ => config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .join("logs"),
    };
    let _log_guard = init_logging(&log_dir);

    tracing::info!("Dietas Manager {} starting...", env!("CARGO_PKG_VERSION"));
    if cli.dev {
        tracing::info!("Dev mode: loading config from current directory");
    }
    tracing::info!("Config path: {:?}", config_path);

    let launch_mode = match load_result {
        ConfigLoadResult::Loaded(config) if cli.setup => {
            tracing::info!("Setup requested");
            LaunchMode::Setup(SetupWizard::from_config(config), None)
        }
        ConfigLoadResult::Loaded(config) => {
            tracing::info!("Config loaded successfully");
            LaunchMode::Normal(config)
        }
        ConfigLoadResult::Missing => {
            tracing::info!("Config missing, starting setup wizard");
            LaunchMode::Setup(SetupWizard::new(), None)
        }
        ConfigLoadResult::Invalid(e) => {
            tracing::warn!("Config invalid: {}", e);
            LaunchMode::Setup(SetupWizard::new(), Some(e.to_string()))
        }
    };

    match (cli.command, launch_mode) {
        (Some(command), LaunchMode::Normal(config)) => run_command(command, &config, &config_path),
        (Some(_), LaunchMode::Setup(_, error)) => {
            bail!(
                "No usable configuration at {}{}. Start the application without a command to run the setup wizard.",
                config_path.display(),
                error.map(|e| format!(" ({e})")).unwrap_or_default()
            )
        }
        (None, LaunchMode::Normal(config)) => run_main_app(config, config_path),
        (None, LaunchMode::Setup(wizard, error)) => run_setup_wizard(wizard, error, config_path),
    }
}

/// Log to stdout and to a daily file. The guard flushes the file on drop.
fn init_logging(log_dir: &Path) -> Option<WorkerGuard> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let file_appender = std::fs::create_dir_all(log_dir).ok().and_then(|()| {
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("dietas-manager")
            .filename_suffix("log")
            .build(log_dir)
            .ok()
    });

    match file_appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
            tracing::warn!("File logging disabled: cannot write to {}", log_dir.display());
            None
        }
    }
}

/// Handle markers left by a previous restore. Fails while the lock cannot be released safely.
fn check_markers(paths: &AppPaths) -> anyhow::Result<StartupState> {
    DatabaseService::from_paths(paths).check_on_startup().with_context(|| {
        format!(
            "Could not recover {} after an unfinished restore; the lock file stays in place",
            paths.database.display()
        )
    })
}

/// Run a maintenance command without the GUI.
fn run_command(command: Command, config: &AppConfig, config_path: &Path) -> anyhow::Result<()> {
    let paths = config.resolve_paths(config_path);
    match check_markers(&paths)? {
        StartupState::RecoveredRestore => println!("Recovered the database from before an unfinished restore"),
        StartupState::InterruptedRestore => println!("An unfinished restore was found; the database was not replaced"),
        StartupState::Clean | StartupState::RestartCompleted => {}
    }

    let service = DatabaseService::from_paths(&paths);
    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    match command {
        Command::Backup { description } => {
            let backup = rt.block_on(service.create_backup(&description))?;
            println!("Backup created: {} ({})", backup.path.display(), backup.size_display());

            let removed = service.prune_backups(config.backup.keep_last as usize)?;
            if !removed.is_empty() {
                println!("Removed {} old backup(s)", removed.len());
            }
        }
        Command::ListBackups => {
            let backups = service.list_backups()?;
            if backups.is_empty() {
                println!("No backups in {}", service.backup_dir().display());
            }
            for backup in backups {
                println!(
                    "{}  {:>10}  {}  {}",
                    backup.created_at.format("%Y-%m-%d %H:%M:%S"),
                    backup.size_display(),
                    backup.file_name,
                    backup.description.as_deref().unwrap_or("")
                );
            }
        }
        Command::Restore { file } => {
            let outcome = rt.block_on(service.restore_backup(&file));
            if !outcome.is_success() {
                bail!(outcome.message());
            }
            println!("{}", outcome.message());
        }
        Command::NewCycle { name } => {
            let outcome = rt.block_on(service.start_new_cycle(&name))?;
            println!("Archived current database: {}", outcome.archive.path.display());
            println!("Clean copy: {}", outcome.clean_copy.display());
            if !outcome.restore.is_success() {
                bail!(outcome.restore.message());
            }
            println!("{}", outcome.restore.message());
        }
    }

    Ok(())
}

/// Run the setup wizard.
fn run_setup_wizard(wizard: SetupWizard, initial_error: Option<String>, config_path: PathBuf) -> anyhow::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Dietas Manager - Setup")
            .with_inner_size([640.0, 520.0])
            .with_min_inner_size([520.0, 420.0])
            .with_resizable(true),
        ..Default::default()
    };

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    eframe::run_native(
        "Dietas Manager - Setup",
        options,
        Box::new(|_cc| Ok(Box::new(SetupApp::new(wizard, initial_error, config_path, rt)))),
    )
    .map_err(|e| anyhow::anyhow!("GUI error: {e}"))
}

/// Run the main application.
fn run_main_app(config: AppConfig, config_path: PathBuf) -> anyhow::Result<()> {
    let paths = config.resolve_paths(&config_path);
    let startup = match check_markers(&paths) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("{:#}", e);
            rfd::MessageDialog::new()
                .set_level(rfd::MessageLevel::Error)
                .set_title("Dietas Manager")
                .set_description(format!("{e:#}"))
                .set_buttons(rfd::MessageButtons::Ok)
                .show();
            return Err(e);
        }
    };

    // Create tokio runtime for async operations
    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    // Connect to database
    let connected = rt.block_on(async {
        if let Some(parent) = paths.database.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = db::connect(&paths.database).await?;

        // Log connection info
        if let Ok(version) = db::get_version(&conn).await {
            tracing::info!("SQLite: {}", version);
        }

        if let Ok(counts) = db::get_table_counts(&conn).await {
            tracing::info!(
                "Tables: {} requesters, {} cards, {} diets, {} liquidations",
                counts.requesters,
                counts.cards,
                counts.diets,
                counts.liquidations
            );
        }

        anyhow::Ok(conn)
    });

    let pool = match connected {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to open database {}: {}", paths.database.display(), e);
            let message = format!("Cannot open the database {}: {e}", paths.database.display());
            drop(rt);
            return run_setup_wizard(SetupWizard::from_config(config), Some(message), config_path);
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(format!("Dietas Manager - {}", config.organization.name))
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([900.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Dietas Manager",
        options,
        Box::new(move |cc| {
            let mut fonts = egui::FontDefinitions::default();
            egui_phosphor::add_to_fonts(&mut fonts, egui_phosphor::Variant::Regular);
            cc.egui_ctx.set_fonts(fonts);

            Ok(Box::new(App::new(pool, config, config_path, rt, startup)))
        }),
    )
    .map_err(|e| anyhow::anyhow!("GUI error: {e}"))
}
