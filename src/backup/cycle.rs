//! Cycle rotation: archive the database and continue from a copy without
//! transactional records.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use sea_orm::ConnectionTrait;
use tracing::{info, warn};

use super::{
    BackupInfo, CYCLE_ARCHIVE_PREFIX, DatabaseService, RestoreOutcome, open_file, remove_if_exists, slugify,
    vacuum_into,
};
use crate::db;
use crate::error::{AppError, Result};

/// Tables emptied by a new cycle, children before parents.
pub const TRANSACTIONAL_TABLES: [&str; 3] = ["liquidations", "card_recharges", "diets"];

/// Everything a new cycle produced.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub archive: BackupInfo,
    pub clean_copy: PathBuf,
    pub restore: RestoreOutcome,
}

impl DatabaseService {
    pub fn cycles_dir(&self) -> PathBuf {
        self.backup_dir().join("cycles")
    }

    /// Copy the database into `cycles/` with the transactional tables dropped.
    ///
    /// Master data (departments, requesters, accounts, cards, users) is kept.
    /// The copy is removed again if it fails verification.
    pub async fn create_clean_database_copy(&self, cycle_name: &str) -> Result<PathBuf> {
        let slug = slugify(cycle_name);
        if slug.is_empty() {
            return Err(AppError::validation("Cycle name must contain letters or digits"));
        }
        if !self.database_path().is_file() {
            return Err(AppError::not_found(format!(
                "Database file {}",
                self.database_path().display()
            )));
        }

        let dir = self.cycles_dir();
        fs::create_dir_all(&dir)?;
        let target = dir.join(format!(
            "cycle_{slug}_{}.db",
            Local::now().format("%Y%m%d_%H%M%S")
        ));
        if target.exists() {
            return Err(AppError::validation(format!(
                "Clean copy {} already exists",
                target.display()
            )));
        }

        if let Err(e) = vacuum_into(self.database_path(), &target).await {
            warn!("Native copy failed ({e}), falling back to file copy");
            remove_if_exists(&target)?;
            fs::copy(self.database_path(), &target)?;
        }

        match strip_transactional_tables(&target).await {
            Ok(()) => {
                info!("Clean database copy for cycle '{cycle_name}': {}", target.display());
                Ok(target)
            }
            Err(e) => {
                warn!("Clean copy failed verification, removing {}", target.display());
                remove_if_exists(&target)?;
                Err(e)
            }
        }
    }

    /// Archive the live database, then make a clean copy the live database.
    ///
    /// The final step goes through [`DatabaseService::restore_backup`], so the
    /// same markers and rollback apply.
    pub async fn start_new_cycle(&self, cycle_name: &str) -> Result<CycleOutcome> {
        if slugify(cycle_name).is_empty() {
            return Err(AppError::validation("Cycle name must contain letters or digits"));
        }
        let archive = self
            .create_backup(&format!("{CYCLE_ARCHIVE_PREFIX} {cycle_name}"))
            .await?;
        let clean_copy = self.create_clean_database_copy(cycle_name).await?;
        let restore = self.restore_backup(&clean_copy).await;

        if restore.is_success() {
            info!("New cycle '{cycle_name}' started, archive {}", archive.file_name);
        }

        Ok(CycleOutcome {
            archive,
            clean_copy,
            restore,
        })
    }
}

async fn strip_transactional_tables(path: &Path) -> Result<()> {
    let conn = open_file(path, false).await?;
    let result = drop_and_verify(&conn).await;
    let _ = conn.close().await;
    result
}

async fn drop_and_verify<C: ConnectionTrait>(conn: &C) -> Result<()> {
    for table in TRANSACTIONAL_TABLES {
        conn.execute_unprepared(&format!("DROP TABLE IF EXISTS {table}"))
            .await?;
    }
    conn.execute_unprepared("VACUUM").await?;

    let remaining = db::list_tables(conn).await?;
    if let Some(table) = TRANSACTIONAL_TABLES
        .iter()
        .find(|t| remaining.iter().any(|r| r == *t))
    {
        return Err(AppError::backup(format!("Table '{table}' is still present in the clean copy")));
    }
    if !db::integrity_check(conn).await? {
        return Err(AppError::backup("Clean copy failed the integrity check"));
    }
    Ok(())
}
