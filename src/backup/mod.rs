//! Database backup, restore and cycle rotation.
//!
//! Backups are whole-file copies of the SQLite database kept in a backups
//! directory as `backup_YYYYMMDD_HHMMSS[-N][_description].db`. Restoring
//! overwrites the live file, so the application must be restarted afterwards;
//! the marker files in [`markers`] record that state.

pub mod cycle;
pub mod markers;

#[cfg(test)]
mod tests;

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use tracing::{error, info, warn};

use crate::config::AppPaths;
use crate::db;
use crate::error::{AppError, Result};

pub use cycle::{CycleOutcome, TRANSACTIONAL_TABLES};
pub use markers::{LOCK_FILE, Markers, RESTART_MARKER};

const BACKUP_PREFIX: &str = "backup_";
const BACKUP_EXTENSION: &str = "db";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";
/// Description given to the archive a new cycle leaves behind.
const CYCLE_ARCHIVE_PREFIX: &str = "cycle";

/// A backup file found in the backups directory.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupInfo {
    pub path: PathBuf,
    pub file_name: String,
    pub created_at: NaiveDateTime,
    /// Disambiguates backups taken within the same second.
    pub sequence: u32,
    pub description: Option<String>,
    pub size_bytes: u64,
}

impl BackupInfo {
    /// Read backup details from a file path; `None` if the name does not follow the backup scheme.
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?.to_string();
        let (created_at, sequence, description) = parse_backup_name(&file_name)?;
        let size_bytes = fs::metadata(path).ok()?.len();

        Some(Self {
            path: path.to_path_buf(),
            file_name,
            created_at,
            sequence,
            description,
            size_bytes,
        })
    }

    /// Archive of a finished cycle; never pruned.
    pub fn is_cycle_archive(&self) -> bool {
        self.description
            .as_deref()
            .and_then(|d| d.split(' ').next())
            .is_some_and(|word| word == CYCLE_ARCHIVE_PREFIX)
    }

    /// Size in a human-friendly unit.
    pub fn size_display(&self) -> String {
        let bytes = self.size_bytes as f64;
        if bytes >= 1024.0 * 1024.0 {
            format!("{:.1} MB", bytes / (1024.0 * 1024.0))
        } else if bytes >= 1024.0 {
            format!("{:.1} KB", bytes / 1024.0)
        } else {
            format!("{} B", self.size_bytes)
        }
    }
}

/// What the marker files said when the application started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupState {
    /// No markers present.
    Clean,
    /// A restore finished before the last shutdown; markers were cleared.
    RestartCompleted,
    /// A restore stopped halfway; the database from before it was put back.
    RecoveredRestore,
    /// A restore stopped before the live file was replaced; nothing to put back.
    InterruptedRestore,
}

/// Result of a restore attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreOutcome {
    /// The live database now holds the backup's contents; a restart is required.
    Restored { safety_backup: Option<BackupInfo> },
    /// The chosen file was refused before anything was touched.
    Rejected { reason: String },
    /// The restore failed and the live database was put back as it was.
    RolledBack { reason: String },
    /// The restore failed and the rollback failed too. The lock stays, and the next
    /// start puts the rollback copy back before opening the database.
    Unrecoverable { reason: String },
}

impl RestoreOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RestoreOutcome::Restored { .. })
    }

    /// Message suitable for a dialog box.
    pub fn message(&self) -> String {
        match self {
            RestoreOutcome::Restored { safety_backup } => match safety_backup {
                Some(b) => format!(
                    "Database restored. A safety copy was saved as {}. Restart the application to continue.",
                    b.file_name
                ),
                None => "Database restored. Restart the application to continue.".to_string(),
            },
            RestoreOutcome::Rejected { reason } => format!("Restore refused: {reason}"),
            RestoreOutcome::RolledBack { reason } => {
                format!("Restore failed and the previous database was kept: {reason}")
            }
            RestoreOutcome::Unrecoverable { reason } => format!(
                "Restore failed and the previous database could not be put back: {reason}. \
                 Restart the application to recover the previous database."
            ),
        }
    }
}

/// File-level operations on the live database.
#[derive(Debug, Clone)]
pub struct DatabaseService {
    db_path: PathBuf,
    backup_dir: PathBuf,
}

impl DatabaseService {
    pub fn new(db_path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            backup_dir: backup_dir.into(),
        }
    }

    pub fn from_paths(paths: &AppPaths) -> Self {
        Self::new(&paths.database, &paths.backups)
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Marker files kept next to the database.
    pub fn markers(&self) -> Markers {
        Markers::for_database(&self.db_path)
    }

    /// Copy the live database into the backups directory.
    ///
    /// Uses SQLite's `VACUUM INTO` and falls back to a plain file copy.
    pub async fn create_backup(&self, description: &str) -> Result<BackupInfo> {
        if !self.db_path.is_file() {
            return Err(AppError::not_found(format!(
                "Database file {}",
                self.db_path.display()
            )));
        }

        fs::create_dir_all(&self.backup_dir)?;
        let target = self.next_backup_path(Local::now().naive_local(), &slugify(description));

        match vacuum_into(&self.db_path, &target).await {
            Ok(()) => info!("Backup created with VACUUM INTO: {}", target.display()),
            Err(e) => {
                warn!("Native backup failed ({e}), falling back to file copy");
                remove_if_exists(&target)?;
                fs::copy(&self.db_path, &target)?;
                info!("Backup created by file copy: {}", target.display());
            }
        }

        BackupInfo::from_path(&target)
            .ok_or_else(|| AppError::backup(format!("Backup {} is unreadable", target.display())))
    }

    /// Backups in the backups directory, newest first.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        if !self.backup_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        for entry in fs::read_dir(&self.backup_dir)? {
            let path = entry?.path();
            if path.is_file()
                && let Some(info) = BackupInfo::from_path(&path)
            {
                backups.push(info);
            }
        }

        backups.sort_by(|a, b| {
            (b.created_at, b.sequence, &b.file_name).cmp(&(a.created_at, a.sequence, &a.file_name))
        });
        Ok(backups)
    }

    /// Delete one backup file. Only files inside the backups directory are accepted.
    pub fn delete_backup(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| AppError::validation("Invalid backup path"))?;
        if fs::canonicalize(parent)? != fs::canonicalize(&self.backup_dir)? {
            return Err(AppError::validation(format!(
                "{} is not in the backups directory",
                path.display()
            )));
        }
        if BackupInfo::from_path(path).is_none() {
            return Err(AppError::validation(format!("{} is not a backup file", path.display())));
        }

        fs::remove_file(path)?;
        info!("Deleted backup {}", path.display());
        Ok(())
    }

    /// Delete all but the newest `keep_last` backups. Zero keeps everything.
    ///
    /// Cycle archives are neither counted nor deleted.
    pub fn prune_backups(&self, keep_last: usize) -> Result<Vec<PathBuf>> {
        if keep_last == 0 {
            return Ok(Vec::new());
        }

        let mut removed = Vec::new();
        let regular = self.list_backups()?.into_iter().filter(|b| !b.is_cycle_archive());
        for backup in regular.skip(keep_last) {
            fs::remove_file(&backup.path)?;
            removed.push(backup.path);
        }

        if !removed.is_empty() {
            info!("Pruned {} old backup(s)", removed.len());
        }
        Ok(removed)
    }

    /// Replace the live database with a backup.
    ///
    /// Takes a safety backup first, holds the lock file while copying, checks the
    /// restored file and puts the previous file back if anything fails. Never
    /// returns an error; the outcome says what happened.
    pub async fn restore_backup(&self, backup_path: &Path) -> RestoreOutcome {
        if let Err(e) = self.validate_restore_source(backup_path) {
            warn!("Restore of {} refused: {e}", backup_path.display());
            return RestoreOutcome::Rejected { reason: e.to_string() };
        }

        let markers = self.markers();
        if let Err(e) = markers.write_lock(&format!("Restoring {}", backup_path.display())) {
            error!("Could not write lock file: {e}");
            return RestoreOutcome::Rejected {
                reason: format!("Could not lock the application: {e}"),
            };
        }

        let safety_backup = if self.db_path.is_file() {
            match self.create_backup("pre_restore").await {
                Ok(info) => Some(info),
                Err(e) => {
                    error!("Safety backup failed, restore aborted: {e}");
                    release_lock(&markers);
                    return RestoreOutcome::Rejected {
                        reason: format!("Safety backup failed: {e}"),
                    };
                }
            }
        } else {
            None
        };

        let rollback_path = rollback_path_for(&self.db_path);
        let kept = if self.db_path.is_file() {
            keep_rollback_copy(&self.db_path, &rollback_path)
        } else {
            // A stale copy would be put back over the restored file
            remove_if_exists(&rollback_path)
        };
        if let Err(e) = kept {
            error!("Could not keep a rollback copy, restore aborted: {e}");
            release_lock(&markers);
            return RestoreOutcome::Rejected {
                reason: format!("Could not keep a rollback copy: {e}"),
            };
        }

        match self.overwrite_and_verify(backup_path).await {
            Ok(()) => {
                let details = format!(
                    "Database restored at {}\nFrom: {}\nSafety backup: {}\n",
                    Local::now().format("%Y-%m-%d %H:%M:%S"),
                    backup_path.display(),
                    safety_backup
                        .as_ref()
                        .map(|b| b.path.display().to_string())
                        .unwrap_or_else(|| "-".to_string()),
                );
                if let Err(e) = markers.write_restart_required(&details) {
                    warn!("Could not write restart marker: {e}");
                }
                discard_rollback(&rollback_path);
                info!("Restored database from {}", backup_path.display());
                RestoreOutcome::Restored { safety_backup }
            }
            Err(e) => {
                error!("Restore from {} failed: {e}", backup_path.display());
                self.roll_back(&rollback_path, &markers, e.to_string())
            }
        }
    }

    fn validate_restore_source(&self, backup_path: &Path) -> Result<()> {
        if !backup_path.is_file() {
            return Err(AppError::not_found(format!("Backup file {}", backup_path.display())));
        }
        if !has_sqlite_header(backup_path)? {
            return Err(AppError::validation(format!(
                "{} is not a SQLite database",
                backup_path.display()
            )));
        }
        if self.db_path.is_file() && fs::canonicalize(backup_path)? == fs::canonicalize(&self.db_path)? {
            return Err(AppError::validation("Cannot restore the live database onto itself"));
        }
        Ok(())
    }

    async fn overwrite_and_verify(&self, backup_path: &Path) -> Result<()> {
        remove_sidecar_files(&self.db_path)?;
        fs::copy(backup_path, &self.db_path)?;

        let conn = open_file(&self.db_path, true).await?;
        let ok = db::integrity_check(&conn).await;
        let _ = conn.close().await;

        if ok? {
            Ok(())
        } else {
            Err(AppError::backup("Restored database failed the integrity check"))
        }
    }

    /// Inspect the markers left by the previous run and finish what it left behind.
    ///
    /// A lock without a restart marker means a restore stopped before completing. When
    /// a rollback copy exists the live file may be half overwritten, so the copy is put
    /// back before the lock is released. On any error the lock stays in place.
    pub fn check_on_startup(&self) -> Result<StartupState> {
        let markers = self.markers();
        let rollback_path = rollback_path_for(&self.db_path);

        match (markers.restart_required(), markers.is_locked()) {
            (true, _) => {
                info!("Previous restore completed, clearing restart markers");
                discard_rollback(&rollback_path);
                markers.clear()?;
                Ok(StartupState::RestartCompleted)
            }
            (false, true) if rollback_path.is_file() => {
                warn!(
                    "Lock file {} found without a restart marker, putting back {}",
                    markers.lock_path().display(),
                    rollback_path.display()
                );
                self.put_back(&rollback_path)?;
                markers.release_lock()?;
                info!("Database from before the interrupted restore recovered");
                Ok(StartupState::RecoveredRestore)
            }
            (false, true) => {
                warn!(
                    "Lock file {} found without a restart marker and no rollback copy to put back",
                    markers.lock_path().display()
                );
                markers.release_lock()?;
                Ok(StartupState::InterruptedRestore)
            }
            (false, false) => Ok(StartupState::Clean),
        }
    }

    /// Copy the rollback file over the live database, then drop it.
    fn put_back(&self, rollback_path: &Path) -> Result<()> {
        remove_sidecar_files(&self.db_path)?;
        fs::copy(rollback_path, &self.db_path)?;
        fs::remove_file(rollback_path)?;
        Ok(())
    }

    fn roll_back(&self, rollback_path: &Path, markers: &Markers, reason: String) -> RestoreOutcome {
        let result = if rollback_path.is_file() {
            self.put_back(rollback_path)
        } else {
            // No database existed before the restore
            remove_if_exists(&self.db_path)
        };

        match result {
            Ok(()) => {
                info!("Rolled back to the previous database");
                release_lock(markers);
                RestoreOutcome::RolledBack { reason }
            }
            Err(e) => {
                error!("Rollback failed: {e}");
                RestoreOutcome::Unrecoverable {
                    reason: format!("{reason}; rollback failed: {e}"),
                }
            }
        }
    }

    fn next_backup_path(&self, now: NaiveDateTime, slug: &str) -> PathBuf {
        let stamp = now.format(TIMESTAMP_FORMAT).to_string();
        let suffix = if slug.is_empty() { String::new() } else { format!("_{slug}") };

        let mut sequence = 0;
        loop {
            let counter = if sequence == 0 { String::new() } else { format!("-{sequence}") };
            let path = self
                .backup_dir
                .join(format!("{BACKUP_PREFIX}{stamp}{counter}{suffix}.{BACKUP_EXTENSION}"));
            if !path.exists() {
                return path;
            }
            sequence += 1;
        }
    }
}

/// Open a database file without touching its schema.
pub(crate) async fn open_file(path: &Path, read_only: bool) -> std::result::Result<DatabaseConnection, DbErr> {
    let mode = if read_only { "ro" } else { "rw" };
    let mut opt = ConnectOptions::new(format!("sqlite://{}?mode={mode}", path.display()));
    opt.max_connections(1)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    Database::connect(opt).await
}

/// Write a compacted copy of `source` to `target` with `VACUUM INTO`.
pub(crate) async fn vacuum_into(source: &Path, target: &Path) -> std::result::Result<(), DbErr> {
    let conn = open_file(source, true).await?;
    let target = target.to_string_lossy().replace('\'', "''");
    let result = conn.execute_unprepared(&format!("VACUUM INTO '{target}'")).await;
    let _ = conn.close().await;
    result.map(|_| ())
}

fn has_sqlite_header(path: &Path) -> Result<bool> {
    let mut header = [0u8; 16];
    let mut file = fs::File::open(path)?;
    match file.read_exact(&mut header) {
        Ok(()) => Ok(&header == SQLITE_HEADER),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

pub(crate) fn rollback_path_for(db_path: &Path) -> PathBuf {
    with_suffix(db_path, ".rollback")
}

/// Copy the live file aside. The copy only takes its final name once complete, so a
/// crash here never leaves a truncated rollback file behind.
fn keep_rollback_copy(db_path: &Path, rollback_path: &Path) -> Result<()> {
    let partial = with_suffix(rollback_path, ".part");
    let copied = fs::copy(db_path, &partial).and_then(|_| fs::rename(&partial, rollback_path));
    if copied.is_err()
        && let Err(e) = remove_if_exists(&partial)
    {
        warn!("Could not remove {}: {e}", partial.display());
    }
    copied?;
    Ok(())
}

fn discard_rollback(rollback_path: &Path) {
    if let Err(e) = remove_if_exists(rollback_path) {
        warn!("Could not remove rollback copy {}: {e}", rollback_path.display());
    }
}

/// Remove `-journal`, `-wal` and `-shm` files so SQLite does not replay them onto a replaced file.
fn remove_sidecar_files(db_path: &Path) -> Result<()> {
    for suffix in ["-journal", "-wal", "-shm"] {
        remove_if_exists(&with_suffix(db_path, suffix))?;
    }
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn release_lock(markers: &Markers) {
    if let Err(e) = markers.release_lock() {
        warn!("Could not remove lock file: {e}");
    }
}

/// Lowercase ASCII slug used in backup file names.
pub(crate) fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for c in text.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
    }
    let slug = slug.trim_end_matches('_');
    slug.chars().take(40).collect::<String>().trim_end_matches('_').to_string()
}

/// Split `backup_YYYYMMDD_HHMMSS[-N][_slug].db` into its parts.
fn parse_backup_name(file_name: &str) -> Option<(NaiveDateTime, u32, Option<String>)> {
    let stem = file_name
        .strip_prefix(BACKUP_PREFIX)?
        .strip_suffix(&format!(".{BACKUP_EXTENSION}"))?;
    if stem.len() < 15 || !stem.is_char_boundary(15) {
        return None;
    }

    let (stamp, rest) = stem.split_at(15);
    let created_at = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;

    let (sequence, rest) = match rest.strip_prefix('-') {
        Some(after) => {
            let digits: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
            let sequence = digits.parse().ok()?;
            (sequence, &after[digits.len()..])
        }
        None => (0, rest),
    };

    let description = match rest {
        "" => None,
        _ => Some(rest.strip_prefix('_')?.replace('_', " ")),
    };

    Some((created_at, sequence, description))
}
