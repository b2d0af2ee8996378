//! Marker files that coordinate restores with application restarts.
//!
//! `APP_BLOQUEADA.lock` exists while a restore runs and after a successful one;
//! `REINICIAR_APP.txt` says the live database was replaced and the running
//! application must be closed. Both live next to the database file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;

pub const RESTART_MARKER: &str = "REINICIAR_APP.txt";
pub const LOCK_FILE: &str = "APP_BLOQUEADA.lock";

#[derive(Debug, Clone)]
pub struct Markers {
    dir: PathBuf,
}

impl Markers {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn for_database(db_path: &Path) -> Self {
        let dir = db_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::new(dir)
    }

    pub fn restart_path(&self) -> PathBuf {
        self.dir.join(RESTART_MARKER)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    pub fn restart_required(&self) -> bool {
        self.restart_path().is_file()
    }

    pub fn is_locked(&self) -> bool {
        self.lock_path().is_file()
    }

    pub fn write_lock(&self, reason: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(
            self.lock_path(),
            format!("{}\n{reason}\n", Local::now().format("%Y-%m-%d %H:%M:%S")),
        )
    }

    pub fn write_restart_required(&self, details: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.restart_path(), details)
    }

    pub fn release_lock(&self) -> io::Result<()> {
        remove_marker(&self.lock_path())
    }

    pub fn clear(&self) -> io::Result<()> {
        remove_marker(&self.restart_path())?;
        remove_marker(&self.lock_path())
    }
}

fn remove_marker(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let markers = Markers::for_database(&dir.path().join("dietas.db"));

        assert!(!markers.is_locked());
        assert!(!markers.restart_required());

        markers.write_lock("restoring").unwrap();
        assert!(markers.is_locked());
        markers.release_lock().unwrap();
        assert!(!markers.is_locked());

        // Releasing twice is fine
        markers.release_lock().unwrap();
    }

    #[test]
    fn test_clear_removes_both_markers() {
        let dir = tempfile::tempdir().unwrap();
        let markers = Markers::new(dir.path());
        markers.write_lock("restoring").unwrap();
        markers.write_restart_required("done").unwrap();
        assert!(markers.restart_required());

        markers.clear().unwrap();
        assert!(!markers.is_locked());
        assert!(!markers.restart_required());
    }

    #[test]
    fn test_marker_file_names() {
        let markers = Markers::new("/data");
        assert_eq!(markers.restart_path(), PathBuf::from("/data/REINICIAR_APP.txt"));
        assert_eq!(markers.lock_path(), PathBuf::from("/data/APP_BLOQUEADA.lock"));
    }
}
