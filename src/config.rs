//! Configuration management module.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration load result.
#[derive(Debug)]
pub enum ConfigLoadResult {
    /// Config loaded successfully.
    Loaded(AppConfig),
    /// Config file missing (first run).
    Missing,
    /// Config file exists but invalid.
    Invalid(ConfigError),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub organization: OrganizationConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub rates: RateConfig,
}

/// Organization shown in report titles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationConfig {
    pub name: String,
}

/// SQLite database location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file; relative paths resolve against the config directory.
    pub path: PathBuf,
}

/// Backup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    pub directory: PathBuf,
    /// Number of backups kept after each new backup (0 keeps all).
    #[serde(default = "default_keep_last")]
    pub keep_last: u32,
}

fn default_keep_last() -> u32 {
    30
}

/// Export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub directory: PathBuf,
}

/// Per-diem rates applied when a diet is requested.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateConfig {
    pub breakfast: f64,
    pub lunch: f64,
    pub dinner: f64,
    pub lodging: f64,
}

/// Absolute locations derived from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub database: PathBuf,
    pub backups: PathBuf,
    pub exports: PathBuf,
    pub logs: PathBuf,
}

impl AppConfig {
    /// Get config file path.
    ///
    /// Uses the platform config directory, falling back to the executable's directory.
    pub fn default_path() -> PathBuf {
        if let Some(dirs) = ProjectDirs::from("", "", "dietas-manager") {
            return dirs.config_dir().join("config.toml");
        }

        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Attempt to load config with detailed result.
    pub fn try_load(path: &Path) -> ConfigLoadResult {
        if !path.exists() {
            return ConfigLoadResult::Missing;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<AppConfig>(&content) {
                Ok(config) => match config.validate() {
                    Ok(()) => ConfigLoadResult::Loaded(config),
                    Err(e) => ConfigLoadResult::Invalid(e),
                },
                Err(e) => ConfigLoadResult::Invalid(ConfigError::Parse(e)),
            },
            Err(e) => ConfigLoadResult::Invalid(ConfigError::Read(e)),
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.organization.name.trim().is_empty() {
            return Err(ConfigError::Validation("Organization name cannot be empty".to_string()));
        }
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Validation("Database path cannot be empty".to_string()));
        }
        if self.backup.directory.as_os_str().is_empty() {
            return Err(ConfigError::Validation("Backup directory cannot be empty".to_string()));
        }
        if self.export.directory.as_os_str().is_empty() {
            return Err(ConfigError::Validation("Export directory cannot be empty".to_string()));
        }
        if self.backup.keep_last > 1000 {
            return Err(ConfigError::Validation("Backups kept cannot exceed 1000".to_string()));
        }
        self.rates.validate()?;
        Ok(())
    }

    /// Save configuration to file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolve configured paths against the directory holding the config file.
    pub fn resolve_paths(&self, config_path: &Path) -> AppPaths {
        let base = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let resolve = |p: &Path| if p.is_absolute() { p.to_path_buf() } else { base.join(p) };

        let database = resolve(&self.database.path);
        let logs = database
            .parent()
            .map(|p| p.join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"));

        AppPaths {
            database,
            backups: resolve(&self.backup.directory),
            exports: resolve(&self.export.directory),
            logs,
        }
    }
}

impl RateConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let rates = [
            ("breakfast", self.breakfast),
            ("lunch", self.lunch),
            ("dinner", self.dinner),
            ("lodging", self.lodging),
        ];
        for (name, value) in rates {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "Rate '{name}' must be a non-negative number"
                )));
            }
        }
        if rates.iter().all(|(_, v)| *v == 0.0) {
            return Err(ConfigError::Validation("At least one rate must be greater than 0".to_string()));
        }
        Ok(())
    }
}

impl Default for OrganizationConfig {
    fn default() -> Self {
        Self {
            name: "My Organization".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("dietas.db"),
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("backups"),
            keep_last: default_keep_last(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("exports"),
        }
    }
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            breakfast: 5.0,
            lunch: 10.0,
            dinner: 10.0,
            lodging: 30.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_empty_organization() {
        let mut config = AppConfig::default();
        config.organization.name = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_empty_database_path() {
        let mut config = AppConfig::default();
        config.database.path = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rates() {
        let mut config = AppConfig::default();

        config.rates.lunch = -1.0;
        assert!(config.validate().is_err());

        config.rates.lunch = f64::NAN;
        assert!(config.validate().is_err());

        config.rates = RateConfig {
            breakfast: 0.0,
            lunch: 0.0,
            dinner: 0.0,
            lodging: 0.0,
        };
        assert!(config.validate().is_err());

        config.rates.lodging = 25.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resolve_paths_relative_to_config_dir() {
        let config = AppConfig::default();
        let paths = config.resolve_paths(Path::new("/srv/dietas/config.toml"));

        assert_eq!(paths.database, PathBuf::from("/srv/dietas/dietas.db"));
        assert_eq!(paths.backups, PathBuf::from("/srv/dietas/backups"));
        assert_eq!(paths.exports, PathBuf::from("/srv/dietas/exports"));
        assert_eq!(paths.logs, PathBuf::from("/srv/dietas/logs"));
    }

    #[test]
    fn test_resolve_paths_keeps_absolute() {
        let mut config = AppConfig::default();
        config.backup.directory = PathBuf::from("/mnt/usb/backups");
        let paths = config.resolve_paths(Path::new("config.toml"));

        assert_eq!(paths.backups, PathBuf::from("/mnt/usb/backups"));
        assert_eq!(paths.database, PathBuf::from("./dietas.db"));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.organization.name = "Provincial Office".to_string();
        config.backup.keep_last = 5;
        config.save(&path).unwrap();

        match AppConfig::try_load(&path) {
            ConfigLoadResult::Loaded(loaded) => {
                assert_eq!(loaded.organization.name, "Provincial Office");
                assert_eq!(loaded.backup.keep_last, 5);
                assert_eq!(loaded.rates, config.rates);
            }
            other => panic!("expected loaded config, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_and_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert!(matches!(AppConfig::try_load(&path), ConfigLoadResult::Missing));

        std::fs::write(&path, "[organization]\nname = \"\"\n").unwrap();
        assert!(matches!(AppConfig::try_load(&path), ConfigLoadResult::Invalid(_)));
    }
}
