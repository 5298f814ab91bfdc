use crate::errors::{AppError, AppResult};
use std::path::{Path, PathBuf};

pub const DATABASE_NAME: &str = "SAPMigrationDB";
pub const DATA_DIR_ENV: &str = "SAP_TRACKER_DATA_DIR";
pub const DISABLE_INDEXED_ENV: &str = "SAP_TRACKER_DISABLE_INDEXED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub database_name: String,
    pub indexed_enabled: bool,
}

impl StorageConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            database_name: DATABASE_NAME.to_string(),
            indexed_enabled: true,
        }
    }

    pub fn from_env() -> AppResult<Self> {
        let data_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => default_data_dir()?,
        };
        let mut config = Self::new(data_dir);
        config.indexed_enabled = !env_flag(DISABLE_INDEXED_ENV);
        Ok(config)
    }

    pub fn key_value_dir(&self) -> PathBuf {
        self.data_dir.join("kv")
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.sqlite3", self.database_name))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

fn default_data_dir() -> AppResult<PathBuf> {
    #[cfg(unix)]
    {
        if let Ok(home) = std::env::var("HOME") {
            return Ok(PathBuf::from(home).join(".sap-migration-tracker"));
        }
    }

    #[cfg(windows)]
    {
        if let Ok(home) = std::env::var("USERPROFILE") {
            return Ok(PathBuf::from(home).join(".sap-migration-tracker"));
        }
    }

    std::env::current_dir()
        .map(|cwd| cwd.join(".sap-migration-tracker"))
        .map_err(|error| AppError::Io(format!("Unable to determine a data directory: {error}")))
}
