//! Manager configuration

use crate::error::{FileIdError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// File name of the backing store inside the user data directory.
pub const DB_FILE_NAME: &str = "file_id_manager.db";

/// Configuration shared by both file ID manager implementations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileIdConfig {
    /// Root directory that all tracked paths live under
    pub root_dir: PathBuf,

    /// Path of the backing store file. Must be absolute.
    pub db_path: PathBuf,
}

impl FileIdConfig {
    /// Create a configuration, validating the store path.
    pub fn new(root_dir: impl Into<PathBuf>, db_path: impl Into<PathBuf>) -> Result<Self> {
        let config = Self {
            root_dir: root_dir.into(),
            db_path: db_path.into(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration with the store at the default user-data-dir path.
    pub fn with_default_db_path(root_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::new(root_dir, default_db_path()?)
    }

    fn validate(&self) -> Result<()> {
        if self.db_path.as_os_str().is_empty() {
            return Err(FileIdError::Config("db_path must not be empty".into()));
        }
        if !self.db_path.is_absolute() {
            return Err(FileIdError::Config(format!(
                "db_path must be an absolute path: {}",
                self.db_path.display()
            )));
        }
        Ok(())
    }

    /// Additional validation for managers that reconcile against a real
    /// filesystem and therefore need a concrete root.
    pub(crate) fn validate_root_dir(&self) -> Result<()> {
        if self.root_dir.as_os_str().is_empty() {
            return Err(FileIdError::Config("root_dir must not be empty".into()));
        }
        if !self.root_dir.is_absolute() {
            return Err(FileIdError::Config(format!(
                "root_dir must be an absolute path: {}",
                self.root_dir.display()
            )));
        }
        Ok(())
    }
}

/// Default store path: `<user data dir>/file-identity/file_id_manager.db`.
pub fn default_db_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| FileIdError::Config("no user data directory available".into()))?;
    Ok(data_dir.join("file-identity").join(DB_FILE_NAME))
}
