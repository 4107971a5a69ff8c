use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tidemark_common::{Error, Result};

pub const DEFAULT_TABLE_NAME: &str = "migrations";
pub const DEFAULT_VERSION_COLUMN_NAME: &str = "version";
pub const DEFAULT_VERSION_COLUMN_SIZE: u32 = 255;

/// Options shared by every operation of a migrator.
///
/// Empty names and a zero column size are placeholders for the defaults;
/// call [`Options::normalized`] to resolve them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub table_name: String,
    pub version_column_name: String,
    pub version_column_size: u32,
    /// Fail when the tracking table holds versions that are not registered.
    pub validate_unknown_migrations: bool,
    /// Delete tracking rows on rollback instead of flagging them.
    pub hard_delete: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            version_column_name: DEFAULT_VERSION_COLUMN_NAME.to_string(),
            version_column_size: DEFAULT_VERSION_COLUMN_SIZE,
            validate_unknown_migrations: false,
            hard_delete: false,
        }
    }
}

impl Options {
    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    pub fn with_version_column(mut self, name: impl Into<String>, size: u32) -> Self {
        self.version_column_name = name.into();
        self.version_column_size = size;
        self
    }

    pub fn with_validate_unknown_migrations(mut self, enabled: bool) -> Self {
        self.validate_unknown_migrations = enabled;
        self
    }

    pub fn with_hard_delete(mut self, enabled: bool) -> Self {
        self.hard_delete = enabled;
        self
    }

    /// Replace unset fields with their defaults.
    pub fn normalized(mut self) -> Self {
        if self.table_name.trim().is_empty() {
            self.table_name = DEFAULT_TABLE_NAME.to_string();
        }
        if self.version_column_name.trim().is_empty() {
            self.version_column_name = DEFAULT_VERSION_COLUMN_NAME.to_string();
        }
        if self.version_column_size == 0 {
            self.version_column_size = DEFAULT_VERSION_COLUMN_SIZE;
        }
        self
    }

    /// Reject names that cannot be used as quoted SQL identifiers.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("table_name", &self.table_name),
            ("version_column_name", &self.version_column_name),
        ] {
            if value.contains('\0') {
                return Err(Error::Config(format!("{field} contains a NUL character")));
            }
        }
        if self.version_column_name == "id" || self.version_column_name == "is_rollback" {
            return Err(Error::Config(format!(
                "version_column_name {:?} collides with a tracking column",
                self.version_column_name
            )));
        }
        Ok(())
    }
}

/// Top-level layout of a tidemark config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Path of the SQLite database the tracking table lives in.
    pub database: Option<PathBuf>,
    pub tracking: Options,
}
