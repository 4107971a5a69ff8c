use std::fmt;

use rusqlite::Connection;
use tidemark_common::{Error, Result};

/// Version recorded when the schema initializer bulk-applies the schema.
/// Registered migrations may not use it.
pub const SCHEMA_INIT_VERSION: &str = "SCHEMA_INIT";

/// A unit of work run against the connection of the in-flight transaction.
///
/// Actions must not issue their own `BEGIN`/`COMMIT`; the migrator owns the
/// transaction boundary.
pub type MigrationFn = Box<dyn Fn(&Connection) -> Result<()> + Send + Sync>;

/// A versioned forward change with an optional reverse action.
pub struct Migration {
    version: String,
    description: String,
    migrate: MigrationFn,
    rollback: Option<MigrationFn>,
}

impl Migration {
    /// `version` is usually a timestamp like `"202307241038"`, optionally
    /// suffixed with the table it touches (`"202307241038_person"`).
    pub fn new<F>(version: impl Into<String>, migrate: F) -> Self
    where
        F: Fn(&Connection) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            version: version.into(),
            description: String::new(),
            migrate: Box::new(migrate),
            rollback: None,
        }
    }

    /// A migration whose forward action is a batch of SQL statements.
    pub fn from_sql(version: impl Into<String>, sql: &'static str) -> Self {
        Self::new(version, move |conn| {
            conn.execute_batch(sql)?;
            Ok(())
        })
    }

    pub fn with_rollback<F>(mut self, rollback: F) -> Self
    where
        F: Fn(&Connection) -> Result<()> + Send + Sync + 'static,
    {
        self.rollback = Some(Box::new(rollback));
        self
    }

    pub fn with_rollback_sql(self, sql: &'static str) -> Self {
        self.with_rollback(move |conn| {
            conn.execute_batch(sql)?;
            Ok(())
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_reversible(&self) -> bool {
        self.rollback.is_some()
    }

    pub(crate) fn run_forward(&self, conn: &Connection) -> Result<()> {
        (self.migrate)(conn)
    }

    pub(crate) fn run_rollback(&self, conn: &Connection) -> Result<()> {
        match &self.rollback {
            Some(rollback) => rollback(conn),
            None => Err(Error::RollbackImpossible),
        }
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version)
            .field("description", &self.description)
            .field("reversible", &self.is_reversible())
            .finish()
    }
}
