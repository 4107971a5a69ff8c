use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tidemark_common::{Error, Result};
use tidemark_config::Options;
use tracing::info;

use crate::logger::{Logger, NilLogger, TracingLogger, WriterLogger};
use crate::migration::{Migration, MigrationFn, SCHEMA_INIT_VERSION};
use crate::record_store::{MigrationRecord, RecordStore};
use crate::schema::TrackingTable;
use crate::validator;
use crate::version;

/// Applies and rolls back an ordered list of migrations, recording which
/// versions have run in a tracking table.
///
/// Every public operation runs in a single transaction: it either commits
/// as a whole or leaves the database untouched.
pub struct Migrator {
    conn: Mutex<Connection>,
    options: Options,
    table: TrackingTable,
    migrations: Vec<Migration>,
    init_schema: Option<MigrationFn>,
    logger: Arc<dyn Logger>,
}

impl Migrator {
    pub fn new(conn: Connection, options: Options, migrations: Vec<Migration>) -> Self {
        let options = options.normalized();
        let table = TrackingTable::from_options(&options);
        Self {
            conn: Mutex::new(conn),
            options,
            table,
            migrations,
            init_schema: None,
            logger: Arc::new(TracingLogger),
        }
    }

    pub fn open(db_path: &Path, options: Options, migrations: Vec<Migration>) -> Result<Self> {
        info!("opening migration database at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::store("failed to open database", e))?;
        Ok(Self::new(conn, options, migrations))
    }

    pub fn in_memory(options: Options, migrations: Vec<Migration>) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::store("failed to open in-memory database", e))?;
        Ok(Self::new(conn, options, migrations))
    }

    /// Register a function that builds the whole schema at once.
    ///
    /// It only runs against a database with no migration history; all
    /// registered versions are then recorded as applied without running them.
    pub fn init_schema<F>(&mut self, init: F)
    where
        F: Fn(&Connection) -> Result<()> + Send + Sync + 'static,
    {
        self.init_schema = Some(Box::new(init));
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn tracking_table(&self) -> &TrackingTable {
        &self.table
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    pub fn migrations_mut(&mut self) -> &mut Vec<Migration> {
        &mut self.migrations
    }

    pub fn set_logger<L: Logger + 'static>(&mut self, logger: L) {
        self.logger = Arc::new(logger);
    }

    /// Log to standard output with the `[tidemark] ` prefix.
    pub fn default_logger(&mut self) {
        self.set_logger(WriterLogger::stdout());
    }

    pub fn nil_logger(&mut self) {
        self.set_logger(NilLogger);
    }

    pub fn new_logger<W: Write + Send + 'static>(&mut self, writer: W) {
        self.set_logger(WriterLogger::new(writer));
    }

    pub fn gen_version(&self) -> String {
        version::gen_version()
    }

    /// Apply every migration that has not run yet.
    pub fn migrate(&self) -> Result<()> {
        let result = self.run_forward(None);
        self.report("migrate", &result);
        result
    }

    /// Apply pending migrations up to and including `version`.
    pub fn migrate_to(&self, version: &str) -> Result<()> {
        let result = self.run_forward(Some(version));
        self.report("migrate", &result);
        result
    }

    /// Roll back the most recently applied migration in list order.
    pub fn rollback_last(&self) -> Result<()> {
        let result = self.run_rollback_last();
        self.report("rollback", &result);
        result
    }

    /// Roll back every applied migration after `version`, newest first.
    /// `version` itself stays applied.
    pub fn rollback_to(&self, version: &str) -> Result<()> {
        let result = self.run_rollback_to(version);
        self.report("rollback", &result);
        result
    }

    /// Roll back `migration` whether or not it is registered.
    pub fn rollback_migration(&self, migration: &Migration) -> Result<()> {
        let result = self.with_transaction(|tx| {
            let store = RecordStore::new(tx, &self.table);
            store.create_table_if_not_exists()?;
            self.undo(migration, tx, &store)
        });
        self.report("rollback", &result);
        result
    }

    /// Every tracking record in insertion order, rolled back ones included.
    pub fn history(&self) -> Result<Vec<MigrationRecord>> {
        let conn = self.connection()?;
        let store = RecordStore::new(&conn, &self.table);
        if !store.table_exists()? {
            return Ok(Vec::new());
        }
        store.records()
    }

    /// Registered versions that have run, in list order.
    pub fn applied_versions(&self) -> Result<Vec<String>> {
        self.partition_versions(true)
    }

    /// Registered versions that have not run, in list order.
    pub fn pending_versions(&self) -> Result<Vec<String>> {
        self.partition_versions(false)
    }

    /// Create the tracking table if it does not exist yet.
    pub fn ensure_tracking_table(&self) -> Result<bool> {
        self.with_transaction(|tx| RecordStore::new(tx, &self.table).create_table_if_not_exists())
    }

    /// Run `f` against the underlying connection outside any migration.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.connection()?;
        f(&conn)
    }

    pub fn into_connection(self) -> Result<Connection> {
        self.conn
            .into_inner()
            .map_err(|_| Error::Database("migrator lock poisoned".into()))
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("migrator lock poisoned".into()))
    }

    /// Run `f` inside one transaction. Dropping the transaction on any early
    /// return rolls it back; only a successful `f` commits.
    fn with_transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.connection()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| Error::store("failed to begin transaction", e))?;
        let value = f(&tx)?;
        tx.commit()
            .map_err(|e| Error::store("failed to commit transaction", e))?;
        Ok(value)
    }

    fn has_migrations(&self) -> bool {
        self.init_schema.is_some() || !self.migrations.is_empty()
    }

    fn run_forward(&self, target: Option<&str>) -> Result<()> {
        if !self.has_migrations() {
            return Err(Error::NoMigrationDefined);
        }
        validator::check_reserved_version(&self.migrations)?;
        validator::check_duplicate_version(&self.migrations)?;
        if let Some(version) = target {
            validator::check_version_exists(&self.migrations, version)?;
        }

        self.with_transaction(|tx| {
            let store = RecordStore::new(tx, &self.table);
            store.create_table_if_not_exists()?;

            if self.options.validate_unknown_migrations {
                let known = validator::known_versions(&self.migrations);
                let unknown = store.list_unknown_past(&known)?;
                if !unknown.is_empty() {
                    self.logger.warn(&format!(
                        "unknown migrations in {}: {}",
                        self.table.table_name(),
                        unknown.join(", ")
                    ));
                    return Err(Error::UnknownPastMigration);
                }
            }

            if let Some(init) = &self.init_schema {
                if Self::can_initialize_schema(&store)? {
                    return self.run_init_schema(init, tx, &store);
                }
            }

            for migration in &self.migrations {
                self.apply(migration, tx, &store)?;
                if target == Some(migration.version()) {
                    break;
                }
            }
            Ok(())
        })
    }

    /// Only a store with no rows at all, not even rolled back ones, may be
    /// bulk-initialized.
    fn can_initialize_schema(store: &RecordStore<'_>) -> Result<bool> {
        if store.has_run(SCHEMA_INIT_VERSION)? {
            return Ok(false);
        }
        Ok(store.count()? == 0)
    }

    fn run_init_schema(
        &self,
        init: &MigrationFn,
        conn: &Connection,
        store: &RecordStore<'_>,
    ) -> Result<()> {
        init(conn)?;
        store.insert(SCHEMA_INIT_VERSION)?;
        for migration in &self.migrations {
            if migration.version().is_empty() {
                return Err(Error::MissingVersion);
            }
            store.insert(migration.version())?;
        }
        self.logger.info(&format!(
            "initialized schema, marked {} migrations as applied",
            self.migrations.len()
        ));
        Ok(())
    }

    fn apply(&self, migration: &Migration, conn: &Connection, store: &RecordStore<'_>) -> Result<()> {
        if migration.version().is_empty() {
            return Err(Error::MissingVersion);
        }
        if store.has_run(migration.version())? {
            self.logger
                .debug(&format!("skipping {}, already applied", migration.version()));
            return Ok(());
        }

        migration.run_forward(conn)?;
        store.insert(migration.version())?;
        self.logger.info(&describe("applied", migration));
        Ok(())
    }

    fn run_rollback_last(&self) -> Result<()> {
        if self.migrations.is_empty() {
            return Err(Error::NoMigrationDefined);
        }

        self.with_transaction(|tx| {
            let store = RecordStore::new(tx, &self.table);
            store.create_table_if_not_exists()?;

            let mut last_run = None;
            for migration in self.migrations.iter().rev() {
                if store.has_run(migration.version())? {
                    last_run = Some(migration);
                    break;
                }
            }
            let migration = last_run.ok_or(Error::NoRunMigration)?;
            self.undo(migration, tx, &store)
        })
    }

    fn run_rollback_to(&self, version: &str) -> Result<()> {
        if self.migrations.is_empty() {
            return Err(Error::NoMigrationDefined);
        }
        validator::check_version_exists(&self.migrations, version)?;

        self.with_transaction(|tx| {
            let store = RecordStore::new(tx, &self.table);
            store.create_table_if_not_exists()?;

            for migration in self.migrations.iter().rev() {
                if migration.version() == version {
                    break;
                }
                if store.has_run(migration.version())? {
                    self.undo(migration, tx, &store)?;
                }
            }
            Ok(())
        })
    }

    /// The record is only touched after the reverse action succeeds.
    fn undo(&self, migration: &Migration, conn: &Connection, store: &RecordStore<'_>) -> Result<()> {
        migration.run_rollback(conn)?;

        let touched = if self.options.hard_delete {
            store.delete(migration.version())?
        } else {
            store.mark_undone(migration.version())?
        };
        if touched == 0 {
            self.logger.warn(&format!(
                "rolled back {} but it had no tracking record",
                migration.version()
            ));
        }
        self.logger.info(&describe("rolled back", migration));
        Ok(())
    }

    fn partition_versions(&self, applied: bool) -> Result<Vec<String>> {
        let conn = self.connection()?;
        let store = RecordStore::new(&conn, &self.table);
        let table_exists = store.table_exists()?;

        let mut versions = Vec::new();
        for migration in &self.migrations {
            let has_run = table_exists && store.has_run(migration.version())?;
            if has_run == applied {
                versions.push(migration.version().to_string());
            }
        }
        Ok(versions)
    }

    fn report(&self, operation: &str, result: &Result<()>) {
        if let Err(e) = result {
            self.logger.error(&format!("{operation} failed: {e}"));
        }
    }
}

fn describe(action: &str, migration: &Migration) -> String {
    if migration.description().is_empty() {
        format!("{action} migration {}", migration.version())
    } else {
        format!(
            "{action} migration {} ({})",
            migration.version(),
            migration.description()
        )
    }
}
