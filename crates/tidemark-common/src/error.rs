use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A registered migration uses the version reserved for the schema-init marker.
    #[error("reserved migration version: {version:?}")]
    ReservedVersion { version: String },

    #[error("duplicated migration version: {version:?}")]
    DuplicatedVersion { version: String },

    #[error("missing version in migration")]
    MissingVersion,

    #[error("tried to migrate to a version that doesn't exist")]
    MigrationVersionDoesNotExist,

    #[error("no migration defined")]
    NoMigrationDefined,

    #[error("could not find last run migration")]
    NoRunMigration,

    #[error("it's impossible to rollback this migration")]
    RollbackImpossible,

    /// The tracking table references a version absent from the registered list.
    #[error("found migration in the database that does not exist in code")]
    UnknownPastMigration,

    /// A tracking-table or transaction statement failed.
    #[error("{context}: {source}")]
    Store {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("database error: {0}")]
    Database(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn store(context: impl Into<String>, source: rusqlite::Error) -> Self {
        Error::Store {
            context: context.into(),
            source,
        }
    }

    /// The SQLite result code behind this error, if it came from SQLite.
    pub fn sqlite_code(&self) -> Option<rusqlite::ErrorCode> {
        match self {
            Error::Store { source, .. } | Error::Sqlite(source) => source.sqlite_error_code(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn error_display_includes_context() {
        let e = Error::DuplicatedVersion {
            version: "202307241038".into(),
        };
        assert_eq!(
            e.to_string(),
            "duplicated migration version: \"202307241038\""
        );

        let e = Error::ReservedVersion {
            version: "SCHEMA_INIT".into(),
        };
        assert_eq!(e.to_string(), "reserved migration version: \"SCHEMA_INIT\"");

        let e = Error::store(
            "failed to count migrations",
            rusqlite::Error::QueryReturnedNoRows,
        );
        assert_eq!(
            e.to_string(),
            "failed to count migrations: Query returned no rows"
        );

        let e = Error::Database("locked".into());
        assert_eq!(e.to_string(), "database error: locked");

        let e = Error::Other("misc".into());
        assert_eq!(e.to_string(), "misc");
    }

    #[test]
    fn sqlite_errors_convert_with_question_mark() {
        fn run() -> super::Result<()> {
            Err(rusqlite::Error::QueryReturnedNoRows)?;
            Ok(())
        }
        assert!(matches!(run(), Err(Error::Sqlite(_))));
    }

    #[test]
    fn sqlite_code_is_exposed_for_sqlite_failures() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let source = conn.execute("INSERT INTO t VALUES ('a')", []).unwrap_err();
        let e = Error::store("failed to insert", source);
        assert_eq!(
            e.sqlite_code(),
            Some(rusqlite::ErrorCode::ConstraintViolation)
        );

        assert_eq!(Error::NoRunMigration.sqlite_code(), None);
    }
}
