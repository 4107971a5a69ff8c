use std::collections::HashSet;

use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tidemark_common::{Error, Result};
use tracing::debug;

use crate::schema::{ID_COLUMN, IS_ROLLBACK_COLUMN, TrackingTable};

/// One row of the tracking table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub id: i64,
    pub version: String,
    /// Set once the version has been soft-rolled-back.
    pub is_rollback: bool,
}

/// Reads and writes tracking rows through a borrowed connection.
///
/// The migrator hands it the connection of the in-flight transaction, so
/// every write is undone together with the migration actions on failure.
pub struct RecordStore<'c> {
    conn: &'c Connection,
    table: &'c TrackingTable,
}

impl<'c> RecordStore<'c> {
    pub fn new(conn: &'c Connection, table: &'c TrackingTable) -> Self {
        Self { conn, table }
    }

    /// Table names match case-insensitively, as SQLite resolves them.
    pub fn table_exists(&self) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT count(*) > 0 FROM sqlite_master \
                 WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
                params![self.table.table_name()],
                |row| row.get(0),
            )
            .map_err(|e| Error::store("failed to probe tracking table", e))
    }

    /// Create the tracking table unless it already exists. Returns whether
    /// the table was created by this call.
    pub fn create_table_if_not_exists(&self) -> Result<bool> {
        if self.table_exists()? {
            return Ok(false);
        }
        self.conn
            .execute_batch(&self.table.create_sql())
            .map_err(|e| Error::store("failed to create tracking table", e))?;
        debug!("created tracking table {}", self.table.table_name());
        Ok(true)
    }

    /// True iff a non-rolled-back record exists for `version`.
    pub fn has_run(&self, version: &str) -> Result<bool> {
        let sql = format!(
            "SELECT count(*) > 0 FROM {} WHERE {} = ?1 AND {IS_ROLLBACK_COLUMN} = 0",
            self.table.quoted_table(),
            self.table.quoted_version(),
        );
        self.conn
            .query_row(&sql, params![version], |row| row.get(0))
            .map_err(|e| Error::store(format!("failed to check migration {version}"), e))
    }

    /// Number of rows, rolled back or not.
    pub fn count(&self) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.table.quoted_table());
        self.conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|e| Error::store("failed to count migrations", e))
    }

    /// Record `version` as applied.
    ///
    /// A soft-rolled-back row for the same version is revived in place, since
    /// the unique version column would reject a second row.
    pub fn insert(&self, version: &str) -> Result<()> {
        let revive = format!(
            "UPDATE {} SET {IS_ROLLBACK_COLUMN} = 0 WHERE {} = ?1 AND {IS_ROLLBACK_COLUMN} <> 0",
            self.table.quoted_table(),
            self.table.quoted_version(),
        );
        let revived = self
            .conn
            .execute(&revive, params![version])
            .map_err(|e| Error::store(format!("failed to record migration {version}"), e))?;
        if revived > 0 {
            debug!("revived rolled back record for {version}");
            return Ok(());
        }

        let insert = format!(
            "INSERT INTO {} ({}, {IS_ROLLBACK_COLUMN}) VALUES (?1, 0)",
            self.table.quoted_table(),
            self.table.quoted_version(),
        );
        self.conn
            .execute(&insert, params![version])
            .map_err(|e| Error::store(format!("failed to record migration {version}"), e))?;
        Ok(())
    }

    /// Flag the record for `version` as rolled back, keeping the row.
    pub fn mark_undone(&self, version: &str) -> Result<usize> {
        let sql = format!(
            "UPDATE {} SET {IS_ROLLBACK_COLUMN} = 1 WHERE {} = ?1",
            self.table.quoted_table(),
            self.table.quoted_version(),
        );
        self.conn
            .execute(&sql, params![version])
            .map_err(|e| Error::store(format!("failed to mark {version} rolled back"), e))
    }

    /// Physically remove the record for `version`.
    pub fn delete(&self, version: &str) -> Result<usize> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            self.table.quoted_table(),
            self.table.quoted_version(),
        );
        self.conn
            .execute(&sql, params![version])
            .map_err(|e| Error::store(format!("failed to delete record {version}"), e))
    }

    /// Every row in insertion order, including rolled back ones.
    pub fn records(&self) -> Result<Vec<MigrationRecord>> {
        let sql = format!(
            "SELECT {ID_COLUMN}, {}, {IS_ROLLBACK_COLUMN} FROM {} ORDER BY {ID_COLUMN} ASC",
            self.table.quoted_version(),
            self.table.quoted_table(),
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| Error::store("failed to prepare query", e))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(MigrationRecord {
                    id: row.get(0)?,
                    version: row.get(1)?,
                    is_rollback: row.get::<_, Option<i64>>(2)?.unwrap_or(0) != 0,
                })
            })
            .map_err(|e| Error::store("failed to query migrations", e))?;

        let mut records = Vec::new();
        for row in rows {
            records
                .push(row.map_err(|e| Error::store("failed to read record row", e))?);
        }
        Ok(records)
    }

    /// Versions present in the table that are not in `known`.
    pub fn list_unknown_past(&self, known: &HashSet<&str>) -> Result<Vec<String>> {
        Ok(self
            .records()?
            .into_iter()
            .map(|r| r.version)
            .filter(|v| !known.contains(v.as_str()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_config::Options;

    fn setup(options: &Options) -> (Connection, TrackingTable) {
        let conn = Connection::open_in_memory().unwrap();
        let table = TrackingTable::from_options(options);
        RecordStore::new(&conn, &table)
            .create_table_if_not_exists()
            .unwrap();
        (conn, table)
    }

    #[test]
    fn create_table_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        let table = TrackingTable::from_options(&Options::default());
        let store = RecordStore::new(&conn, &table);

        assert!(!store.table_exists().unwrap());
        assert!(store.create_table_if_not_exists().unwrap());
        assert!(!store.create_table_if_not_exists().unwrap());
        assert!(store.table_exists().unwrap());
    }

    #[test]
    fn insert_then_has_run() {
        let (conn, table) = setup(&Options::default());
        let store = RecordStore::new(&conn, &table);

        assert!(!store.has_run("v1").unwrap());
        store.insert("v1").unwrap();
        assert!(store.has_run("v1").unwrap());
        assert!(!store.has_run("v2").unwrap());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn mark_undone_keeps_row_but_clears_has_run() {
        let (conn, table) = setup(&Options::default());
        let store = RecordStore::new(&conn, &table);
        store.insert("v1").unwrap();

        assert_eq!(store.mark_undone("v1").unwrap(), 1);
        assert!(!store.has_run("v1").unwrap());
        assert_eq!(store.count().unwrap(), 1);

        let records = store.records().unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_rollback);
    }

    #[test]
    fn delete_removes_row() {
        let (conn, table) = setup(&Options::default());
        let store = RecordStore::new(&conn, &table);
        store.insert("v1").unwrap();
        store.insert("v2").unwrap();

        assert_eq!(store.delete("v1").unwrap(), 1);
        assert_eq!(store.delete("missing").unwrap(), 0);
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.has_run("v2").unwrap());
    }

    #[test]
    fn insert_revives_soft_deleted_record() {
        let (conn, table) = setup(&Options::default());
        let store = RecordStore::new(&conn, &table);
        store.insert("v1").unwrap();
        store.mark_undone("v1").unwrap();

        store.insert("v1").unwrap();
        assert!(store.has_run("v1").unwrap());
        let records = store.records().unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].is_rollback);
    }

    #[test]
    fn inserting_an_applied_version_twice_fails() {
        let (conn, table) = setup(&Options::default());
        let store = RecordStore::new(&conn, &table);
        store.insert("v1").unwrap();
        let err = store.insert("v1").unwrap_err();
        assert!(matches!(err, Error::Store { .. }));
        assert_eq!(
            err.sqlite_code(),
            Some(rusqlite::ErrorCode::ConstraintViolation)
        );
    }

    #[test]
    fn table_probe_ignores_name_case() {
        let (conn, _) = setup(&Options::default());
        let table = TrackingTable::from_options(&Options::default().with_table_name("Migrations"));
        let store = RecordStore::new(&conn, &table);

        assert!(store.table_exists().unwrap());
        assert!(!store.create_table_if_not_exists().unwrap());
    }

    #[test]
    fn lists_unknown_versions() {
        let (conn, table) = setup(&Options::default());
        let store = RecordStore::new(&conn, &table);
        store.insert("v1").unwrap();
        store.insert("X").unwrap();
        store.mark_undone("X").unwrap();

        let known: HashSet<&str> = ["v1"].into_iter().collect();
        assert_eq!(store.list_unknown_past(&known).unwrap(), vec!["X".to_string()]);
    }

    #[test]
    fn honors_custom_table_and_column_names() {
        let options = Options::default()
            .with_table_name("schema history")
            .with_version_column("tag", 16);
        let (conn, table) = setup(&options);
        let store = RecordStore::new(&conn, &table);
        store.insert("v1").unwrap();

        let tag: String = conn
            .query_row("SELECT \"tag\" FROM \"schema history\"", [], |row| row.get(0))
            .unwrap();
        assert_eq!(tag, "v1");
    }
}
