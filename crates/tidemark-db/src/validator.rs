//! Registration checks over the declared migration list.
//!
//! They are pure and run before any transaction is opened, on every call,
//! since the list may change between calls.

use std::collections::HashSet;

use tidemark_common::{Error, Result};

use crate::migration::{Migration, SCHEMA_INIT_VERSION};

pub fn check_reserved_version(migrations: &[Migration]) -> Result<()> {
    match migrations
        .iter()
        .find(|m| m.version() == SCHEMA_INIT_VERSION)
    {
        Some(m) => Err(Error::ReservedVersion {
            version: m.version().to_string(),
        }),
        None => Ok(()),
    }
}

/// Fails on the first version seen twice, in list order.
pub fn check_duplicate_version(migrations: &[Migration]) -> Result<()> {
    let mut seen = HashSet::with_capacity(migrations.len());
    for m in migrations {
        if !seen.insert(m.version()) {
            return Err(Error::DuplicatedVersion {
                version: m.version().to_string(),
            });
        }
    }
    Ok(())
}

pub fn check_version_exists(migrations: &[Migration], version: &str) -> Result<()> {
    if migrations.iter().any(|m| m.version() == version) {
        Ok(())
    } else {
        Err(Error::MigrationVersionDoesNotExist)
    }
}

/// The versions a tracking table may legitimately hold.
pub fn known_versions(migrations: &[Migration]) -> HashSet<&str> {
    let mut known: HashSet<&str> = migrations.iter().map(Migration::version).collect();
    known.insert(SCHEMA_INIT_VERSION);
    known
}
