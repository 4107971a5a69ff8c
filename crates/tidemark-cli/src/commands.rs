use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tidemark_config::{ConfigLoader, Options};
use tidemark_db::{Migrator, gen_version, gen_version_for};
use tracing::info;

/// Database and tracking options a command operates on.
#[derive(Debug)]
pub struct Target {
    pub database: PathBuf,
    pub options: Options,
}

/// Merge the `--database` flag with the config file; the flag wins.
pub fn resolve_target(database: Option<PathBuf>, config: Option<PathBuf>) -> Result<Target> {
    let app_config = match config {
        Some(path) => ConfigLoader::load(&path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => match ConfigLoader::default_path() {
            Some(path) => ConfigLoader::load_or_default(&path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => Default::default(),
        },
    };

    let Some(database) = database.or(app_config.database) else {
        bail!("no database given; pass --database or set `database` in the config file");
    };
    Ok(Target {
        database,
        options: app_config.tracking,
    })
}

pub fn new_version(name: Option<&str>, out: &mut impl Write) -> Result<()> {
    let version = match name {
        Some(name) if !name.is_empty() => gen_version_for(name),
        _ => gen_version(),
    };
    writeln!(out, "{version}")?;
    Ok(())
}

pub fn init_table(target: &Target, out: &mut impl Write) -> Result<()> {
    let migrator = open(target)?;
    let created = migrator
        .ensure_tracking_table()
        .context("failed to create tracking table")?;

    let table = migrator.tracking_table().table_name();
    if created {
        info!("created tracking table {table} in {}", target.database.display());
        writeln!(out, "created {table}")?;
    } else {
        writeln!(out, "{table} already exists")?;
    }
    Ok(())
}

pub fn history(target: &Target, json: bool, out: &mut impl Write) -> Result<()> {
    let migrator = open(target)?;
    let records = migrator
        .history()
        .context("failed to read migration history")?;

    if json {
        serde_json::to_writer_pretty(&mut *out, &records)?;
        writeln!(out)?;
        return Ok(());
    }

    if records.is_empty() {
        writeln!(out, "no migrations recorded")?;
        return Ok(());
    }
    let width = records
        .iter()
        .map(|r| r.version.len())
        .max()
        .unwrap_or(0)
        .max("VERSION".len());
    writeln!(out, "{:<6}{:<width$}  STATUS", "ID", "VERSION")?;
    for record in &records {
        let status = if record.is_rollback {
            "rolled back"
        } else {
            "applied"
        };
        writeln!(out, "{:<6}{:<width$}  {status}", record.id, record.version)?;
    }
    Ok(())
}

fn open(target: &Target) -> Result<Migrator> {
    Migrator::open(&target.database, target.options.clone(), Vec::new())
        .with_context(|| format!("failed to open {}", target.database.display()))
}
