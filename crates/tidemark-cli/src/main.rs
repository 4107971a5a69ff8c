mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tidemark", version, about = "Inspect and prepare migration tracking tables")]
struct Cli {
    /// SQLite database holding the tracking table
    #[arg(long, global = true, env = "TIDEMARK_DATABASE")]
    database: Option<PathBuf>,

    /// Config file (YAML or TOML); defaults to the user config dir
    #[arg(long, global = true, env = "TIDEMARK_CONFIG")]
    config: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a new timestamp version label
    NewVersion {
        /// Table or topic appended as `_NAME`
        name: Option<String>,
    },
    /// Create the tracking table if it does not exist
    InitTable,
    /// List every tracking record, rolled back ones included
    History {
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Command::NewVersion { name } => commands::new_version(name.as_deref(), &mut stdout),
        Command::InitTable => {
            let target = commands::resolve_target(cli.database, cli.config)?;
            commands::init_table(&target, &mut stdout)
        }
        Command::History { json } => {
            let target = commands::resolve_target(cli.database, cli.config)?;
            commands::history(&target, json, &mut stdout)
        }
    }
}
