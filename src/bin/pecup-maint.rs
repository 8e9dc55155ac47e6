//! pecup-maint - offline maintenance for a pecup data directory.
//!
//! Stop the server before running these; redb holds an exclusive file lock.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pecup::maintenance::{self, ImportResource, SeedFile};
use pecup::storage::Database;

#[derive(Parser, Debug)]
#[command(name = "pecup-maint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding pecup.redb
    #[arg(long, default_value = "./data", env = "DATA_DIR")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert branches, years and semesters from a JSON file. Existing rows are skipped.
    SeedLookups {
        /// Path to a JSON file with `branches`, `years` and `semesters` arrays
        file: PathBuf,
    },
    /// Bulk-insert link resources from a JSON array
    ImportResources {
        file: PathBuf,
    },
    /// Delete audit entries older than the given age
    PruneAudit {
        #[arg(long)]
        older_than_days: u32,
    },
    /// Print row counts per table
    Stats,
}

fn main() -> ExitCode {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let db = Database::open(&cli.data_dir)
        .with_context(|| format!("opening database in {}", cli.data_dir.display()))?;

    match cli.command {
        Command::SeedLookups { file } => {
            let seed: SeedFile = read_json(&file)?;
            let report = maintenance::seed_lookups(&db, &seed)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::ImportResources { file } => {
            let rows: Vec<ImportResource> = read_json(&file)?;
            let imported = maintenance::import_resources(&db, &rows)?;
            info!(count = imported.len(), "Import complete");
            for resource in &imported {
                println!("{}\t{}\t{}", resource.id, resource.subject, resource.name);
            }
        }
        Command::PruneAudit { older_than_days } => {
            let cutoff = maintenance::audit_cutoff(chrono::Utc::now(), older_than_days)?;
            let removed = db.prune_audit(cutoff)?;
            info!(removed, %cutoff, "Pruned audit log");
            println!("{removed}");
        }
        Command::Stats => {
            let stats = db.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}
