//! Binary entry point: resolve configuration, set up file logging, open the
//! set store, and either run a one-shot command or the terminal client.
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lyric_sets::cache::{backup_file_name, LocalCache};
use lyric_sets::config::{self, Config};
use lyric_sets::repository::{Health, HealthStatus};
use lyric_sets::{
    run_app, App, LegacyMigration, Library, LoadOutcome, Repository, SetRepository, Store,
};

#[derive(Parser)]
#[command(name = "lyric-sets", about = "Organize and perform ordered sets of song lyrics")]
struct Cli {
    /// Settings file to use instead of `<data dir>/config.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Runs the terminal client when omitted.
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the set store answers; prints status and timestamp as JSON.
    Health,
    /// Add set positions to a database created before sets were ordered.
    MigrateSchema,
    /// Write all sets to a dated backup file.
    Export {
        /// Destination file (defaults to lyric-sets-backup-YYYY-MM-DD.json).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Add the sets from a backup file to the store.
    Import { path: PathBuf },
    /// Copy the local snapshot into an empty store.
    MigrateLocal {
        /// Confirm the migration; without it the command only reports.
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let data_dir = config::data_dir()?;
    fs::create_dir_all(&data_dir).context("failed to create data directory")?;
    let config = Config::load(&data_dir, cli.config.as_deref())?;
    let _guard = init_tracing(&config)?;

    let result = match cli.command {
        None => run_terminal(&config),
        Some(command) => run_command(command, &config),
    };
    if let Err(err) = &result {
        tracing::error!(error = ?err, "exiting with error");
    }
    result
}

/// Logs go to a daily file because the terminal belongs to the UI.
fn init_tracing(config: &Config) -> Result<WorkerGuard> {
    let log_dir = config.log_dir();
    fs::create_dir_all(&log_dir).context("failed to create log directory")?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "lyric-sets.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    Ok(guard)
}

fn open_library(config: &Config) -> Library<Repository> {
    let cache = LocalCache::new(config.snapshot_path());
    match Store::open(&config.database_path()) {
        Ok(store) => Library::new(Repository::new(store), cache, config.list_order),
        Err(err) => {
            warn!(error = ?err, "set store unavailable; starting from the local snapshot");
            Library::offline(cache, config.list_order)
        }
    }
}

fn close_library(library: Library<Repository>) -> Result<()> {
    if let Some(repo) = library.into_repository() {
        repo.close()?;
    }
    Ok(())
}

fn run_terminal(config: &Config) -> Result<()> {
    info!("lyric-sets starting up");
    let mut library = open_library(config);
    let outcome = library.load();

    let mut app = App::new(library, outcome, config.autosave_quiet());
    let result = run_app(&mut app);

    close_library(app.into_library())?;
    info!("lyric-sets shutting down");
    result
}

fn run_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Health => {
            let health = match Store::open(&config.database_path()) {
                Ok(store) => {
                    let repo = Repository::new(store);
                    let health = repo.health();
                    repo.close()?;
                    health
                }
                Err(err) => {
                    warn!(error = ?err, "health probe could not open the store");
                    Health::now(HealthStatus::Unavailable)
                }
            };
            println!("{}", serde_json::to_string(&health)?);
            if health.status != HealthStatus::Ok {
                bail!("set store is unavailable");
            }
        }
        Commands::MigrateSchema => {
            let mut store = Store::connect(&config.database_path())?;
            store.create_schema()?;
            match store.migrate_legacy_schema()? {
                LegacyMigration::AlreadyCurrent => {
                    println!("Position column already exists. Nothing to migrate.")
                }
                LegacyMigration::Backfilled { sets } => {
                    println!("Added set positions; initialized {sets} sets.")
                }
            }
            store.close()?;
        }
        Commands::Export { output } => {
            let mut library = open_library(config);
            if let LoadOutcome::Offline { cached } = library.load() {
                eprintln!("Store unavailable; exporting {cached} sets from the local snapshot.");
            }
            let path =
                output.unwrap_or_else(|| PathBuf::from(backup_file_name(Local::now().date_naive())));
            fs::write(&path, library.export_payload()?)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Exported {} sets to {}.", library.sets().len(), path.display());
            close_library(library)?;
        }
        Commands::Import { path } => {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let mut library = open_library(config);
            library.load();
            let report = library.import_payload(&text)?;
            println!("Imported {} sets.", report.succeeded);
            if report.failed > 0 {
                println!("Failed: {}", report.failed);
            }
            close_library(library)?;
        }
        Commands::MigrateLocal { yes } => {
            let mut library = open_library(config);
            match library.load() {
                LoadOutcome::MigrationAvailable { pending } if yes => {
                    let report = library.migrate_local()?;
                    println!(
                        "Migrated {} of {pending} local sets ({} failed).",
                        report.succeeded, report.failed
                    );
                }
                LoadOutcome::MigrationAvailable { pending } => {
                    println!(
                        "Found {pending} local sets in {}. Re-run with --yes to copy them into the store.",
                        library.cache().path().display()
                    );
                }
                LoadOutcome::Loaded { sets } if sets > 0 => {
                    println!("The store already holds {sets} sets; nothing to migrate.")
                }
                LoadOutcome::Loaded { .. } => println!("No local sets to migrate."),
                LoadOutcome::Offline { .. } => bail!("set store is unavailable"),
            }
            io::stdout().flush()?;
            close_library(library)?;
        }
    }
    Ok(())
}
