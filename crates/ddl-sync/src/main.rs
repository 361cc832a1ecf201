//! ddl-sync CLI
//!
//! Command-line tool for converging a database onto a JSON schema file.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ddl_sync::prelude::*;

/// Declarative schema synchronization for MySQL, PostgreSQL and SQLite.
#[derive(Parser)]
#[command(name = "ddl-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL.
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Dialect (mysql, postgres, sqlite). Inferred from the URL if omitted.
    #[arg(long)]
    dialect: Option<String>,

    /// Time zone for timestamp literals (local, Z, +HH:MM).
    #[arg(long, default_value = "local")]
    time_zone: String,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Converge the database onto a schema file.
    Sync {
        /// Schema file (JSON).
        #[arg(short, long)]
        schema: PathBuf,

        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,
    },

    /// Drop a table.
    Drop {
        /// Table name.
        #[arg(short, long)]
        table: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let kind = resolve_dialect(&cli.database, cli.dialect.as_deref())?;
    let options = SyncOptions::new().time_zone(cli.time_zone.parse()?);

    // DDL is strictly serial, one connection is enough.
    match kind {
        DialectKind::Sqlite => {
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect(&cli.database)
                .await?;
            run(kind, options, pool, cli.command).await
        }
        DialectKind::Mysql => {
            let pool = MySqlPoolOptions::new()
                .max_connections(1)
                .connect(&cli.database)
                .await?;
            run(kind, options, pool, cli.command).await
        }
        DialectKind::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(1)
                .connect(&cli.database)
                .await?;
            run(kind, options, pool, cli.command).await
        }
    }
}

async fn run<D: Driver>(
    kind: DialectKind,
    options: SyncOptions,
    driver: D,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Sync { schema, dry_run } => {
            let collections = SchemaFile::from_path(&schema)?.into_collections()?;
            info!(
                schema = %schema.display(),
                collections = collections.len(),
                "Loaded schema"
            );

            if dry_run {
                info!("Dry run mode - SQL will be printed but not executed.");
                let mut sync = Synchronizer::with_options(kind, DryRun::new(driver), options);
                for collection in collections {
                    sync.define(collection);
                }
                let report = sync.sync().await?;

                for statement in sync.driver().statements() {
                    println!("{statement};");
                }
                println!("{} change(s) would be applied", report.changes_applied);
            } else {
                let mut sync = Synchronizer::with_options(kind, driver, options);
                for collection in collections {
                    sync.define(collection);
                }
                let report = sync.sync().await?;
                println!("{} change(s) applied", report.changes_applied);
            }
        }

        Commands::Drop { table } => {
            let sync = Synchronizer::with_options(kind, driver, options);
            if sync.drop_collection(&table).await? {
                info!("Dropped table: {}", table);
            } else {
                info!("Table does not exist: {}", table);
            }
        }
    }

    Ok(())
}
