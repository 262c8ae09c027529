use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use waystone::config::{load_config, ConfigOverrides, RunMode};
use waystone::dbms::open_database;
use waystone::migration::{Migrator, ScriptRegistry};
use waystone::utils::DEFAULT_CONFIG_FILE;

/// Waystone - versioned database migrations applied exactly once
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file. A missing file is ignored.
    #[arg(short, long, env = "WAYSTONE_CONFIG_FILE", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Directory containing V<version>__<description>.<ext> files
    #[arg(long, env = "WAYSTONE_DATABASE_MIGRATION_DIR")]
    migration_dir: Option<PathBuf>,

    /// Database name (the file path for SQLite)
    #[arg(long, env = "WAYSTONE_DATABASE_NAME")]
    database_name: Option<String>,

    /// Ledger table recording applied migrations
    #[arg(long, env = "WAYSTONE_TABLE")]
    database_table: Option<String>,

    /// Do not compare applied migrations against their source files
    #[arg(long)]
    skip_checksums: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending migrations
    Migrate {
        /// Run on a cooperative scheduler, allowing async procedural migrations
        #[arg(long = "async")]
        cooperative: bool,
    },
    /// Check applied migrations against their source files
    Validate,
    /// List every migration and its status
    Info,
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Parse CLI arguments
    let args = Args::parse();

    let run_mode = match args.command {
        Command::Migrate { cooperative: true } => Some(RunMode::Cooperative),
        _ => None,
    };
    let overrides = ConfigOverrides {
        migration_dir: args.migration_dir,
        database_name: args.database_name,
        database_table: args.database_table,
        run_mode,
        validate_checksums: args.skip_checksums.then_some(false),
        ..Default::default()
    };
    let config = load_config(&args.config, overrides)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;

    let database = open_database(&config).context("Failed to open database")?;
    // The stock binary has no compiled-in procedural migrations; embedders
    // build their own binary around a populated registry.
    let migrator = Migrator::new(&config, database, Arc::new(ScriptRegistry::new()));

    match args.command {
        Command::Migrate { .. } => {
            let result = match config.run_mode {
                RunMode::Blocking => migrator.run()?,
                RunMode::Cooperative => {
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()?;
                    runtime.block_on(migrator.run_async())?
                }
            };
            print!("{}", result);
        }
        Command::Validate => {
            let result = migrator.validate()?;
            for name in &result.verified {
                println!("{} VALID", name);
            }
            info!(count = result.verified.len(), "Validation finished");
        }
        Command::Info => {
            let statuses = migrator.info()?;
            if statuses.is_empty() {
                println!("No migrations found");
            }
            for status in statuses {
                println!("{:<10} {:<40} {}", status.version.to_string(), status.name, status.state);
            }
        }
    }

    Ok(())
}
