mod config;
mod run_cmd;
mod scenario_cmds;
#[cfg(test)]
mod test_util;

use anyhow::Context;
use clap::{Parser, Subcommand};

use lockstep_core::builtin_registry;
use lockstep_db::config::DbConfig;
use lockstep_db::{IsolationLevel, accounts, pool};

use config::LockstepConfig;
use run_cmd::RunOptions;

#[derive(Parser)]
#[command(
    name = "lockstep",
    about = "Reproduce transaction anomalies by running two transactions in lockstep"
)]
struct Cli {
    /// Database URL (overrides LOCKSTEP_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a lockstep config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = DbConfig::DEFAULT_URL)]
        db_url: String,
        /// Milliseconds a task waits for the turn before reporting a stall
        #[arg(long, default_value_t = 2000)]
        handoff_timeout_ms: u64,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create the database if needed and apply migrations
    DbInit,
    /// List the built-in scenarios
    List,
    /// Show what a scenario demonstrates
    Describe {
        /// Scenario name (see `lockstep list`)
        scenario: String,
    },
    /// Run a scenario at the given isolation level
    Run {
        /// Scenario name (see `lockstep list`)
        #[arg(short = 'e', long)]
        scenario: String,
        /// read-uncommitted, read-committed, repeatable-read or serializable
        #[arg(short = 'l', long)]
        isolation_level: IsolationLevel,
        /// Override the handoff timeout for this run
        #[arg(long)]
        handoff_timeout_ms: Option<u64>,
        /// Also print the trace as JSON lines after the run
        #[arg(long)]
        json: bool,
    },
}

/// Execute the `lockstep init` command: write config file.
fn cmd_init(db_url: &str, handoff_timeout_ms: u64, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_owned(),
        },
        harness: config::HarnessSection { handoff_timeout_ms },
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!("  harness.handoff_timeout_ms = {handoff_timeout_ms}");
    println!();
    println!("Next: run `lockstep db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `lockstep db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = LockstepConfig::resolve(cli_db_url, None)?;

    println!("Initializing lockstep database...");

    if pool::create_database_if_missing(&resolved.db_config).await? {
        println!("Created database.");
    }

    let db_pool = pool::connect(&resolved.db_config).await?;
    let result = async {
        accounts::prepare(&db_pool).await?;
        accounts::snapshot(&db_pool).await
    }
    .await;
    db_pool.close().await;

    let snapshot = result?;
    println!("Database ready. account:");
    println!("{snapshot}");
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let registry = builtin_registry().context("failed to build scenario registry")?;

    match cli.command {
        Commands::Init {
            db_url,
            handoff_timeout_ms,
            force,
        } => {
            cmd_init(&db_url, handoff_timeout_ms, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::List => {
            scenario_cmds::run_list(&registry);
        }
        Commands::Describe { scenario } => {
            scenario_cmds::run_describe(&registry, &scenario)?;
        }
        Commands::Run {
            scenario,
            isolation_level,
            handoff_timeout_ms,
            json,
        } => {
            let entry = registry.resolve(&scenario)?;
            let resolved =
                LockstepConfig::resolve(cli.database_url.as_deref(), handoff_timeout_ms)?;
            let db_pool = pool::connect(&resolved.db_config).await?;
            let options = RunOptions {
                level: isolation_level,
                handoff_timeout: resolved.handoff_timeout,
                json,
            };
            let result = run_cmd::run_scenario_cmd(&db_pool, entry, options).await;
            db_pool.close().await;
            result?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // stdout carries the trace; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
