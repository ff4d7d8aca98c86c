//! `lockstep run` command: reset the fixture, run one scenario in lockstep,
//! and show the account table before and after.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::debug;

use lockstep_core::{ScenarioEntry, SequenceLog, run_scenario};
use lockstep_db::{IsolationLevel, accounts};

/// Settings for one `lockstep run`.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub level: IsolationLevel,
    pub handoff_timeout: Duration,
    /// Print the captured trace as JSON lines after the run.
    pub json: bool,
}

async fn print_snapshot(pool: &PgPool, label: &str) -> Result<()> {
    let snapshot = accounts::snapshot(pool).await?;
    println!("DB STATE: {label}");
    println!("{snapshot}");
    println!();
    Ok(())
}

/// Run the scenario. Trace lines are printed as they are logged.
pub async fn run_scenario_cmd(
    pool: &PgPool,
    entry: &ScenarioEntry,
    options: RunOptions,
) -> Result<()> {
    accounts::prepare(pool).await?;
    debug!(scenario = %entry.name, "account fixture reset");

    print_snapshot(pool, "BEFORE").await?;

    let log = Arc::new(SequenceLog::stdout());
    run_scenario(
        pool,
        entry,
        options.level,
        Arc::clone(&log),
        options.handoff_timeout,
    )
    .await
    .with_context(|| format!("scenario {} failed at {}", entry.name, options.level))?;
    println!();

    print_snapshot(pool, "AFTER").await?;

    if options.json {
        for line in log.entries() {
            println!("{}", serde_json::to_string(&line).context("failed to encode trace line")?);
        }
    }
    Ok(())
}
