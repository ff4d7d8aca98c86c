//! Connections for a lockstep run and first-time database setup.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, Executor, PgConnection, PgPool};
use tracing::{debug, info};

use crate::config::DbConfig;

/// Schema for the `account` fixture, embedded from `migrations/`.
pub static MIGRATOR: Migrator = sqlx::migrate!();

/// Sessions open at once during a run: one per task.
pub const SESSIONS_PER_RUN: u32 = 2;

/// A task blocked on a lock holds its session, never a pool slot, so waiting
/// for a slot only happens while the server is unreachable.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connect a pool for one run.
///
/// Sessions detach their connection from the pool, so the pool only needs a
/// slot per session being opened plus one for fixture setup and snapshots.
pub async fn connect(config: &DbConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(SESSIONS_PER_RUN + 1)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(&config.database_url)
        .await
        .with_context(|| format!("failed to connect to database at {}", config.database_url))
}

/// Create the configured database unless the server already has it.
///
/// Returns whether it was created. The name is checked before connecting
/// because `CREATE DATABASE` takes no bind parameters.
pub async fn create_database_if_missing(config: &DbConfig) -> Result<bool> {
    let name = config
        .database_name()
        .context("database URL does not name a database")?;
    if !is_plain_identifier(name) {
        bail!("database name {name:?} must be letters, digits and underscores");
    }

    let maintenance_url = config.maintenance_url();
    let mut conn = PgConnection::connect(&maintenance_url)
        .await
        .with_context(|| format!("failed to connect to {maintenance_url}"))?;

    let found: Option<i32> = sqlx::query_scalar("SELECT 1 FROM pg_database WHERE datname = $1")
        .bind(name)
        .fetch_optional(&mut conn)
        .await
        .context("failed to look up database")?;

    let created = found.is_none();
    if created {
        conn.execute(format!("CREATE DATABASE {name}").as_str())
            .await
            .with_context(|| format!("failed to create database {name}"))?;
        info!(db = name, "database created");
    } else {
        debug!(db = name, "database present");
    }

    conn.close().await.context("failed to close maintenance connection")?;
    Ok(created)
}

fn is_plain_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
