//! The `account` fixture shared by every scenario.

use anyhow::{Context, Result};
use sqlx::{Executor, PgPool};

use crate::pool::MIGRATOR;
use crate::result_set::ResultSet;

/// Balances seeded before every run, in id order starting at 1.
pub const INITIAL_BALANCES: [i32; 2] = [67, 31];

/// Bring the schema up to date and reset the fixture. Every run starts here.
pub async fn prepare(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to migrate account schema")?;
    reset_accounts(pool).await
}

/// Reset the fixture to exactly [`INITIAL_BALANCES`], restarting ids at 1.
pub async fn reset_accounts(pool: &PgPool) -> Result<()> {
    let mut tx = pool.begin().await.context("failed to begin fixture reset")?;

    (&mut *tx)
        .execute("TRUNCATE account RESTART IDENTITY")
        .await
        .context("failed to truncate account")?;

    for balance in INITIAL_BALANCES {
        sqlx::query("INSERT INTO account (balance) VALUES ($1)")
            .bind(balance)
            .execute(&mut *tx)
            .await
            .context("failed to seed account")?;
    }

    tx.commit().await.context("failed to commit fixture reset")?;
    Ok(())
}

/// Read every account row, ordered by id.
pub async fn snapshot(pool: &PgPool) -> Result<ResultSet> {
    let rows = pool
        .fetch_all("SELECT id, balance FROM account ORDER BY id")
        .await
        .context("failed to read account snapshot")?;
    ResultSet::from_rows(&rows).context("failed to decode account snapshot")
}

/// Current balance of a single account, if it exists.
pub async fn balance_of(pool: &PgPool, id: i32) -> Result<Option<i32>> {
    let balance: Option<i32> = sqlx::query_scalar("SELECT balance FROM account WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("failed to read balance of account {id}"))?;
    Ok(balance)
}
