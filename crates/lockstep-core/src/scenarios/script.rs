//! Shared plumbing for scenario scripts: one session plus logging of every
//! statement and its outcome on the ordered trace.

use lockstep_db::{IsolationLevel, ResourceError, ResultSet, Session};

use crate::handoff::Turn;

/// A task's private session and isolation level.
pub(crate) struct Script {
    session: Session,
    level: IsolationLevel,
}

impl Script {
    pub(crate) fn new(session: Session, level: IsolationLevel) -> Self {
        Self { session, level }
    }

    /// Start the transaction at the run's isolation level.
    pub(crate) async fn begin(&mut self) -> Result<(), ResourceError> {
        self.session.begin(self.level).await
    }

    /// Run a query and log its result table.
    pub(crate) async fn read(
        &mut self,
        turn: &Turn,
        sql: &str,
    ) -> Result<ResultSet, ResourceError> {
        let rows = self.session.fetch(sql).await?;
        turn.log(sql, Some(rows.to_string().as_str()));
        Ok(rows)
    }

    /// Run a query and return the `balance` of its first row.
    pub(crate) async fn read_balance(
        &mut self,
        turn: &Turn,
        sql: &str,
    ) -> anyhow::Result<i64> {
        let rows = self.read(turn, sql).await?;
        let text = rows
            .value(0, "balance")
            .ok_or_else(|| anyhow::anyhow!("query returned no balance: {sql}"))?;
        Ok(text.parse()?)
    }

    /// Run a modifying statement and log the affected row count.
    pub(crate) async fn write(&mut self, turn: &Turn, sql: &str) -> Result<u64, ResourceError> {
        let modified = self.session.execute(sql).await?;
        log_modified(turn, sql, modified);
        Ok(modified)
    }

    pub(crate) async fn commit(&mut self, turn: &Turn) -> Result<(), ResourceError> {
        self.session.commit().await?;
        turn.log("COMMIT", None);
        Ok(())
    }

    pub(crate) async fn rollback(&mut self, turn: &Turn) -> Result<(), ResourceError> {
        self.session.rollback().await?;
        turn.log("ROLLBACK", None);
        Ok(())
    }

    /// Direct access for statements handed to
    /// [`Turn::yield_and_wait_on`] while they are still running.
    pub(crate) fn session(&mut self) -> &mut Session {
        &mut self.session
    }
}

pub(crate) fn log_modified(turn: &Turn, sql: &str, modified: u64) {
    turn.log(sql, Some(format!("MODIFIED: {modified}").as_str()));
}

pub(crate) fn log_error(turn: &Turn, sql: &str, err: &ResourceError) {
    turn.log(sql, Some(format!("ERROR: {err}").as_str()));
}
