//! A single task's private database session.
//!
//! Each session owns one dedicated connection, detached from the pool so that
//! an abandoned transaction dies with the connection instead of being handed
//! to the next borrower.

use anyhow::{Context, Result};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use tracing::debug;

use crate::error::ResourceError;
use crate::isolation::IsolationLevel;
use crate::result_set::ResultSet;

/// A connection that issues one statement at a time inside an explicitly
/// started transaction.
///
/// Statements run over the simple query protocol so transaction control
/// (`BEGIN`, `COMMIT`, ...) is sent verbatim.
pub struct Session {
    conn: PgConnection,
}

impl Session {
    /// Open a new session on its own connection.
    pub async fn open(pool: &PgPool) -> Result<Self> {
        let conn = pool
            .acquire()
            .await
            .context("failed to acquire a connection for a session")?
            .detach();
        Ok(Self { conn })
    }

    /// Start a transaction at the given isolation level.
    pub async fn begin(&mut self, level: IsolationLevel) -> Result<(), ResourceError> {
        let stmt = format!("BEGIN ISOLATION LEVEL {}", level.sql());
        debug!(%level, "begin transaction");
        self.conn.execute(stmt.as_str()).await?;
        Ok(())
    }

    /// Run a query and collect its rows.
    pub async fn fetch(&mut self, sql: &str) -> Result<ResultSet, ResourceError> {
        let rows = self.conn.fetch_all(sql).await?;
        Ok(ResultSet::from_rows(&rows)?)
    }

    /// Run a statement and return the number of rows it affected.
    ///
    /// May block while another session holds a conflicting row lock.
    pub async fn execute(&mut self, sql: &str) -> Result<u64, ResourceError> {
        let done = self.conn.execute(sql).await?;
        Ok(done.rows_affected())
    }

    /// Commit the open transaction.
    ///
    /// Under `serializable` this is where a read/write dependency cycle is
    /// usually reported, as [`ResourceError::Conflict`].
    pub async fn commit(&mut self) -> Result<(), ResourceError> {
        self.conn.execute("COMMIT").await?;
        Ok(())
    }

    /// Abandon the open transaction. The session can begin another.
    pub async fn rollback(&mut self) -> Result<(), ResourceError> {
        self.conn.execute("ROLLBACK").await?;
        Ok(())
    }

    /// Close the connection gracefully. Any open transaction is rolled back
    /// by the server.
    pub async fn close(self) -> Result<()> {
        self.conn
            .close()
            .await
            .context("failed to close session connection")
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}
