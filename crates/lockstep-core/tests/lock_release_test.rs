//! A task that fails mid-transaction must not leave its peer blocked on the
//! row locks it held.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;

use lockstep_core::{BoundTask, SequenceLog, Task, Turn, run_lockstep, turn_pair};
use lockstep_db::{IsolationLevel, Session, accounts};
use lockstep_test_utils::TestDb;

const LOCK_ROW: &str = "update account set balance = 10 where id = 1;";
const DECREMENT: &str = "update account set balance = balance - 33 where id = 1;";

struct FailsHoldingLock(Session);

#[async_trait]
impl Task for FailsHoldingLock {
    async fn run(&mut self, turn: &Turn) -> Result<()> {
        self.0.begin(IsolationLevel::ReadCommitted).await?;
        self.0.execute(LOCK_ROW).await?;
        turn.log("locked", None);
        turn.yield_and_wait().await;
        bail!("script gave up while holding the row lock")
    }
}

struct WaitsOnLock(Session);

#[async_trait]
impl Task for WaitsOnLock {
    async fn run(&mut self, turn: &Turn) -> Result<()> {
        self.0.begin(IsolationLevel::ReadCommitted).await?;
        let modified = turn.yield_and_wait_on(self.0.execute(DECREMENT)).await?;
        turn.log(DECREMENT, Some(format!("MODIFIED: {modified}").as_str()));
        self.0.commit().await?;
        Ok(())
    }
}

#[tokio::test]
async fn failed_lock_holder_releases_blocked_peer() {
    let db = TestDb::create().await;
    let log = Arc::new(SequenceLog::new());
    let (t1, t2) = turn_pair("T1", "T2", Arc::clone(&log), Duration::from_millis(500));

    let first = Session::open(&db.pool).await.unwrap();
    let second = Session::open(&db.pool).await.unwrap();
    let run = run_lockstep(
        BoundTask::new(Box::new(FailsHoldingLock(first)), t1),
        BoundTask::new(Box::new(WaitsOnLock(second)), t2),
    );

    let result = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("run must finish once the failed task's transaction is gone");

    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "task T1 failed");
    assert!(format!("{err:#}").contains("holding the row lock"));

    let entries = log.entries();
    assert!(
        entries
            .iter()
            .any(|e| e.task == "T2" && e.detail.as_deref() == Some("MODIFIED: 1")),
        "T2's update never completed"
    );

    // T1's update was rolled back with its connection; only T2's applied.
    assert_eq!(accounts::balance_of(&db.pool, 1).await.unwrap(), Some(34));
    db.teardown().await;
}
