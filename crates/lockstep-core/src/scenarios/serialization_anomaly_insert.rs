//! Write skew through inserts: each task sums the table, then inserts a row.

use anyhow::Result;
use async_trait::async_trait;

use lockstep_db::{IsolationLevel, Session};

use super::script::{Script, log_error};
use super::serialization_anomaly::SUM;
use crate::handoff::Turn;
use crate::task::Task;

pub(super) const DESCRIPTION: &str = r#"
Both transactions sum the balances and then insert a new row, each based on a
sum that ignores the other's insert. Every level below `serializable` lets
both commit. Under `serializable` PostgreSQL detects the read/write dependency
cycle: T2 commits first and T1 fails with a serialization error and rolls
back.

┌────┐              ┌────┐             ┌────┐
│ T1 │              │ T2 │             │ DB │
└──┬─┘              └──┬─┘             └──┬─┘
   │                   │                  │
   ├────────────select sum()─────────────►│
   │                   │                  │
   │                   ├─select sum()────►│
   │                   │                  │
   ├────────────insert 89────────────────►│
   │                   │                  │
   │                   ├─insert 12───────►│
   │                   │                  │
   │                   ├─select sum()────►│
   │                   │                  │
   │                   ├────commit───────►│
   │                   │                  │
   ├────────────select sum()─────────────►│  fails under serializable
   │                   │                  │
   ├───────commit or rollback────────────►│
   │                   │                  │
"#;

const INSERT_FIRST: &str = "insert into account (balance) values (89);";
const INSERT_SECOND: &str = "insert into account (balance) values (12);";

pub(super) fn first(session: Session, level: IsolationLevel) -> Box<dyn Task> {
    Box::new(First(Script::new(session, level)))
}

pub(super) fn second(session: Session, level: IsolationLevel) -> Box<dyn Task> {
    Box::new(Second(Script::new(session, level)))
}

struct First(Script);

#[async_trait]
impl Task for First {
    async fn run(&mut self, turn: &Turn) -> Result<()> {
        let script = &mut self.0;
        script.begin().await?;

        script.read(turn, SUM).await?;
        turn.yield_and_wait().await;

        script.write(turn, INSERT_FIRST).await?;
        turn.yield_and_wait().await;

        // The conflict may surface on the read or only at commit.
        let failed = match script.read(turn, SUM).await {
            Ok(_) => script.commit(turn).await.err().map(|err| ("COMMIT", err)),
            Err(err) => Some((SUM, err)),
        };
        if let Some((statement, err)) = failed {
            if !err.is_conflict() {
                return Err(err.into());
            }
            log_error(turn, statement, &err);
            script.rollback(turn).await?;
        }
        turn.yield_and_wait().await;
        Ok(())
    }
}

struct Second(Script);

#[async_trait]
impl Task for Second {
    async fn run(&mut self, turn: &Turn) -> Result<()> {
        let script = &mut self.0;
        script.begin().await?;

        script.read(turn, SUM).await?;
        turn.yield_and_wait().await;

        script.write(turn, INSERT_SECOND).await?;
        script.read(turn, SUM).await?;
        script.commit(turn).await?;
        turn.yield_and_wait().await;
        Ok(())
    }
}
