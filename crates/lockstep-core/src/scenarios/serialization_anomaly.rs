//! T2 sums the balances twice while T1 commits a change in between.

use anyhow::Result;
use async_trait::async_trait;

use lockstep_db::{IsolationLevel, Session};

use super::script::Script;
use crate::handoff::Turn;
use crate::task::Task;

pub(super) const DESCRIPTION: &str = r#"
T2 computes `sum(balance)` twice. Between the two sums T1 updates a balance
and commits. Under `read committed` the two sums differ, which no serial order
of T1 and T2 could produce. Under `repeatable read` and `serializable` T2 keeps
its snapshot and both sums agree.

┌────┐              ┌────┐             ┌────┐
│ T1 │              │ T2 │             │ DB │
└──┬─┘              └──┬─┘             └──┬─┘
   │                   │                  │
   ├──────────select all rows────────────►│
   │                   │                  │
   │                   ├─select sum()────►│
   │                   │                  │
   ├────────update balance to 10─────────►│
   │                   │                  │
   ├──────────select all rows────────────►│
   │                   │                  │
   ├───────commit──────┼─────────────────►│
   │                   │                  │
   │                   ├─select sum()────►│  98 or 41, by isolation level
   │                   │                  │
   │                   ├────commit───────►│
   │                   │                  │
"#;

const READ_ALL: &str = "select * from account;";
pub(super) const SUM: &str = "select sum(balance) from account;";
const UPDATE: &str = "update account set balance = 10 where id = 1;";

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

        script.read(turn, READ_ALL).await?;
        turn.yield_and_wait().await;

        script.write(turn, UPDATE).await?;
        script.read(turn, READ_ALL).await?;
        script.commit(turn).await?;
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

        script.read(turn, SUM).await?;
        script.commit(turn).await?;
        turn.yield_and_wait().await;
        Ok(())
    }
}
