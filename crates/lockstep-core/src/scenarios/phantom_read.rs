//! T2 runs the same filtered query twice while T1 changes which rows match.

use anyhow::Result;
use async_trait::async_trait;

use lockstep_db::{IsolationLevel, Session};

use super::script::Script;
use crate::handoff::Turn;
use crate::task::Task;

pub(super) const DESCRIPTION: &str = r#"
T2 runs the same filtered query (`balance > 30`) twice. Between the two runs
T1 lowers a balance below the threshold and commits, so the row drops out of
the match. Under `read committed` T2's second query returns one row fewer.
Under `repeatable read` and `serializable` both queries return the same rows.

┌────┐              ┌────┐             ┌────┐
│ T1 │              │ T2 │             │ DB │
└──┬─┘              └──┬─┘             └──┬─┘
   │                   │                  │
   ├──────────select all rows────────────►│
   │                   │                  │
   │                   ├select balance>30►│
   │                   │                  │
   ├────────update balance to 29─────────►│
   │                   │                  │
   ├──────────select all rows────────────►│
   │                   │                  │
   ├───────commit──────┼─────────────────►│
   │                   │                  │
   │                   ├select balance>30►│  one or two rows, by isolation level
   │                   │                  │
   │                   ├────commit───────►│
   │                   │                  │
"#;

pub(super) const READ_ALL: &str = "select * from account;";
pub(super) const READ_FILTERED: &str = "select id, balance from account where balance > 30;";
const UPDATE: &str = "update account set balance = 29 where id = 1;";

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

/// The filtered reader, shared with `phantom-read-insert`.
pub(super) struct Second(pub(super) Script);

#[async_trait]
impl Task for Second {
    async fn run(&mut self, turn: &Turn) -> Result<()> {
        let script = &mut self.0;
        script.begin().await?;

        script.read(turn, READ_FILTERED).await?;
        turn.yield_and_wait().await;

        script.read(turn, READ_FILTERED).await?;
        script.commit(turn).await?;
        turn.yield_and_wait().await;
        Ok(())
    }
}
