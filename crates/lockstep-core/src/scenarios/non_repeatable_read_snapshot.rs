//! Shows when a repeatable-read snapshot is taken: at the first read, not at
//! `BEGIN`.

use anyhow::Result;
use async_trait::async_trait;

use lockstep_db::{IsolationLevel, Session};

use super::script::Script;
use crate::handoff::Turn;
use crate::task::Task;

pub(super) const DESCRIPTION: &str = r#"
A variant of `non-repeatable-read` that pins down when the snapshot for
`repeatable read` is taken. Both transactions begin, T1 updates and commits,
and only then does T2 read. PostgreSQL takes the snapshot at the first
statement, not at `BEGIN`, so T2 sees T1's committed value at every level.

┌────┐              ┌────┐             ┌────┐
│ T1 │              │ T2 │             │ DB │
└──┬─┘              └──┬─┘             └──┬─┘
   │                   │                  │
   ├─────────begin transaction───────────►│
   │                   │                  │
   │                   ├begin transaction►│
   │                   │                  │
   ├────────update balance───────────────►│
   │                   │                  │
   ├───────commit──────┼─────────────────►│
   │                   │                  │
   │                   ├──select balance─►│  T2 sees the committed update
   │                   │                  │
   │                   ├────commit───────►│
   │                   │                  │
"#;

const READ: &str = "select balance from account where id = 1;";
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
        turn.yield_and_wait().await;

        script.write(turn, UPDATE).await?;
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
        turn.yield_and_wait().await;

        script.read(turn, READ).await?;
        script.commit(turn).await?;
        turn.yield_and_wait().await;
        Ok(())
    }
}
