//! T2 reads the same row twice; in between, T1 updates it and commits.

use anyhow::Result;
use async_trait::async_trait;

use lockstep_db::{IsolationLevel, Session};

use super::script::Script;
use crate::handoff::Turn;
use crate::task::Task;

pub(super) const DESCRIPTION: &str = r#"
T2 reads the same balance twice. Between the two reads T1 updates it and
commits. Under `read uncommitted` (PostgreSQL runs it as `read committed`) and
`read committed`, T2's second read returns the new value. Under `repeatable
read` and `serializable`, T2 keeps seeing the value from its first read.

┌────┐              ┌────┐             ┌────┐
│ T1 │              │ T2 │             │ DB │
└──┬─┘              └──┬─┘             └──┬─┘
   │                   │                  │
   ├─────────select balance──────────────►│
   │                   │                  │
   │                   ├──select balance─►│
   │                   │                  │
   ├────────update balance───────────────►│
   │                   │                  │
   ├────────select balance───────────────►│  T1 sees its own update
   │                   │                  │
   ├───────commit──────┼─────────────────►│
   │                   │                  │
   │                   ├──select balance─►│  old or new value, by isolation level
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

        script.read(turn, READ).await?;
        turn.yield_and_wait().await;

        script.write(turn, UPDATE).await?;
        script.read(turn, READ).await?;
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

        script.read(turn, READ).await?;
        turn.yield_and_wait().await;

        script.read(turn, READ).await?;
        script.commit(turn).await?;
        Ok(())
    }
}
