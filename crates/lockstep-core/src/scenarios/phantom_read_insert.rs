//! Phantom read where the new match comes from an inserted row.

use anyhow::Result;
use async_trait::async_trait;

use lockstep_db::{IsolationLevel, Session};

use super::phantom_read::{READ_ALL, Second};
use super::script::Script;
use crate::handoff::Turn;
use crate::task::Task;

pub(super) const DESCRIPTION: &str = r#"
Like `phantom-read`, but the set of matching rows changes because T1 inserts a
new row instead of updating one (a delete behaves the same way). Under `read
committed` T2's second filtered query picks up the committed insert. Under
`repeatable read` and `serializable` T2 keeps seeing the original two rows.

┌────┐              ┌────┐             ┌────┐
│ T1 │              │ T2 │             │ DB │
└──┬─┘              └──┬─┘             └──┬─┘
   │                   │                  │
   ├──────────select all rows────────────►│
   │                   │                  │
   │                   ├select balance>30►│
   │                   │                  │
   ├────────insert balance 33────────────►│
   │                   │                  │
   ├──────────select all rows────────────►│  T1 sees the new row
   │                   │                  │
   ├───────commit──────┼─────────────────►│
   │                   │                  │
   │                   ├select balance>30►│  two or three rows, by isolation level
   │                   │                  │
   │                   ├────commit───────►│
   │                   │                  │
"#;

const INSERT: &str = "insert into account (balance) values (33);";

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

        script.write(turn, INSERT).await?;
        script.read(turn, READ_ALL).await?;
        script.commit(turn).await?;
        turn.yield_and_wait().await;
        Ok(())
    }
}
