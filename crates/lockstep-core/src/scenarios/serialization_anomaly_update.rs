//! Concurrent relative updates of the same balance.

use anyhow::Result;
use async_trait::async_trait;

use lockstep_db::{IsolationLevel, Session};

use super::script::{Script, log_error};
use crate::handoff::Turn;
use crate::task::Task;

pub(super) const DESCRIPTION: &str = r#"
Both transactions read the same balance, then T1 adds 10 and commits before T2
subtracts 33. Under `read committed` T2's update applies on top of T1's
committed value and the final balance is 44. Under `repeatable read` and
`serializable` T2's update touches a row changed since its snapshot, so it
fails with a serialization error and T2 rolls back, leaving 77.

┌────┐              ┌────┐             ┌────┐
│ T1 │              │ T2 │             │ DB │
└──┬─┘              └──┬─┘             └──┬─┘
   │                   │                  │
   ├─────────select balance──────────────►│
   │                   │                  │
   │                   ├──select balance─►│
   │                   │                  │
   ├────────balance = balance + 10───────►│
   │                   │                  │
   ├─────────select balance──────────────►│
   │                   │                  │
   ├───────commit──────┼─────────────────►│
   │                   │                  │
   │                   ├balance - 33─────►│  applied, or serialization error
   │                   │                  │
   │                   ├commit / rollback►│
   │                   │                  │
"#;

pub(super) const READ: &str = "select balance from account where id = 1;";
pub(super) const INCREMENT: &str = "update account set balance = balance + 10 where id = 1;";
pub(super) const DECREMENT: &str = "update account set balance = balance - 33 where id = 1;";

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

        script.write(turn, INCREMENT).await?;
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

        match script.write(turn, DECREMENT).await {
            Ok(_) => {}
            Err(err) if err.is_conflict() => {
                log_error(turn, DECREMENT, &err);
                script.rollback(turn).await?;
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }
        script.read(turn, READ).await?;
        script.commit(turn).await?;
        Ok(())
    }
}
