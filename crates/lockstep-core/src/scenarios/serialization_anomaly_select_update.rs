//! Lost update: both tasks write a value computed from what they read earlier.

use anyhow::Result;
use async_trait::async_trait;

use lockstep_db::{IsolationLevel, Session};

use super::script::{Script, log_error};
use super::serialization_anomaly_update::READ;
use crate::handoff::Turn;
use crate::task::Task;

pub(super) const DESCRIPTION: &str = r#"
Like `serialization-anomaly-update`, but each task computes the new balance
in the client from the value it read earlier and writes it back as a literal.
Under `read committed` T2 overwrites T1's committed change with 67 - 33 = 34
and T1's +10 is lost. Under `repeatable read` and `serializable` T2's write
fails with a serialization error and T2 rolls back, leaving 77.

┌────┐              ┌────┐             ┌────┐
│ T1 │              │ T2 │             │ DB │
└──┬─┘              └──┬─┘             └──┬─┘
   │                   │                  │
   ├─────────select balance (67)─────────►│
   │                   │                  │
   │                   ├─select bal (67)─►│
   │                   │                  │
   ├──────────balance = 67 + 10──────────►│
   │                   │                  │
   ├─────────select balance──────────────►│
   │                   │                  │
   ├───────commit──────┼─────────────────►│
   │                   │                  │
   │                   ├─balance=67 - 33─►│  lost update, or serialization error
   │                   │                  │
   │                   ├commit / rollback►│
   │                   │                  │
"#;

fn set_balance(expression: &str) -> String {
    format!("update account set balance = {expression} where id = 1;")
}

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

        let balance = script.read_balance(turn, READ).await?;
        turn.yield_and_wait().await;

        script.write(turn, &set_balance(&format!("{balance} + 10"))).await?;
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

        let balance = script.read_balance(turn, READ).await?;
        turn.yield_and_wait().await;

        let update = set_balance(&format!("{balance} - 33"));
        match script.write(turn, &update).await {
            Ok(_) => {}
            Err(err) if err.is_conflict() => {
                log_error(turn, &update, &err);
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
