//! T2's update blocks on the row lock T1 holds until T1 commits.

use anyhow::Result;
use async_trait::async_trait;

use lockstep_db::{IsolationLevel, Session};

use super::script::{Script, log_error, log_modified};
use super::serialization_anomaly_update::{DECREMENT, INCREMENT, READ};
use crate::handoff::Turn;
use crate::task::Task;

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
        // T1 still holds the row lock when T2 issues its update.
        turn.yield_and_wait().await;

        script.commit(turn).await?;
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

        turn.log(DECREMENT, Some("waiting..."));
        let outcome = turn
            .yield_and_wait_on(script.session().execute(DECREMENT))
            .await;
        match outcome {
            Ok(modified) => log_modified(turn, DECREMENT, modified),
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
