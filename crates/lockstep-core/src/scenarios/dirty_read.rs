//! T1 updates a row and keeps its transaction open across a handoff while T2
//! reads the same row twice.

use anyhow::Result;
use async_trait::async_trait;

use lockstep_db::{IsolationLevel, Session};

use super::script::Script;
use crate::handoff::Turn;
use crate::task::Task;

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
        // Uncommitted change is visible to T2 only under a dirty-read level.
        turn.yield_and_wait().await;

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
        turn.yield_and_wait().await;
        Ok(())
    }
}
