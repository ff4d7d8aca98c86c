//! The scripted-workflow contract and its uniform lifecycle.
//!
//! Scenario authors implement [`Task::run`] only. [`execute`] wraps it in the
//! fixed lifecycle:
//!
//! ```text
//! Created -> AwaitingTurn -> Running -> Done
//!            log BEGIN       run()       release turn, log END
//!            acquire turn
//! ```

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::handoff::Turn;

/// Lifecycle position of a task. Transitions are strictly linear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    AwaitingTurn,
    Running,
    Done,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::AwaitingTurn => "awaiting_turn",
            Self::Running => "running",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// One scripted workflow of a scenario.
///
/// A task owns whatever resource session it was constructed with and talks to
/// its peer only through the [`Turn`] handed to `run`.
#[async_trait]
pub trait Task: Send {
    /// The scenario script: resource operations interleaved with
    /// [`Turn::yield_and_wait`] calls. Runs while holding the turn.
    async fn run(&mut self, turn: &Turn) -> Result<()>;
}

// Compile-time assertion: Task must be usable as `dyn Task`.
const _: () = {
    fn _assert_object_safe(_: &dyn Task) {}
};

fn enter(turn: &Turn, state: TaskState) {
    debug!(task = %turn.label(), %state, "task state");
}

/// Drive one task through its lifecycle.
///
/// The turn is released to the peer whether the script succeeds or fails, so
/// the peer is never left waiting on a task that has ended. The script's own
/// error is returned untouched.
pub async fn execute(task: &mut dyn Task, turn: &Turn) -> Result<()> {
    enter(turn, TaskState::AwaitingTurn);
    turn.log("BEGIN", None);
    turn.acquire_turn().await;

    enter(turn, TaskState::Running);
    let result = task.run(turn).await;

    enter(turn, TaskState::Done);
    turn.release_turn();
    turn.log("END", None);
    result
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::bail;

    use super::*;
    use crate::handoff::turn_pair;
    use crate::log::SequenceLog;

    struct Steps(Vec<&'static str>);

    #[async_trait]
    impl Task for Steps {
        async fn run(&mut self, turn: &Turn) -> Result<()> {
            for step in &self.0 {
                turn.log(step, None);
            }
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Task for Failing {
        async fn run(&mut self, turn: &Turn) -> Result<()> {
            turn.log("about to fail", None);
            bail!("resource rejected the statement")
        }
    }

    fn headlines(log: &SequenceLog) -> Vec<String> {
        log.entries().into_iter().map(|e| e.headline).collect()
    }

    #[test]
    fn state_display() {
        assert_eq!(TaskState::AwaitingTurn.to_string(), "awaiting_turn");
        assert_eq!(TaskState::Done.to_string(), "done");
    }

    #[tokio::test]
    async fn execute_wraps_script_in_begin_and_end() {
        let log = Arc::new(SequenceLog::new());
        let (first, second) = turn_pair("T1", "T2", Arc::clone(&log), Duration::from_secs(1));

        let mut task = Steps(vec!["one", "two"]);
        execute(&mut task, &first).await.unwrap();

        assert_eq!(headlines(&log), vec!["BEGIN", "one", "two", "END"]);
        // The turn went to the peer on completion.
        assert!(second.holds_grant());
        assert!(!first.holds_grant());
    }

    #[tokio::test]
    async fn failing_script_still_releases_the_turn() {
        let log = Arc::new(SequenceLog::new());
        let (first, second) = turn_pair("T1", "T2", Arc::clone(&log), Duration::from_secs(1));

        let err = execute(&mut Failing, &first).await.unwrap_err();
        assert_eq!(err.to_string(), "resource rejected the statement");

        assert_eq!(headlines(&log), vec!["BEGIN", "about to fail", "END"]);
        assert!(second.holds_grant());
    }

    #[tokio::test]
    async fn task_without_grant_waits_before_running() {
        let log = Arc::new(SequenceLog::new());
        let (_first, second) = turn_pair("T1", "T2", Arc::clone(&log), Duration::from_secs(1));

        let mut task = Steps(vec!["never"]);
        let outcome =
            tokio::time::timeout(Duration::from_millis(50), execute(&mut task, &second)).await;
        assert!(outcome.is_err());
        assert_eq!(headlines(&log), vec!["BEGIN"]);
    }
}
