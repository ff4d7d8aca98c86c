//! Runs the two tasks of a scenario side by side.
//!
//! The runner only starts both lifecycles concurrently and waits for both to
//! finish. Step order comes entirely from the handoff flags.

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::handoff::{HandoffStats, Turn};
use crate::task::{Task, execute};

/// A task together with its side of the handoff pair.
pub struct BoundTask {
    pub task: Box<dyn Task>,
    pub turn: Turn,
}

impl BoundTask {
    /// Pair a task with the turn it will run under.
    pub fn new(task: Box<dyn Task>, turn: Turn) -> Self {
        Self { task, turn }
    }
}

/// Handoff accounting for both flags after a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub first: HandoffStats,
    pub second: HandoffStats,
}

/// Run one lifecycle, then drop the task.
///
/// Dropping the task closes whatever session it owns, so a script that fails
/// mid-transaction releases its locks before the peer's blocked statement
/// can wait on them.
async fn drive(mut task: Box<dyn Task>, turn: &Turn) -> Result<()> {
    let result = execute(task.as_mut(), turn).await;
    drop(task);
    debug!(task = %turn.label(), "task resources released");
    result
}

/// Execute both tasks concurrently and return once both are done.
///
/// Both tasks always run to completion. If either failed, the first task's
/// error takes precedence, then the second's; the failing task's label is
/// attached as context.
pub async fn run_lockstep(first: BoundTask, second: BoundTask) -> Result<RunSummary> {
    let BoundTask {
        task: first_task,
        turn: first_turn,
    } = first;
    let BoundTask {
        task: second_task,
        turn: second_turn,
    } = second;
    debug!(
        first = %first_turn.label(),
        second = %second_turn.label(),
        "starting lockstep run"
    );

    let (first_result, second_result) = futures::future::join(
        drive(first_task, &first_turn),
        drive(second_task, &second_turn),
    )
    .await;

    for (turn, result) in [(&first_turn, &first_result), (&second_turn, &second_result)] {
        if let Err(err) = result {
            warn!(task = %turn.label(), error = %err, "task failed");
        }
    }

    first_result.with_context(|| format!("task {} failed", first_turn.label()))?;
    second_result.with_context(|| format!("task {} failed", second_turn.label()))?;

    Ok(RunSummary {
        first: first_turn.stats(),
        second: second_turn.stats(),
    })
}
