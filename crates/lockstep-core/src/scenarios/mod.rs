//! Built-in scenarios.
//!
//! Every scenario is a pair of scripted tasks against the two-row `account`
//! fixture. They are listed once in [`BUILTIN`]; [`builtin_registry`] turns
//! that table into a [`ScenarioRegistry`] at startup.

mod dirty_read;
mod non_repeatable_read;
mod non_repeatable_read_snapshot;
mod phantom_read;
mod phantom_read_insert;
mod script;
mod serialization_anomaly;
mod serialization_anomaly_concurrent_update;
mod serialization_anomaly_insert;
mod serialization_anomaly_select_update;
mod serialization_anomaly_update;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

use lockstep_db::{IsolationLevel, Session};

use crate::handoff::turn_pair;
use crate::log::SequenceLog;
use crate::registry::{RegistryError, ScenarioEntry, ScenarioRegistry, TaskFactory};
use crate::runner::{BoundTask, RunSummary, run_lockstep};

/// Label of the task that starts with the turn.
pub const FIRST_LABEL: &str = "T1";
pub const SECOND_LABEL: &str = "T2";

/// One row of the built-in table.
pub struct ScenarioDef {
    pub name: &'static str,
    pub first: TaskFactory,
    pub second: TaskFactory,
    pub description: Option<&'static str>,
}

pub static BUILTIN: &[ScenarioDef] = &[
    ScenarioDef {
        name: "dirty-read",
        first: dirty_read::first,
        second: dirty_read::second,
        description: None,
    },
    ScenarioDef {
        name: "non-repeatable-read",
        first: non_repeatable_read::first,
        second: non_repeatable_read::second,
        description: Some(non_repeatable_read::DESCRIPTION),
    },
    ScenarioDef {
        name: "non-repeatable-read-snapshot",
        first: non_repeatable_read_snapshot::first,
        second: non_repeatable_read_snapshot::second,
        description: Some(non_repeatable_read_snapshot::DESCRIPTION),
    },
    ScenarioDef {
        name: "phantom-read",
        first: phantom_read::first,
        second: phantom_read::second,
        description: Some(phantom_read::DESCRIPTION),
    },
    ScenarioDef {
        name: "phantom-read-insert",
        first: phantom_read_insert::first,
        second: phantom_read_insert::second,
        description: Some(phantom_read_insert::DESCRIPTION),
    },
    ScenarioDef {
        name: "serialization-anomaly",
        first: serialization_anomaly::first,
        second: serialization_anomaly::second,
        description: Some(serialization_anomaly::DESCRIPTION),
    },
    ScenarioDef {
        name: "serialization-anomaly-insert",
        first: serialization_anomaly_insert::first,
        second: serialization_anomaly_insert::second,
        description: Some(serialization_anomaly_insert::DESCRIPTION),
    },
    ScenarioDef {
        name: "serialization-anomaly-update",
        first: serialization_anomaly_update::first,
        second: serialization_anomaly_update::second,
        description: Some(serialization_anomaly_update::DESCRIPTION),
    },
    ScenarioDef {
        name: "serialization-anomaly-select-update",
        first: serialization_anomaly_select_update::first,
        second: serialization_anomaly_select_update::second,
        description: Some(serialization_anomaly_select_update::DESCRIPTION),
    },
    ScenarioDef {
        name: "serialization-anomaly-concurrent-update",
        first: serialization_anomaly_concurrent_update::first,
        second: serialization_anomaly_concurrent_update::second,
        description: None,
    },
];

/// Build the registry from [`BUILTIN`].
pub fn builtin_registry() -> Result<ScenarioRegistry, RegistryError> {
    let mut registry = ScenarioRegistry::new();
    for def in BUILTIN {
        registry.register(def.name, def.first, def.second, def.description)?;
    }
    Ok(registry)
}

/// Run one scenario to completion.
///
/// Opens a dedicated session per task, binds both tasks to a fresh turn pair
/// writing to `log`, and runs them in lockstep. The caller is responsible for
/// resetting the fixture beforehand.
pub async fn run_scenario(
    pool: &PgPool,
    entry: &ScenarioEntry,
    level: IsolationLevel,
    log: Arc<SequenceLog>,
    handoff_timeout: Duration,
) -> Result<RunSummary> {
    info!(scenario = %entry.name, %level, "running scenario");

    let first_session = Session::open(pool)
        .await
        .with_context(|| format!("failed to open session for {FIRST_LABEL}"))?;
    let second_session = Session::open(pool)
        .await
        .with_context(|| format!("failed to open session for {SECOND_LABEL}"))?;

    let (first, second) = entry.build(first_session, second_session, level);
    let (first_turn, second_turn) = turn_pair(FIRST_LABEL, SECOND_LABEL, log, handoff_timeout);

    let summary = run_lockstep(
        BoundTask::new(first, first_turn),
        BoundTask::new(second, second_turn),
    )
    .await?;

    info!(scenario = %entry.name, ?summary, "scenario finished");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn builtin_names_are_unique() {
        let names: HashSet<&str> = BUILTIN.iter().map(|def| def.name).collect();
        assert_eq!(names.len(), BUILTIN.len());
    }

    #[test]
    fn builtin_registry_contains_every_scenario() {
        let registry = builtin_registry().unwrap();
        assert_eq!(registry.len(), 10);
        for def in BUILTIN {
            let entry = registry.resolve(def.name).unwrap();
            assert_eq!(entry.description.is_some(), def.description.is_some());
        }
    }

    #[test]
    fn documented_scenarios_carry_descriptions() {
        let undocumented = ["dirty-read", "serialization-anomaly-concurrent-update"];
        let registry = builtin_registry().unwrap();
        for def in BUILTIN {
            let description = registry.resolve(def.name).unwrap().description.as_deref();
            if undocumented.contains(&def.name) {
                assert!(description.is_none(), "{} gained a description", def.name);
            } else {
                let text = description
                    .unwrap_or_else(|| panic!("{} has no description", def.name));
                assert!(
                    text.contains("┌────┐"),
                    "{} description lacks its diagram",
                    def.name
                );
            }
        }
    }

    #[test]
    fn descriptions_are_trimmed() {
        let registry = builtin_registry().unwrap();
        let entry = registry.resolve("non-repeatable-read").unwrap();
        let description = entry.description.as_deref().unwrap();
        assert!(description.starts_with("T2 reads the same balance twice."));
        assert!(!description.ends_with('\n'));
    }
}
