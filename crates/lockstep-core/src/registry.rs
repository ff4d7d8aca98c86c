//! Scenario registry -- a named collection of task pairs.
//!
//! The driver looks scenarios up by name at runtime (e.g. from
//! `lockstep run --scenario non-repeatable-read`).

use std::collections::HashMap;

use thiserror::Error;

use lockstep_db::{IsolationLevel, Session};

use crate::task::Task;

/// Builds one side of a scenario from its private session and the run's
/// isolation level.
pub type TaskFactory = fn(Session, IsolationLevel) -> Box<dyn Task>;

/// Registry misuse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("scenario {0:?} already registered")]
    DuplicateScenario(String),

    #[error("unknown scenario: {0:?}")]
    UnknownScenario(String),
}

/// A registered scenario: the two task constructors and an optional
/// description for operators.
#[derive(Clone)]
pub struct ScenarioEntry {
    pub name: String,
    pub first: TaskFactory,
    pub second: TaskFactory,
    pub description: Option<String>,
}

impl ScenarioEntry {
    /// Construct both tasks, each bound to its own session.
    pub fn build(
        &self,
        first_session: Session,
        second_session: Session,
        level: IsolationLevel,
    ) -> (Box<dyn Task>, Box<dyn Task>) {
        (
            (self.first)(first_session, level),
            (self.second)(second_session, level),
        )
    }
}

impl std::fmt::Debug for ScenarioEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioEntry")
            .field("name", &self.name)
            .field("has_description", &self.description.is_some())
            .finish_non_exhaustive()
    }
}

/// Scenarios keyed by unique name. Filled once at startup, read-only after.
#[derive(Default)]
pub struct ScenarioRegistry {
    scenarios: HashMap<String, ScenarioEntry>,
}

impl ScenarioRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scenario.
    ///
    /// Fails with [`RegistryError::DuplicateScenario`] if the name is taken;
    /// the existing registration is left untouched. Descriptions are trimmed.
    pub fn register(
        &mut self,
        name: &str,
        first: TaskFactory,
        second: TaskFactory,
        description: Option<&str>,
    ) -> Result<(), RegistryError> {
        if self.scenarios.contains_key(name) {
            return Err(RegistryError::DuplicateScenario(name.to_owned()));
        }

        let entry = ScenarioEntry {
            name: name.to_owned(),
            first,
            second,
            description: description.map(|d| d.trim().to_owned()),
        };
        self.scenarios.insert(name.to_owned(), entry);
        Ok(())
    }

    /// Look up a scenario by name.
    pub fn resolve(&self, name: &str) -> Result<&ScenarioEntry, RegistryError> {
        self.scenarios
            .get(name)
            .ok_or_else(|| RegistryError::UnknownScenario(name.to_owned()))
    }

    /// Names of all registered scenarios.
    ///
    /// The order is not guaranteed (HashMap iteration order).
    pub fn list_names(&self) -> Vec<&str> {
        self.scenarios.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

impl std::fmt::Debug for ScenarioRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioRegistry")
            .field("scenarios", &self.scenarios.keys().collect::<Vec<_>>())
            .finish()
    }
}
