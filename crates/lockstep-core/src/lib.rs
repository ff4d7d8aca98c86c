//! Lockstep harness: two scripted tasks take turns against a shared resource
//! so that every run interleaves their steps in exactly the same order.

pub mod handoff;
pub mod log;
pub mod registry;
pub mod runner;
pub mod scenarios;
pub mod task;

pub use handoff::{DEFAULT_HANDOFF_TIMEOUT, HandoffStats, Turn, turn_pair};
pub use log::{LogEntry, SequenceLog};
pub use registry::{RegistryError, ScenarioEntry, ScenarioRegistry, TaskFactory};
pub use runner::{BoundTask, RunSummary, run_lockstep};
pub use scenarios::{builtin_registry, run_scenario};
pub use task::{Task, TaskState, execute};
