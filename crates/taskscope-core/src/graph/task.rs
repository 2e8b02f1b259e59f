//! Tasks: the user-level work units commands are generated from.

use serde::{Deserialize, Serialize};

use super::dependency::DependencyId;

/// Task identifier.
pub type TaskId = u64;

/// Where a task's kernel runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionTarget {
    Device,
    Host,
    #[default]
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub target: ExecutionTarget,
    pub(crate) predecessors: Vec<DependencyId>,
    pub(crate) successors: Vec<DependencyId>,
}

impl Task {
    pub fn new(id: TaskId, name: impl Into<String>, target: ExecutionTarget) -> Self {
        Self {
            id,
            name: name.into(),
            target,
            predecessors: Vec::new(),
            successors: Vec::new(),
        }
    }

    pub fn predecessors(&self) -> &[DependencyId] {
        &self.predecessors
    }

    pub fn successors(&self) -> &[DependencyId] {
        &self.successors
    }
}
