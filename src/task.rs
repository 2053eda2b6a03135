//! Tickets that drive the pipeline and the store that queues them.

use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};

use crate::forge::config::DEFAULT_BRANCH_PREFIX;

/// A unit of work to turn into a pull request. Identity is the issue
/// number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl Task {
    /// Branch that receives this task's generated changes.
    pub fn branch_name(&self) -> String {
        format!("{DEFAULT_BRANCH_PREFIX}-{}", self.id)
    }

    /// Commit message (and pull request title) for this task.
    pub fn commit_message(&self) -> String {
        format!("AI-generated code for #{}", self.id)
    }
}

/// Storage for received tasks.
#[cfg_attr(test, mockall::automock)]
pub trait TaskStore: Send + Sync {
    /// Store `task`, replacing any task with the same id.
    fn add(&self, task: Task);
    /// All tasks in insertion order.
    fn list(&self) -> Vec<Task>;
    fn get(&self, id: u64) -> Option<Task>;
    fn clear(&self);
}

/// Process-scoped [`TaskStore`]. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<Vec<Task>>,
}

impl TaskStore for InMemoryTaskStore {
    fn add(&self, task: Task) {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);

        match tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => tasks.push(task),
        }
    }

    fn list(&self) -> Vec<Task> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn get(&self, id: u64) -> Option<Task> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|t| t.id == id)
            .cloned()
    }

    fn clear(&self) {
        self.tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
