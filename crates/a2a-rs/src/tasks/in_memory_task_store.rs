use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    errors::A2aServerError,
    tasks::store::TaskStore,
    types::{Task, TaskId},
};

/// Keeps tasks in process memory; everything is lost on restart.
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<TaskId, Task>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn save(&self, task: &Task) -> Result<(), A2aServerError> {
        self.tasks
            .write()
            .await
            .insert(task.id.clone(), task.clone());
        debug!(task_id = %task.id, state = ?task.status.state, "Task saved");
        Ok(())
    }

    async fn get(&self, id: &TaskId) -> Result<Option<Task>, A2aServerError> {
        let task = self.tasks.read().await.get(id).cloned();
        if task.is_none() {
            debug!(task_id = %id, "Task not found");
        }
        Ok(task)
    }

    async fn delete(&self, id: &TaskId) -> Result<(), A2aServerError> {
        match self.tasks.write().await.remove(id) {
            Some(_) => debug!(task_id = %id, "Task deleted"),
            None => debug!(task_id = %id, "Attempted to delete nonexistent task"),
        }
        Ok(())
    }
}
