use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    errors::A2aServerError,
    events::Event,
    tasks::store::TaskStore,
    types::{ContextId, Task, TaskArtifactUpdateEvent, TaskId, TaskStatus, TaskStatusUpdateEvent},
};

/// Folds the events of one request into the stored `Task`.
#[derive(Clone)]
pub struct TaskManager {
    task_store: Arc<dyn TaskStore>,
    task_id: Option<TaskId>,
    context_id: Option<ContextId>,
    current_task: Option<Task>,
}

impl TaskManager {
    pub fn new(
        task_store: Arc<dyn TaskStore>,
        task_id: Option<TaskId>,
        context_id: Option<ContextId>,
    ) -> Self {
        Self {
            task_store,
            task_id,
            context_id,
            current_task: None,
        }
    }

    pub fn task_id(&self) -> Option<&TaskId> {
        self.task_id.as_ref()
    }

    pub fn context_id(&self) -> Option<&ContextId> {
        self.context_id.as_ref()
    }

    /// Current task, from memory if already loaded, else from the store.
    pub async fn get_task(&mut self) -> Result<Option<Task>, A2aServerError> {
        let Some(task_id) = self.task_id.clone() else {
            debug!("task_id is not set, cannot get task.");
            return Ok(None);
        };

        if let Some(task) = &self.current_task {
            return Ok(Some(task.clone()));
        }

        let task = self.task_store.get(&task_id).await?;
        self.current_task = task.clone();
        Ok(task)
    }

    /// Applies one event. Returns the updated task, or `None` for plain messages.
    pub async fn process(&mut self, event: &Event) -> Result<Option<Task>, A2aServerError> {
        match event {
            Event::Task(task) => self.save_task(task.clone()).await.map(Some),
            Event::TaskStatusUpdate(update) => self
                .save_task_status_update(update.clone())
                .await
                .map(Some),
            Event::TaskArtifactUpdate(update) => self
                .save_task_artifact_update(update.clone())
                .await
                .map(Some),
            Event::Message(_) => Ok(None),
        }
    }

    pub async fn save_task(&mut self, task: Task) -> Result<Task, A2aServerError> {
        self.bind_ids(&task.id, &task.context_id)?;
        self.persist(task).await
    }

    pub async fn save_task_status_update(
        &mut self,
        event: TaskStatusUpdateEvent,
    ) -> Result<Task, A2aServerError> {
        self.bind_ids(&event.task_id, &event.context_id)?;

        let mut task = match self.get_task().await? {
            Some(task) => task,
            None => {
                debug!(task_id = %event.task_id, "Creating task from status update");
                Task {
                    id: event.task_id.clone(),
                    context_id: event.context_id.clone(),
                    status: TaskStatus::new(event.status.state, None),
                    history: vec![],
                    artifacts: vec![],
                    metadata: None,
                    kind: "task".to_string(),
                }
            }
        };

        apply_status_update(&mut task, event);
        self.persist(task).await
    }

    pub async fn save_task_artifact_update(
        &mut self,
        event: TaskArtifactUpdateEvent,
    ) -> Result<Task, A2aServerError> {
        self.bind_ids(&event.task_id, &event.context_id)?;

        let mut task = self.get_task().await?.ok_or_else(|| {
            A2aServerError::internal("Task not found when processing artifact update")
        })?;

        apply_artifact_update(&mut task, event);
        self.persist(task).await
    }

    async fn persist(&mut self, task: Task) -> Result<Task, A2aServerError> {
        self.task_store.save(&task).await?;
        self.current_task = Some(task.clone());
        Ok(task)
    }

    fn bind_ids(&mut self, task_id: &str, context_id: &str) -> Result<(), A2aServerError> {
        match &self.task_id {
            Some(expected) if expected != task_id => {
                warn!(expected = %expected, received = %task_id, "Task id mismatch");
                return Err(A2aServerError::internal(
                    "Task manager task ID does not match event task ID",
                ));
            }
            Some(_) => {}
            None => self.task_id = Some(task_id.to_string()),
        }
        match &self.context_id {
            Some(expected) if expected != context_id => Err(A2aServerError::internal(
                "Task manager context ID does not match event context ID",
            )),
            Some(_) => Ok(()),
            None => {
                self.context_id = Some(context_id.to_string());
                Ok(())
            }
        }
    }
}

/// Replaces the task status. The message of the outgoing status is kept in history.
pub fn apply_status_update(task: &mut Task, event: TaskStatusUpdateEvent) {
    if task.status == event.status {
        // Same event observed by more than one consumer.
        return;
    }
    if let Some(previous) = task.status.message.take() {
        task.history.push(previous);
    }
    task.status = event.status;
}

/// Adds an artifact chunk to the task.
///
/// `append=true` extends the parts of the artifact with the same id; anything
/// else inserts the artifact or replaces one with the same id.
pub fn apply_artifact_update(task: &mut Task, event: TaskArtifactUpdateEvent) {
    let artifact = event.artifact;
    let existing = task
        .artifacts
        .iter_mut()
        .find(|a| a.artifact_id == artifact.artifact_id);

    match (existing, event.append.unwrap_or(false)) {
        (Some(existing), true) => {
            debug!(artifact_id = %artifact.artifact_id, "Appending parts to artifact");
            existing.parts.extend(artifact.parts);
        }
        (Some(existing), false) => {
            debug!(artifact_id = %artifact.artifact_id, "Replacing artifact");
            *existing = artifact;
        }
        (None, append) => {
            if append {
                warn!(
                    artifact_id = %artifact.artifact_id,
                    "Append requested for unknown artifact, inserting it"
                );
            }
            task.artifacts.push(artifact);
        }
    }
}
