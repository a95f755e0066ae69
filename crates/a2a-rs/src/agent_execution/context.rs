use crate::types::{ContextId, Message, MessageSendConfiguration, MessageSendParams, Task, TaskId};

/// Everything an `AgentExecutor` needs to know about the request it serves.
///
/// The task and context ids are always resolved by the request handler before
/// the executor runs; the incoming message carries the same ids.
#[derive(Debug, Clone)]
pub struct RequestContext {
    params: Option<MessageSendParams>,
    task_id: TaskId,
    context_id: ContextId,
    current_task: Option<Task>,
    related_tasks: Vec<Task>,
}

impl RequestContext {
    pub fn new(
        params: Option<MessageSendParams>,
        task_id: TaskId,
        context_id: ContextId,
        current_task: Option<Task>,
    ) -> Self {
        let params = params.map(|mut params| {
            params.message.task_id = Some(task_id.clone());
            params.message.context_id = Some(context_id.clone());
            params
        });

        Self {
            params,
            task_id,
            context_id,
            current_task,
            related_tasks: vec![],
        }
    }

    /// Text of the incoming message, text parts joined by `delimiter`.
    pub fn get_user_input(&self, delimiter: &str) -> String {
        self.message()
            .map(|message| message.text(delimiter))
            .unwrap_or_default()
    }

    pub fn attach_related_task(&mut self, task: Task) {
        self.related_tasks.push(task);
    }

    pub fn message(&self) -> Option<&Message> {
        self.params.as_ref().map(|p| &p.message)
    }

    pub fn related_tasks(&self) -> &[Task] {
        &self.related_tasks
    }

    pub fn current_task(&self) -> Option<&Task> {
        self.current_task.as_ref()
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    pub fn configuration(&self) -> Option<&MessageSendConfiguration> {
        self.params.as_ref().and_then(|p| p.configuration.as_ref())
    }
}
