use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;

use crate::{
    errors::A2aServerError,
    types::{
        MessageSendParams, SendMessageSuccessResponseResult,
        SendStreamingMessageSuccessResponseResult, Task, TaskIdParams, TaskQueryParams,
    },
};

pub type TaskSubscriptionStream = Pin<
    Box<
        dyn Stream<Item = Result<SendStreamingMessageSuccessResponseResult, A2aServerError>> + Send,
    >,
>;

/// A2A request handler interface.
///
/// One method per JSON-RPC method the server answers. Push notification
/// configuration is not supported and is rejected by the transport layer.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Handles the 'tasks/get' method.
    ///
    /// Returns the stored task, with its history cut to the last
    /// `history_length` messages when one is given. `None` if unknown.
    async fn on_get_task(&self, params: TaskQueryParams) -> Result<Option<Task>, A2aServerError>;

    /// Handles the 'tasks/cancel' method.
    ///
    /// # Errors
    ///
    /// `TaskNotFoundError` for unknown tasks and `TaskNotCancelableError` for
    /// tasks that already reached a terminal state.
    async fn on_cancel_task(&self, params: TaskIdParams) -> Result<Option<Task>, A2aServerError>;

    /// Handles the 'message/send' method (non-streaming).
    ///
    /// Creates, continues or follows up a task and waits until the agent
    /// finishes or asks for more input.
    async fn on_message_send(
        &self,
        params: MessageSendParams,
    ) -> Result<SendMessageSuccessResponseResult, A2aServerError>;

    /// Handles the 'message/stream' method.
    ///
    /// Yields every event as soon as it has been applied to the task store.
    async fn on_message_send_stream(
        &self,
        params: MessageSendParams,
    ) -> Result<TaskSubscriptionStream, A2aServerError>;

    /// Handles the 'tasks/resubscribe' method.
    ///
    /// Attaches to the event stream of a task that is still running.
    async fn on_resubscribe_to_task(
        &self,
        params: TaskIdParams,
    ) -> Result<TaskSubscriptionStream, A2aServerError>;
}
