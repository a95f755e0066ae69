use std::future::Future;
use std::pin::Pin;

use crate::{agent_execution::context::RequestContext, events::event_queue::EventQueue};

pub type BoxedFuture<'a> = Pin<
    Box<
        dyn Future<Output = Result<(), Box<dyn std::error::Error + Send + Sync + 'static>>>
            + Send
            + 'a,
    >,
>;

/// The agent-specific half of a server: turns a request into events.
pub trait AgentExecutor: Send + Sync {
    /// Runs the agent for `context`, publishing `Task`, status and artifact
    /// events to `event_queue`. Returns once the request is finished or the
    /// task is waiting for more input.
    fn execute<'a>(&'a self, context: RequestContext, event_queue: EventQueue) -> BoxedFuture<'a>;

    /// Stops the task named by `context` and publishes its `canceled` status.
    fn cancel<'a>(&'a self, context: RequestContext, event_queue: EventQueue) -> BoxedFuture<'a>;
}
