use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::runtime::{AgentsRuntime, Run, RunError, RunStatus, RuntimeError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_POLL_ITERATIONS: u32 = 60;
pub const FETCH_FAILURE_BACKOFF: Duration = Duration::from_secs(5);

/// How a run ended, as far as the caller is concerned.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalStatus {
    Completed,
    Failed(Option<RunError>),
    Cancelled,
    Expired,
    /// Still pending after the last allowed poll.
    TimedOut,
}

impl TerminalStatus {
    fn from_run(run: &Run) -> Self {
        match run.status {
            RunStatus::Failed => TerminalStatus::Failed(run.last_error.clone()),
            RunStatus::Cancelled | RunStatus::Cancelling => TerminalStatus::Cancelled,
            RunStatus::Expired => TerminalStatus::Expired,
            _ => TerminalStatus::Completed,
        }
    }
}

/// Answers a run that stopped in `requires_action`.
#[async_trait]
pub trait RequiredActionHandler: Send + Sync {
    async fn handle(&self, run: &Run) -> Result<(), RuntimeError>;
}

/// Waits for a run to leave the pending states.
#[async_trait]
pub trait RunCompletion: Send + Sync {
    async fn await_completion(
        &self,
        run: Run,
        handler: &dyn RequiredActionHandler,
    ) -> Result<TerminalStatus, RuntimeError>;
}

/// Polls the runtime at a fixed interval for a bounded number of iterations.
///
/// A failed status fetch is logged and retried after an extra back-off; it
/// never ends the wait on its own. A failed required-action handler ends it
/// with that error, so a tool call is never answered twice.
pub struct RunPoller {
    runtime: Arc<dyn AgentsRuntime>,
    interval: Duration,
    max_iterations: u32,
    fetch_backoff: Duration,
}

impl RunPoller {
    pub fn new(runtime: Arc<dyn AgentsRuntime>, interval: Duration, max_iterations: u32) -> Self {
        Self {
            runtime,
            interval,
            max_iterations,
            fetch_backoff: FETCH_FAILURE_BACKOFF,
        }
    }
}

#[async_trait]
impl RunCompletion for RunPoller {
    #[instrument(skip_all, fields(run_id = %run.id, thread_id = %run.thread_id))]
    async fn await_completion(
        &self,
        mut run: Run,
        handler: &dyn RequiredActionHandler,
    ) -> Result<TerminalStatus, RuntimeError> {
        let mut iteration = 0;

        while run.status.is_pending() && iteration < self.max_iterations {
            if run.status == RunStatus::RequiresAction {
                if let Err(e) = handler.handle(&run).await {
                    warn!(error = %e, "Failed to answer required action, abandoning run");
                    return Err(e);
                }
            }

            tokio::time::sleep(self.interval).await;
            iteration += 1;

            match self.runtime.get_run(&run.thread_id, &run.id).await {
                Ok(latest) => {
                    debug!(iteration, status = ?latest.status, "Polled run");
                    run = latest;
                }
                Err(e) => {
                    warn!(iteration, error = %e, "Failed to fetch run status, backing off");
                    tokio::time::sleep(self.fetch_backoff).await;
                }
            }
        }

        if run.status.is_pending() {
            warn!(iterations = iteration, status = ?run.status, "Run did not finish in time");
            return Ok(TerminalStatus::TimedOut);
        }

        debug!(status = ?run.status, iterations = iteration, "Run finished");
        Ok(TerminalStatus::from_run(&run))
    }
}
