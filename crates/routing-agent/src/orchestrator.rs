//! Routing orchestrator.
//!
//! Owns the hosted routing agent, runs one LLM turn per user message and
//! answers the agent's `send_message` calls by delegating to remote agents.
//!
//! ```text
//! user text ─► thread message ─► run ─► poll ──► completed ─► latest reply
//!                                        │  ▲
//!                        requires_action ▼  │ tool outputs
//!                                   send_message ─► remote agent
//! ```

use std::sync::Arc;
use std::time::Duration;

use a2a_rs::client::ClientError;
use a2a_rs::types::{Message, MessageSendParams, Role, SendMessageSuccessResponseResult};
use async_trait::async_trait;
use serde_json::Value;
use shared::error::CommonError;
use shared::rate_limit::{RunFailure, describe_run_failure};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::completion::{
    DEFAULT_MAX_POLL_ITERATIONS, DEFAULT_POLL_INTERVAL, RequiredActionHandler, RunCompletion,
    RunPoller, TerminalStatus,
};
use crate::prompt::{active_agent_instruction, root_instruction};
use crate::registry::RemoteAgentRegistry;
use crate::runtime::{
    AgentsRuntime, CreateAgentRequest, Run, RunError, RuntimeError, SortOrder, Thread, ToolOutput,
};
use crate::session::{
    DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_IDLE_TTL, SessionContext, SessionStore,
};
use crate::tools::{
    SEND_MESSAGE, SendMessageArgs, SendMessageOutcome, invalid_arguments, send_message_tool,
    unknown_function,
};

pub const ROUTING_AGENT_NAME: &str = "routing-agent";
pub const TIMEOUT_MESSAGE: &str = "Request timed out after 60 seconds. Please try again.";
pub const NO_RESPONSE_MESSAGE: &str = "No response received from agent.";

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Common(#[from] CommonError),
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub model: String,
    pub remote_agents: Vec<String>,
    pub resolve_timeout: Duration,
    pub poll_interval: Duration,
    pub max_poll_iterations: u32,
    pub session_idle_ttl: Duration,
    pub max_sessions: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4.1-mini".to_string(),
            remote_agents: vec![],
            resolve_timeout: Duration::from_secs(30),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_iterations: DEFAULT_MAX_POLL_ITERATIONS,
            session_idle_ttl: DEFAULT_SESSION_IDLE_TTL,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEventKind {
    AgentStart,
    AgentComplete,
}

/// Progress of a remote dispatch, reported while a turn is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub kind: StatusEventKind,
    pub agent_name: String,
}

pub trait StatusSink: Send + Sync {
    fn notify(&self, event: StatusEvent);
}

impl StatusSink for tokio::sync::mpsc::UnboundedSender<StatusEvent> {
    fn notify(&self, event: StatusEvent) {
        // The receiver goes away when the client disconnects mid-stream.
        let _ = self.send(event);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserTurn {
    pub text: String,
    pub session_id: Option<String>,
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnReply {
    pub response: String,
    pub session_id: String,
    pub thread_id: String,
}

pub struct RoutingOrchestrator {
    runtime: Arc<dyn AgentsRuntime>,
    completion: Arc<dyn RunCompletion>,
    registry: RemoteAgentRegistry,
    sessions: SessionStore,
    agent_id: String,
}

impl RoutingOrchestrator {
    /// Resolves the remote agents, then creates the hosted routing agent.
    pub async fn create(
        config: OrchestratorConfig,
        runtime: Arc<dyn AgentsRuntime>,
    ) -> Result<Self, RoutingError> {
        let registry =
            RemoteAgentRegistry::initialize(&config.remote_agents, config.resolve_timeout).await?;
        Self::with_registry(config, runtime, registry).await
    }

    #[instrument(skip_all, fields(model = %config.model, remote_agents = registry.len()))]
    pub async fn with_registry(
        config: OrchestratorConfig,
        runtime: Arc<dyn AgentsRuntime>,
        registry: RemoteAgentRegistry,
    ) -> Result<Self, RoutingError> {
        let tools = if registry.is_empty() {
            info!("No remote agents available, routing agent runs without tools");
            vec![]
        } else {
            vec![send_message_tool()]
        };

        let definition = runtime
            .create_agent(&CreateAgentRequest {
                model: config.model.clone(),
                name: ROUTING_AGENT_NAME.to_string(),
                instructions: root_instruction(&registry.list()),
                tools,
            })
            .await?;
        info!(agent_id = %definition.id, "Created routing agent");

        let completion = Arc::new(RunPoller::new(
            runtime.clone(),
            config.poll_interval,
            config.max_poll_iterations,
        ));

        Ok(Self {
            runtime,
            completion,
            registry,
            sessions: SessionStore::with_limits(config.session_idle_ttl, config.max_sessions),
            agent_id: definition.id,
        })
    }

    pub fn with_completion(mut self, completion: Arc<dyn RunCompletion>) -> Self {
        self.completion = completion;
        self
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn registry(&self) -> &RemoteAgentRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Runs one user turn to completion.
    ///
    /// Expected failures (run failures, timeouts, rate limits, unreachable
    /// agents) come back as readable text in the reply. Any other runtime
    /// error is returned as `Err`.
    #[instrument(skip_all, fields(session_id, thread_id))]
    pub async fn process_user_message(
        &self,
        turn: UserTurn,
        sink: Option<Arc<dyn StatusSink>>,
    ) -> Result<TurnReply, RoutingError> {
        let key = SessionStore::resolve_key(turn.session_id.as_deref(), turn.thread_id.as_deref());
        let session = self.sessions.get_or_create(&key);
        let mut context = session.lock().await;
        context.initialize_session();
        tracing::Span::current().record("session_id", key.as_str());

        let response = match self.run_turn(&mut context, &turn, sink.as_deref()).await {
            Ok(response) => response,
            Err(e) => match e.limit_message() {
                Some(message) => {
                    warn!(error = %e, "Agent runtime refused the turn with a limit");
                    message
                }
                None => return Err(e.into()),
            },
        };

        Ok(TurnReply {
            response,
            session_id: key,
            thread_id: context.thread_id.clone().unwrap_or_default(),
        })
    }

    async fn run_turn(
        &self,
        context: &mut SessionContext,
        turn: &UserTurn,
        sink: Option<&dyn StatusSink>,
    ) -> Result<String, RuntimeError> {
        let requested_thread = turn.thread_id.clone().or_else(|| context.thread_id.clone());
        let thread = self.resolve_thread(requested_thread.as_deref()).await?;
        context.thread_id = Some(thread.id.clone());
        tracing::Span::current().record("thread_id", thread.id.as_str());

        self.runtime.create_message(&thread.id, &turn.text).await?;
        let instructions = active_agent_instruction(context.check_active_agent());
        let run = self
            .runtime
            .create_run(&thread.id, &self.agent_id, Some(&instructions))
            .await?;
        debug!(run_id = %run.id, "Started run");

        let dispatcher = ToolDispatcher {
            orchestrator: self,
            session: Mutex::new(context),
            sink,
        };
        let status = self.completion.await_completion(run, &dispatcher).await?;
        drop(dispatcher);

        match status {
            TerminalStatus::TimedOut => Ok(TIMEOUT_MESSAGE.to_string()),
            TerminalStatus::Failed(last_error) => Ok(describe_failure(last_error.as_ref())),
            TerminalStatus::Completed | TerminalStatus::Cancelled | TerminalStatus::Expired => {
                self.latest_reply(&thread.id).await
            }
        }
    }

    async fn resolve_thread(&self, thread_id: Option<&str>) -> Result<Thread, RuntimeError> {
        if let Some(thread_id) = thread_id {
            match self.runtime.get_thread(thread_id).await {
                Ok(thread) => return Ok(thread),
                Err(e) => {
                    warn!(thread_id = %thread_id, error = %e, "Thread lookup failed, creating a new thread");
                }
            }
        }
        let thread = self.runtime.create_thread().await?;
        info!(thread_id = %thread.id, "Created thread");
        Ok(thread)
    }

    async fn latest_reply(&self, thread_id: &str) -> Result<String, RuntimeError> {
        let messages = self
            .runtime
            .list_messages(thread_id, SortOrder::Descending)
            .await?;
        let reply = messages
            .iter()
            .filter(|message| message.role == "assistant")
            .find_map(|message| message.text());
        match reply {
            Some(text) => Ok(text.to_string()),
            None => {
                warn!(thread_id = %thread_id, "Run completed without an assistant reply");
                Ok(NO_RESPONSE_MESSAGE.to_string())
            }
        }
    }

    /// Delegates `task` to the named remote agent.
    ///
    /// Correlation ids stored on `context` are reused, so every dispatch
    /// within a session shares one task id and one context id.
    #[instrument(skip_all, fields(agent_name = %agent_name))]
    pub async fn send_message(
        &self,
        context: &mut SessionContext,
        agent_name: &str,
        task: &str,
        sink: Option<&dyn StatusSink>,
    ) -> SendMessageOutcome {
        if self.registry.is_empty() {
            warn!("send_message called with no remote agents registered");
            return SendMessageOutcome::no_agents();
        }
        let Some(connection) = self.registry.get(agent_name) else {
            warn!(available = ?self.registry.names(), "Unknown remote agent requested");
            return SendMessageOutcome::agent_not_found(agent_name, &self.registry.names());
        };

        context.active_agent = Some(agent_name.to_string());
        if let Some(sink) = sink {
            sink.notify(StatusEvent {
                kind: StatusEventKind::AgentStart,
                agent_name: agent_name.to_string(),
            });
        }

        let (task_id, context_id) = context.correlation_ids();
        let metadata = context.input_message_metadata.clone();
        let mut message = Message::new_text(Role::User, task, Some(task_id), Some(context_id));
        if let Some(message_id) = metadata
            .as_ref()
            .and_then(|metadata| metadata.get("message_id"))
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
        {
            message.message_id = message_id.to_string();
        }
        message.metadata = metadata;
        debug!(
            message_id = %message.message_id,
            task_id = ?message.task_id,
            context_id = ?message.context_id,
            "Dispatching task to remote agent"
        );

        let params = MessageSendParams {
            message,
            configuration: None,
            metadata: None,
        };
        match connection.send_message(params).await {
            Ok(SendMessageSuccessResponseResult::Task(task)) => {
                info!(task_id = %task.id, state = ?task.status.state, "Remote agent returned a task");
                if let Some(sink) = sink {
                    sink.notify(StatusEvent {
                        kind: StatusEventKind::AgentComplete,
                        agent_name: agent_name.to_string(),
                    });
                }
                SendMessageOutcome::Task(Box::new(task))
            }
            Ok(SendMessageSuccessResponseResult::Message(_)) => {
                warn!("Remote agent answered with a message instead of a task");
                SendMessageOutcome::NoUsableTask {
                    agent: agent_name.to_string(),
                }
            }
            Err(e @ (ClientError::Connection { .. } | ClientError::Http { .. })) => {
                error!(error = %e, "Remote agent unreachable");
                SendMessageOutcome::unreachable(agent_name, &e.to_string())
            }
            Err(e) => {
                warn!(error = %e, "Remote agent returned no usable task");
                SendMessageOutcome::NoUsableTask {
                    agent: agent_name.to_string(),
                }
            }
        }
    }

    /// Deletes the hosted routing agent.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.runtime.delete_agent(&self.agent_id).await?;
        info!(agent_id = %self.agent_id, "Deleted routing agent");
        Ok(())
    }
}

fn describe_failure(last_error: Option<&RunError>) -> String {
    let raw = last_error
        .and_then(|error| serde_json::to_string(error).ok())
        .unwrap_or_else(|| "None".to_string());
    describe_run_failure(&RunFailure {
        raw: &raw,
        code: last_error.and_then(|error| error.code.as_deref()),
        message: last_error.and_then(|error| error.message.as_deref()),
        kind: None,
        param: None,
    })
}

/// Answers `requires_action` for one turn. Holds the turn's session context
/// so consecutive tool calls see each other's correlation ids.
struct ToolDispatcher<'a> {
    orchestrator: &'a RoutingOrchestrator,
    session: Mutex<&'a mut SessionContext>,
    sink: Option<&'a dyn StatusSink>,
}

#[async_trait]
impl RequiredActionHandler for ToolDispatcher<'_> {
    #[instrument(skip_all, fields(run_id = %run.id, calls = run.tool_calls().len()))]
    async fn handle(&self, run: &Run) -> Result<(), RuntimeError> {
        let mut outputs = Vec::with_capacity(run.tool_calls().len());

        for call in run.tool_calls() {
            let output = if call.function.name != SEND_MESSAGE {
                warn!(function = %call.function.name, "Model called an unknown function");
                unknown_function(&call.function.name)
            } else {
                match serde_json::from_str::<SendMessageArgs>(&call.function.arguments) {
                    Ok(args) => {
                        let mut context = self.session.lock().await;
                        self.orchestrator
                            .send_message(&mut context, &args.agent_name, &args.task, self.sink)
                            .await
                            .to_tool_output()
                    }
                    Err(e) => {
                        warn!(error = %e, "Invalid send_message arguments");
                        invalid_arguments(&e)
                    }
                }
            };
            outputs.push(ToolOutput {
                tool_call_id: call.id.clone(),
                output,
            });
        }

        if outputs.is_empty() {
            return Ok(());
        }
        self.orchestrator
            .runtime
            .submit_tool_outputs(&run.thread_id, &run.id, &outputs)
            .await?;
        debug!(count = outputs.len(), "Submitted tool outputs");
        Ok(())
    }
}
