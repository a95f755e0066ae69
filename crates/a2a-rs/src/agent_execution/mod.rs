pub mod agent_executor;
pub mod context;

pub use agent_executor::{AgentExecutor, BoxedFuture};
pub use context::RequestContext;
