//! Routing agent: answers users through a hosted LLM agent that delegates
//! sports questions to remote agents over the inter-agent protocol.

pub mod completion;
pub mod config;
pub mod orchestrator;
pub mod prompt;
pub mod registry;
pub mod router;
pub mod runtime;
pub mod server;
pub mod session;
pub mod tools;
