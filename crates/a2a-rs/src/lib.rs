pub mod adapters;
pub mod agent_execution;
pub mod client;
pub mod errors;
pub mod events;
pub mod request_handlers;
pub mod service;
pub mod tasks;
pub mod types;
