//! Sports agents served over the inter-agent JSON-RPC protocol.
//!
//! Both agents share one pipeline: a [`model::ModelBackend`] streams raw
//! events, [`stream::classify`] types them, the
//! [`executor::StreamingTaskExecutor`] buffers them into updates and the
//! [`adapter::ProtocolAdapter`] publishes those as task events. The results
//! and news agents differ only in their card, instructions and hosted tool.

pub mod adapter;
pub mod cards;
pub mod config;
pub mod executor;
pub mod model;
pub mod server;
pub mod stream;
