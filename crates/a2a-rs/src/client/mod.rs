//! Calling side of the protocol: discover a remote agent, then send it work.

pub mod card_resolver;
pub mod connection;
pub mod error;

pub use card_resolver::CardResolver;
pub use connection::RemoteConnection;
pub use error::ClientError;
