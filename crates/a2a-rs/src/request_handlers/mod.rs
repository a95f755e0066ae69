pub mod default_request_handler;
pub mod request_handler;

pub use default_request_handler::DefaultRequestHandler;
pub use request_handler::{RequestHandler, TaskSubscriptionStream};
