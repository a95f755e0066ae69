pub mod event_consumer;
pub mod event_queue;
pub mod in_memory_queue_manager;
pub mod queue_manager;

pub use event_consumer::EventConsumer;
pub use event_queue::{DEFAULT_MAX_QUEUE_SIZE, DequeueError, Event, EventQueue};
pub use in_memory_queue_manager::InMemoryQueueManager;
pub use queue_manager::{NoTaskQueue, QueueManager, TaskQueueExists};
