//! Anima Core
//!
//! Shared foundation of the Anima cognition pipeline:
//!
//! - Event model with explicit priority ranks
//! - Volatile priority queue and SQLite-backed durable queue
//! - Consumer pool draining a queue into an event handler
//! - Memory, opinion, desire and planned action data types
//! - Collaborator interfaces (formation, persistence, tools, feedback)
//! - Configuration, error types, shutdown signalling and logging
//!
//! # Example
//!
//! ```no_run
//! use anima_core::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     init_logging();
//!     let config = AnimaConfig::from_env()?;
//!     let queue = EventQueue::new(config.queue.capacity);
//!     queue.offer(Event::new(EventType::Feedback, EventPayload::Empty, "main"));
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export commonly used types
pub use uuid::Uuid;

pub mod collaborators;
pub mod config;
pub mod error;
pub mod queue;
pub mod shutdown;
pub mod types;
pub mod utils;

pub use collaborators::*;
pub use config::{
    load_env, AnimaConfig, ConsumerConfig, DesireConfig, DurableQueueConfig, InitiativeConfig,
    PipelineConfig, QueueConfig, SchedulerConfig,
};
pub use error::{AnimaError, Result};
pub use queue::{ConsumerPool, ConsumerStats, DurableEventQueue, EventQueue, EventSource};
pub use shutdown::{
    shutdown_channel, wait_for_shutdown, ShutdownReceiver, ShutdownSender, ShutdownSignal,
};
pub use types::*;
pub use utils::init_logging;
