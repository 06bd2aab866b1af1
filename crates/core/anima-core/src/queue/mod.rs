//! Event queues and the consumer pool that drains them

mod consumer;
mod durable;
mod volatile;

pub use consumer::{ConsumerPool, ConsumerStats};
pub use durable::DurableEventQueue;
pub use volatile::{EventQueue, DEFAULT_CAPACITY};

use crate::shutdown::ShutdownReceiver;
use crate::types::Event;
use crate::Result;
use async_trait::async_trait;

/// Anything a consumer can block on for its next event
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Wait for the next event, or fail with
    /// [`AnimaError::Interrupted`](crate::AnimaError::Interrupted) on shutdown
    async fn next_event(&self, shutdown: &mut ShutdownReceiver) -> Result<Event>;
}

#[async_trait]
impl EventSource for EventQueue {
    async fn next_event(&self, shutdown: &mut ShutdownReceiver) -> Result<Event> {
        self.take_until(shutdown).await
    }
}

#[async_trait]
impl EventSource for DurableEventQueue {
    async fn next_event(&self, shutdown: &mut ShutdownReceiver) -> Result<Event> {
        self.take_until(shutdown).await
    }
}
