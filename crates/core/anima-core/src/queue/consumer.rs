//! Consumer pool draining an event source into an [`EventHandler`]

use super::EventSource;
use crate::collaborators::EventHandler;
use crate::shutdown::{shutdown_channel, ShutdownSender, ShutdownSignal};
use crate::types::{EventType, Service};
use crate::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Counters shared by all consumers of a pool
#[derive(Debug, Default)]
pub struct ConsumerStats {
    handled: AtomicU64,
    failed: AtomicU64,
}

impl ConsumerStats {
    /// Events whose handler returned `Ok`
    pub fn handled(&self) -> u64 {
        self.handled.load(Ordering::Relaxed)
    }

    /// Events whose handler failed or panicked
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// A fixed number of tasks, each taking events and handing them to one
/// shared handler
///
/// A failing or panicking handler is logged and the consumer moves on to
/// the next event. A `Shutdown` event stops the consumer that takes it.
pub struct ConsumerPool {
    source: Arc<dyn EventSource>,
    handler: Arc<dyn EventHandler>,
    consumer_count: usize,
    shutdown: ShutdownSender,
    handles: Vec<JoinHandle<()>>,
    stats: Arc<ConsumerStats>,
}

impl ConsumerPool {
    /// Create a stopped pool
    pub fn new(
        source: Arc<dyn EventSource>,
        handler: Arc<dyn EventHandler>,
        consumer_count: usize,
    ) -> Self {
        let (shutdown, _) = shutdown_channel();
        Self {
            source,
            handler,
            consumer_count: consumer_count.max(1),
            shutdown,
            handles: Vec::new(),
            stats: Arc::new(ConsumerStats::default()),
        }
    }

    /// Share the pool's shutdown channel, e.g. with a runtime-wide signal
    pub fn with_shutdown(mut self, shutdown: ShutdownSender) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Handled/failed counters
    pub fn stats(&self) -> Arc<ConsumerStats> {
        self.stats.clone()
    }

    /// Number of consumer tasks started by `start`
    pub fn consumer_count(&self) -> usize {
        self.consumer_count
    }

    fn spawn_consumer(&self, index: usize) -> JoinHandle<()> {
        let source = self.source.clone();
        let handler = self.handler.clone();
        let stats = self.stats.clone();
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            debug!(consumer = index, "event consumer started");
            loop {
                let event = match source.next_event(&mut shutdown).await {
                    Ok(event) => event,
                    Err(e) if e.is_interrupted() => break,
                    Err(e) => {
                        warn!(consumer = index, error = %e, "failed to take event");
                        tokio::time::sleep(ERROR_BACKOFF).await;
                        continue;
                    }
                };

                if event.event_type() == EventType::Shutdown {
                    info!(consumer = index, "shutdown event received");
                    break;
                }

                let event_id = event.id();
                let event_type = event.event_type();
                let handler = handler.clone();
                // Run on its own task so a panic is contained.
                match tokio::spawn(async move { handler.handle(event).await }).await {
                    Ok(Ok(())) => {
                        stats.handled.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(Err(e)) => {
                        stats.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(consumer = index, %event_id, %event_type, error = %e, "event handler failed");
                    }
                    Err(join_error) => {
                        stats.failed.fetch_add(1, Ordering::Relaxed);
                        error!(consumer = index, %event_id, %event_type, error = %join_error, "event handler panicked");
                    }
                }
            }
            debug!(consumer = index, "event consumer stopped");
        })
    }
}

#[async_trait]
impl Service for ConsumerPool {
    fn service_type(&self) -> &str {
        "event_consumer_pool"
    }

    async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        info!(consumers = self.consumer_count, "starting event consumer pool");
        self.handles = (0..self.consumer_count)
            .map(|i| self.spawn_consumer(i))
            .collect();
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        // No receivers just means every consumer already exited.
        let _ = self.shutdown.send(ShutdownSignal::Graceful);
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "event consumer ended abnormally");
            }
        }
        info!("event consumer pool stopped");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.handles.iter().any(|h| !h.is_finished())
    }
}
