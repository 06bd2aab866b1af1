//! In-process priority event queue
//!
//! Events are served lowest priority rank first; within one rank they are
//! served strictly in arrival order (a sequence number assigned by
//! [`EventQueue::offer`]).

use crate::shutdown::{wait_for_shutdown, ShutdownReceiver};
use crate::types::Event;
use crate::{AnimaError, Result};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Default number of pending events before `offer` starts refusing
pub const DEFAULT_CAPACITY: usize = 10_000;

struct QueuedEvent {
    priority: u8,
    seq: u64,
    event: Event,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    // BinaryHeap is a max-heap: the "greatest" element is the lowest rank,
    // then the earliest arrival.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct Inner {
    heap: BinaryHeap<QueuedEvent>,
    next_seq: u64,
}

/// Capacity-bounded, priority-ordered, thread-safe event queue
pub struct EventQueue {
    inner: Mutex<Inner>,
    // Written only while `inner` is locked, read lock-free.
    len: AtomicUsize,
    capacity: usize,
    available: Notify,
}

impl EventQueue {
    /// Create a queue holding at most `capacity` events
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            len: AtomicUsize::new(0),
            capacity,
            available: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("event queue lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Enqueue an event; returns false (and drops nothing) when full
    pub fn offer(&self, event: Event) -> bool {
        {
            let mut inner = self.lock();
            if inner.heap.len() >= self.capacity {
                debug!(
                    event_type = %event.event_type(),
                    capacity = self.capacity,
                    "event queue full, refusing offer"
                );
                return false;
            }
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.heap.push(QueuedEvent {
                priority: event.priority(),
                seq,
                event,
            });
            self.len.store(inner.heap.len(), Ordering::SeqCst);
        }
        self.available.notify_one();
        true
    }

    /// Remove the head without waiting
    pub fn try_take(&self) -> Option<Event> {
        let (event, remaining) = {
            let mut inner = self.lock();
            let queued = inner.heap.pop()?;
            self.len.store(inner.heap.len(), Ordering::SeqCst);
            (queued.event, inner.heap.len())
        };
        if remaining > 0 {
            // Hand the wakeup on so a sleeping consumer sees the rest.
            self.available.notify_one();
        }
        Some(event)
    }

    /// Wait until an event is available and remove the head
    ///
    /// Dropping the returned future cancels the wait without losing events.
    pub async fn take(&self) -> Event {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(event) = self.try_take() {
                return event;
            }
            notified.await;
        }
    }

    /// Like [`take`](Self::take), but gives up with
    /// [`AnimaError::Interrupted`] when a shutdown signal arrives first
    pub async fn take_until(&self, shutdown: &mut ShutdownReceiver) -> Result<Event> {
        tokio::select! {
            biased;
            event = self.take() => Ok(event),
            signal = wait_for_shutdown(shutdown) => Err(AnimaError::interrupted(format!(
                "event queue wait interrupted by {:?} shutdown",
                signal
            ))),
        }
    }

    /// Like [`take`](Self::take), but returns `None` once `timeout` elapses
    pub async fn poll(&self, timeout: Duration) -> Option<Event> {
        tokio::time::timeout(timeout, self.take()).await.ok()
    }

    /// Copy of the head, if any
    pub fn peek(&self) -> Option<Event> {
        self.lock().heap.peek().map(|queued| queued.event.clone())
    }

    /// Drop every pending event, returning how many were dropped
    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        let dropped = inner.heap.len();
        inner.heap.clear();
        self.len.store(0, Ordering::SeqCst);
        dropped
    }

    /// Number of pending events
    pub fn size(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    /// Whether no events are pending
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Whether `offer` would currently refuse
    pub fn is_full(&self) -> bool {
        self.size() >= self.capacity
    }

    /// Maximum number of pending events
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fill level in percent
    pub fn load_percentage(&self) -> f64 {
        if self.capacity == 0 {
            return 100.0;
        }
        (self.size() as f64 / self.capacity as f64) * 100.0
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("size", &self.size())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::{shutdown_channel, ShutdownSignal};
    use crate::types::{EventPayload, EventType};
    use std::sync::Arc;

    fn event(event_type: EventType, tag: &str) -> Event {
        Event::new(event_type, EventPayload::Custom(serde_json::json!(tag)), "test")
    }

    fn tag(event: &Event) -> String {
        match event.payload() {
            EventPayload::Custom(v) => v.as_str().unwrap_or_default().to_string(),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_offer_up_to_capacity_then_refuse() {
        let queue = EventQueue::new(3);
        for i in 0..3 {
            assert!(queue.offer(event(EventType::Feedback, &i.to_string())));
            assert_eq!(queue.size(), i + 1);
        }
        assert!(queue.is_full());
        assert!(!queue.offer(event(EventType::Shutdown, "overflow")));
        assert_eq!(queue.size(), 3);
        assert_eq!(queue.load_percentage(), 100.0);
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(EventQueue::default().capacity(), 10_000);
    }

    #[tokio::test]
    async fn test_take_returns_lowest_rank_first() {
        let queue = EventQueue::new(16);
        queue.offer(event(EventType::Feedback, "feedback"));
        queue.offer(event(EventType::Initiative, "initiative"));
        queue.offer(event(EventType::ConversationTurn, "turn"));
        queue.offer(event(EventType::ScheduledAction, "scheduled"));

        assert_eq!(tag(&queue.take().await), "turn");
        assert_eq!(tag(&queue.take().await), "initiative");
        assert_eq!(tag(&queue.take().await), "scheduled");
        assert_eq!(tag(&queue.take().await), "feedback");
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_equal_rank_is_served_in_arrival_order() {
        let queue = EventQueue::new(16);
        // MemoryFormed, OpinionFormed and DesireFormed share one rank.
        queue.offer(event(EventType::OpinionFormed, "first"));
        queue.offer(event(EventType::MemoryFormed, "second"));
        queue.offer(event(EventType::DesireFormed, "third"));
        queue.offer(event(EventType::OpinionFormed, "fourth"));

        let order: Vec<String> = [
            queue.take().await,
            queue.take().await,
            queue.take().await,
            queue.take().await,
        ]
        .iter()
        .map(tag)
        .collect();
        assert_eq!(order, vec!["first", "second", "third", "fourth"]);
    }

    #[tokio::test]
    async fn test_take_waits_for_offer() {
        let queue = Arc::new(EventQueue::new(4));
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.take().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());

        queue.offer(event(EventType::Initiative, "late"));
        let taken = consumer.await.unwrap();
        assert_eq!(tag(&taken), "late");
        assert_eq!(queue.size(), 0);
    }

    #[tokio::test]
    async fn test_poll_times_out_on_empty_queue() {
        let queue = EventQueue::new(4);
        assert!(queue.poll(Duration::from_millis(10)).await.is_none());

        queue.offer(event(EventType::Feedback, "ready"));
        let polled = queue.poll(Duration::from_millis(10)).await;
        assert_eq!(polled.map(|e| tag(&e)), Some("ready".to_string()));
    }

    #[tokio::test]
    async fn test_take_until_reports_interruption() {
        let queue = Arc::new(EventQueue::new(4));
        let (tx, mut rx) = shutdown_channel();

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.take_until(&mut rx).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send(ShutdownSignal::Immediate).unwrap();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(ref e) if e.is_interrupted()));

        // Nothing was consumed by the interrupted wait.
        queue.offer(event(EventType::Feedback, "kept"));
        assert_eq!(queue.size(), 1);
    }

    #[test]
    fn test_peek_does_not_remove() {
        let queue = EventQueue::new(4);
        assert!(queue.peek().is_none());

        queue.offer(event(EventType::Feedback, "low"));
        queue.offer(event(EventType::Initiative, "high"));

        assert_eq!(queue.peek().map(|e| tag(&e)), Some("high".to_string()));
        assert_eq!(queue.size(), 2);
    }

    #[test]
    fn test_clear_drops_everything() {
        let queue = EventQueue::new(8);
        for i in 0..5 {
            queue.offer(event(EventType::Feedback, &i.to_string()));
        }
        assert_eq!(queue.clear(), 5);
        assert_eq!(queue.size(), 0);
        assert!(queue.is_empty());
        assert!(queue.try_take().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_consumers_take_each_event_once() {
        let queue = Arc::new(EventQueue::new(1_000));
        let mut consumers = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            consumers.push(tokio::spawn(async move {
                let mut taken = Vec::new();
                while let Some(event) = queue.poll(Duration::from_millis(50)).await {
                    taken.push(event.id());
                }
                taken
            }));
        }

        let mut offered = Vec::new();
        for i in 0..200 {
            let e = event(EventType::Feedback, &i.to_string());
            offered.push(e.id());
            assert!(queue.offer(e));
        }

        let mut seen = Vec::new();
        for consumer in consumers {
            seen.extend(consumer.await.unwrap());
        }
        seen.sort();
        offered.sort();
        assert_eq!(seen, offered);
        assert!(queue.is_empty());
    }
}
