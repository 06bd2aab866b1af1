//! Shutdown signalling for background tasks
//!
//! Consumers, periodic drivers and blocking queue waits all listen on the
//! same broadcast channel.

use tokio::sync::broadcast;

/// Shutdown signal receiver
pub type ShutdownReceiver = broadcast::Receiver<ShutdownSignal>;

/// Shutdown signal sender
pub type ShutdownSender = broadcast::Sender<ShutdownSignal>;

/// Shutdown signal types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Graceful shutdown - finish the event in hand, then stop
    Graceful,
    /// Immediate shutdown - abort waits right away
    Immediate,
}

/// Create a shutdown channel
pub fn shutdown_channel() -> (ShutdownSender, ShutdownReceiver) {
    broadcast::channel(16)
}

/// Resolve once a shutdown signal arrives or every sender is gone
pub async fn wait_for_shutdown(receiver: &mut ShutdownReceiver) -> ShutdownSignal {
    loop {
        match receiver.recv().await {
            Ok(signal) => return signal,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return ShutdownSignal::Immediate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_receives_signal() {
        let (tx, mut rx) = shutdown_channel();
        tx.send(ShutdownSignal::Graceful).unwrap();
        assert_eq!(wait_for_shutdown(&mut rx).await, ShutdownSignal::Graceful);
    }

    #[tokio::test]
    async fn test_closed_channel_counts_as_shutdown() {
        let (tx, mut rx) = shutdown_channel();
        drop(tx);
        assert_eq!(wait_for_shutdown(&mut rx).await, ShutdownSignal::Immediate);
    }
}
