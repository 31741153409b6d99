//! Bounded inter-stage queues (§5).
//!
//! Every connection between pipeline stages is one of these. The
//! input→channelizer link blocks the producer when full (`Backpressure`);
//! every other link drops the newest item and increments an overflow
//! counter instead of stalling the producer (`DropOnOverflow`) — a slow
//! channel worker or PDU decoder must never stall the shared channelizer.

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    Backpressure,
    DropOnOverflow,
}

pub struct Queue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    policy: OverflowPolicy,
    overflow_count: Arc<AtomicU64>,
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            policy: self.policy,
            overflow_count: self.overflow_count.clone(),
        }
    }
}

impl<T> Queue<T> {
    /// `capacity = 0` means unbounded, per the output queue's high-water
    /// mark semantics in §6.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let (tx, rx) = if capacity == 0 {
            crossbeam::channel::unbounded()
        } else {
            bounded(capacity)
        };
        Self {
            tx,
            rx,
            policy,
            overflow_count: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn overflow_count(&self) -> u64 {
        self.overflow_count.load(Ordering::Relaxed)
    }

    /// Send `item`, applying this queue's overflow policy when full.
    /// Returns `false` if the item was dropped (only possible under
    /// `DropOnOverflow`); the send itself never fails under `Backpressure`
    /// unless every receiver has disconnected.
    pub fn send(&self, item: T) -> bool {
        match self.policy {
            OverflowPolicy::Backpressure => self.tx.send(item).is_ok(),
            OverflowPolicy::DropOnOverflow => match self.tx.try_send(item) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    self.overflow_count.fetch_add(1, Ordering::Relaxed);
                    false
                }
                Err(TrySendError::Disconnected(_)) => false,
            },
        }
    }

    /// Block waiting for the next item, or return `None` once every sender
    /// has disconnected or `timeout` elapses.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(item) => Some(item),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn sender(&self) -> Sender<T> {
        self.tx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backpressure_queue_blocks_via_bounded_channel() {
        let q: Queue<u32> = Queue::new(1, OverflowPolicy::Backpressure);
        assert!(q.send(1));
        assert_eq!(q.recv_timeout(Duration::from_millis(50)), Some(1));
    }

    #[test]
    fn drop_on_overflow_queue_counts_drops_instead_of_blocking() {
        let q: Queue<u32> = Queue::new(1, OverflowPolicy::DropOnOverflow);
        assert!(q.send(1));
        assert!(!q.send(2));
        assert_eq!(q.overflow_count(), 1);
        assert_eq!(q.recv_timeout(Duration::from_millis(50)), Some(1));
    }

    #[test]
    fn unbounded_queue_never_drops() {
        let q: Queue<u32> = Queue::new(0, OverflowPolicy::DropOnOverflow);
        for i in 0..1000 {
            assert!(q.send(i));
        }
        assert_eq!(q.overflow_count(), 0);
    }
}
