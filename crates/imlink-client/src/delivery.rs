//! Delivery tracker: correlates server acks with outstanding sends.
//!
//! The writer task registers a waiter under the frame's sequence before the
//! frame hits the wire, so an ack can never overtake its registration. A
//! `complete` for sequence `k` wakes exactly the waiter registered under `k`.

use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::time::Instant;

use imlink_core::error::{ImlinkError, Result};
use imlink_core::protocol::body::Ack;

#[derive(Debug)]
struct Pending {
    sent_at: Instant,
    tx: oneshot::Sender<Ack>,
}

#[derive(Debug, Default)]
pub struct DeliveryTracker {
    pending: DashMap<i32, Pending>,
}

impl DeliveryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outstanding send. A previous waiter under the same
    /// sequence (only possible after wrap-around) is dropped.
    pub fn register(&self, seq: i32, tx: oneshot::Sender<Ack>) {
        let prev = self.pending.insert(
            seq,
            Pending {
                sent_at: Instant::now(),
                tx,
            },
        );
        if prev.is_some() {
            tracing::warn!(seq, "replaced stale delivery waiter");
        }
    }

    /// Complete the waiter for `ack.seq`. Returns false when nobody waits.
    pub fn complete(&self, ack: Ack) -> bool {
        let Some((_, p)) = self.pending.remove(&ack.seq) else {
            return false;
        };
        tracing::debug!(
            seq = ack.seq,
            status = ack.status,
            rtt_ms = p.sent_at.elapsed().as_millis() as u64,
            "ack matched"
        );
        // Receiver gone means the caller already timed out.
        let _ = p.tx.send(ack);
        true
    }

    /// Drop the waiter for `seq` without completing it.
    pub fn forget(&self, seq: i32) {
        self.pending.remove(&seq);
    }

    /// Fail every outstanding wait (connection lost). Returns how many.
    pub fn fail_all(&self) -> usize {
        let n = self.pending.len();
        self.pending.clear();
        n
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, seq: i32) -> bool {
        self.pending.contains_key(&seq)
    }
}

/// Await a registered ack for `seq`, forgetting the waiter on timeout.
pub async fn await_ack(
    tracker: &DeliveryTracker,
    seq: i32,
    rx: oneshot::Receiver<Ack>,
    timeout: Duration,
) -> Result<Ack> {
    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(ack)) => Ok(ack),
        // Sender dropped by `fail_all` or a failed write.
        Ok(Err(_)) => Err(ImlinkError::ConnectionClosed),
        Err(_) => {
            tracker.forget(seq);
            tracing::warn!(seq, "ack timed out");
            Err(ImlinkError::Timeout("ack"))
        }
    }
}
