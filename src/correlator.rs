//! Reply correlation for request/response operations.
//!
//! A caller registers a keyed slot before its request frame is queued; the
//! reader hands each inbound reply to the slot it answers. Replies are matched
//! by key, not by arrival order, so concurrent requests on one connection
//! cannot steal each other's replies.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};

use crate::frame::{Command, Frame};

/// What a pending request is waiting for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ReplyKey {
    /// The CONNECTED (or ERROR) answering a CONNECT.
    Connected,
    /// The RECEIPT (or ERROR) whose `receipt-id` equals the given id.
    Receipt(String),
}

/// Outcome of waiting on a reply slot.
#[derive(Debug)]
pub(crate) enum Reply {
    Frame(Frame),
    /// The slot was dropped before a reply arrived (connection closed).
    Dropped,
    TimedOut,
}

/// Alias for the pending map: reply key -> oneshot sender notified on reply.
type PendingReplies = HashMap<ReplyKey, oneshot::Sender<Frame>>;

#[derive(Default)]
pub(crate) struct Correlator {
    pending: Mutex<PendingReplies>,
}

impl Correlator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a slot for `key`. Any earlier slot with the same key is
    /// dropped, which fails its waiter.
    pub(crate) async fn register(&self, key: ReplyKey) -> oneshot::Receiver<Frame> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(key, tx);
        rx
    }

    pub(crate) async fn cancel(&self, key: &ReplyKey) {
        self.pending.lock().await.remove(key);
    }

    /// Drop every slot; their waiters observe `Reply::Dropped`.
    pub(crate) async fn fail_all(&self) {
        self.pending.lock().await.clear();
    }

    /// Deliver `frame` to the slot(s) it answers.
    ///
    /// Returns the frame back when no slot consumed it. An ERROR without a
    /// matching `receipt-id` goes to every pending slot.
    pub(crate) async fn route(&self, frame: Frame) -> Option<Frame> {
        let mut pending = self.pending.lock().await;
        let key = match frame.command {
            Command::Connected => Some(ReplyKey::Connected),
            Command::Receipt | Command::Error => frame
                .get_header("receipt-id")
                .map(|id| ReplyKey::Receipt(id.to_string())),
            _ => return Some(frame),
        };

        if let Some(tx) = key.as_ref().and_then(|k| pending.remove(k)) {
            // A receiver that gave up (timed out) leaves the frame unclaimed.
            return tx.send(frame).err();
        }

        if frame.command == Command::Error && !pending.is_empty() {
            let mut delivered = false;
            for (_, tx) in pending.drain() {
                delivered |= tx.send(frame.clone()).is_ok();
            }
            if delivered {
                return None;
            }
        }
        Some(frame)
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }
}

/// Wait for `slot` for at most `timeout`.
pub(crate) async fn await_reply(slot: oneshot::Receiver<Frame>, timeout: Duration) -> Reply {
    match tokio::time::timeout(timeout, slot).await {
        Ok(Ok(frame)) => Reply::Frame(frame),
        Ok(Err(_)) => Reply::Dropped,
        Err(_) => Reply::TimedOut,
    }
}
