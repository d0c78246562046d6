use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard, mpsc};

use crate::error::ConnError;
use crate::frame::Frame;

/// Subscription acknowledgement modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    #[default]
    Auto,
    Client,
    ClientIndividual,
}

impl AckMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckMode::Auto => "auto",
            AckMode::Client => "client",
            AckMode::ClientIndividual => "client-individual",
        }
    }
}

impl FromStr for AckMode {
    type Err = ConnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(AckMode::Auto),
            "client" => Ok(AckMode::Client),
            "client-individual" => Ok(AckMode::ClientIndividual),
            other => Err(ConnError::InvalidAckMode(other.to_string())),
        }
    }
}

impl fmt::Display for AckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receive-only handle on a destination's delivery queue, returned from
/// `Connection::subscribe`.
///
/// Clones share the same queue: each MESSAGE is delivered to exactly one
/// `next_message` call across all clones.
#[derive(Clone)]
pub struct Subscription {
    id: String,
    destination: String,
    ack: AckMode,
    receiver: Arc<Mutex<mpsc::Receiver<Frame>>>,
}

impl Subscription {
    pub(crate) fn new(
        id: String,
        destination: String,
        ack: AckMode,
        receiver: mpsc::Receiver<Frame>,
    ) -> Self {
        Self {
            id,
            destination,
            ack,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    /// Returns the subscription id sent in the SUBSCRIBE frame.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the destination this subscription listens to.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn ack_mode(&self) -> AckMode {
        self.ack
    }

    /// Wait for the next MESSAGE. Returns `None` once the connection has shut
    /// down and the queue is drained.
    pub async fn next_message(&self) -> Option<Frame> {
        let mut rx = self.receiver.lock().await;
        rx.recv().await
    }

    /// Like `next_message`, giving up after `timeout`.
    pub async fn next_message_timeout(&self, timeout: Duration) -> Option<Frame> {
        tokio::time::timeout(timeout, self.next_message())
            .await
            .ok()
            .flatten()
    }

    /// Whether both handles read from the same delivery queue.
    pub fn same_queue(&self, other: &Subscription) -> bool {
        Arc::ptr_eq(&self.receiver, &other.receiver)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("destination", &self.destination)
            .field("ack", &self.ack)
            .finish()
    }
}

/// Internal subscription entry stored for each destination.
///
/// Only a weak reference to the receiver is kept, so once the application
/// drops every `Subscription` handle the queue closes and the reader stops
/// delivering to it.
struct SubscriptionEntry {
    sender: mpsc::Sender<Frame>,
    id: String,
    ack: AckMode,
    receiver: Weak<Mutex<mpsc::Receiver<Frame>>>,
}

type Gate = Arc<Mutex<()>>;

/// Destination -> delivery queue.
///
/// Written by `Connection::subscribe`, read by the reader when routing
/// MESSAGE frames. Each destination also has an async gate so concurrent
/// subscribes to one destination run one at a time, while distinct
/// destinations do not wait on each other. The gate is never held by the
/// reader.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    entries: Mutex<HashMap<String, SubscriptionEntry>>,
    gates: std::sync::Mutex<HashMap<String, Gate>>,
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn gates(&self) -> std::sync::MutexGuard<'_, HashMap<String, Gate>> {
        self.gates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take a lease on the gate serializing subscribes for `destination`.
    /// The gate is forgotten once its last lease is dropped.
    pub(crate) fn gate(&self, destination: &str) -> GateLease<'_> {
        let gate = self
            .gates()
            .entry(destination.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        GateLease {
            registry: self,
            destination: destination.to_string(),
            gate,
        }
    }

    /// The live handle for `destination`. An entry whose handles were all
    /// dropped counts as absent.
    pub(crate) async fn get(&self, destination: &str) -> Option<Subscription> {
        let entries = self.entries.lock().await;
        let entry = entries.get(destination)?;
        let receiver = entry.receiver.upgrade()?;
        Some(Subscription {
            id: entry.id.clone(),
            destination: destination.to_string(),
            ack: entry.ack,
            receiver,
        })
    }

    /// Sender for the delivery queue of `destination`, if subscribed.
    pub(crate) async fn sender(&self, destination: &str) -> Option<mpsc::Sender<Frame>> {
        let entries = self.entries.lock().await;
        entries.get(destination).map(|e| e.sender.clone())
    }

    pub(crate) async fn insert(&self, sender: mpsc::Sender<Frame>, handle: &Subscription) {
        let entry = SubscriptionEntry {
            sender,
            id: handle.id.clone(),
            ack: handle.ack,
            receiver: Arc::downgrade(&handle.receiver),
        };
        let mut entries = self.entries.lock().await;
        entries.insert(handle.destination.clone(), entry);
    }

    pub(crate) async fn remove(&self, destination: &str) {
        self.entries.lock().await.remove(destination);
    }

    /// Forget `destination` if its delivery queue has no receiver left.
    pub(crate) async fn remove_closed(&self, destination: &str) {
        let mut entries = self.entries.lock().await;
        if entries.get(destination).is_some_and(|e| e.sender.is_closed()) {
            entries.remove(destination);
        }
    }

    /// Drop every delivery queue sender; subscribers drain what is queued and
    /// then see `None`.
    pub(crate) async fn clear(&self) {
        self.entries.lock().await.clear();
        self.gates().clear();
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

/// Holds one destination's gate for the duration of a subscribe.
pub(crate) struct GateLease<'a> {
    registry: &'a SubscriptionRegistry,
    destination: String,
    gate: Gate,
}

impl GateLease<'_> {
    pub(crate) async fn lock(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }
}

impl Drop for GateLease<'_> {
    fn drop(&mut self) {
        let mut gates = self.registry.gates();
        // Leases are only handed out under the map lock, so a count of two
        // (map + this lease) means nobody else is waiting on the gate.
        let last = gates
            .get(&self.destination)
            .is_some_and(|g| Arc::ptr_eq(g, &self.gate) && Arc::strong_count(g) == 2);
        if last {
            gates.remove(&self.destination);
        }
    }
}
