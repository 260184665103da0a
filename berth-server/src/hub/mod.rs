//! Event broadcast hub
//!
//! Fans typed events out to every connected subscriber. Each subscriber
//! owns a bounded queue; broadcast is fire-and-forget per connection, and
//! a queue that is full or closed gets its subscriber dropped rather than
//! letting one slow connection hold back the rest.

pub mod subscriber;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use berth_common::protocol::PushEvent;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::constants::SUBSCRIBER_QUEUE_CAPACITY;

/// Fan-out registry for subscriber connections
pub struct EventHub {
    subscribers: Mutex<HashMap<Uuid, mpsc::Sender<PushEvent>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Register a subscriber and get its bounded event queue.
    ///
    /// Callers register *before* taking their initial snapshot so no
    /// mutation can slip between snapshot and event stream.
    pub fn subscribe(&self) -> (Uuid, mpsc::Receiver<PushEvent>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        let id = Uuid::new_v4();
        self.subscribers
            .lock()
            .expect("subscriber registry lock poisoned")
            .insert(id, tx);
        (id, rx)
    }

    /// Remove a subscriber (connection closed or dropped)
    pub fn unsubscribe(&self, id: &Uuid) {
        self.subscribers
            .lock()
            .expect("subscriber registry lock poisoned")
            .remove(id);
    }

    /// Broadcast one event to every subscriber.
    ///
    /// Subscribers whose queue is full or closed are removed; their send
    /// loop notices the closed queue and shuts the connection down.
    /// Returns the number of subscribers the event was queued for.
    pub fn broadcast(&self, event: &PushEvent) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .expect("subscriber registry lock poisoned");

        let mut dropped = Vec::new();
        let mut delivered = 0;
        for (id, tx) in subscribers.iter() {
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => dropped.push(*id),
            }
        }
        for id in dropped {
            subscribers.remove(&id);
        }
        delivered
    }

    /// Number of currently connected subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("subscriber registry lock poisoned")
            .len()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard that unsubscribes a connection when dropped.
///
/// Ensures subscribers are always removed from the registry even if the
/// send loop exits early on an error.
pub struct SubscriberGuard {
    hub: Arc<EventHub>,
    id: Uuid,
}

impl SubscriberGuard {
    pub fn new(hub: Arc<EventHub>, id: Uuid) -> Self {
        Self { hub, id }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        self.hub.unsubscribe(&self.id);
    }
}
