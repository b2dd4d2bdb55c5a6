//! Serialized in-process pub/sub for system events.
//!
//! `SerializingBus` queues every pushed event onto one dispatcher task (the
//! strand). Each subscriber observes the same total order and needs no
//! internal locking for per-subscriber state; dispatch never runs
//! subscribers synchronously from the `push` call site.

use crate::events::Event;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::debug;

/// A bus subscriber callback. Runs on the dispatcher strand.
pub type EventReceiver = Arc<dyn Fn(&Event) + Send + Sync>;

/// Identifies one subscription on a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// The in-process event bus.
pub trait Bus: Send + Sync {
    fn subscribe(&self, receiver: EventReceiver) -> SubscriptionId;
    /// Unsubscribing an unknown or already removed id is a no-op.
    fn unsubscribe(&self, id: SubscriptionId);
    fn push(&self, event: Event);
}

/// Bus implementation dispatching in FIFO order on a single tokio task.
pub struct SerializingBus {
    subscribers: Arc<Mutex<BTreeMap<u64, EventReceiver>>>,
    next_id: AtomicU64,
    tx: mpsc::UnboundedSender<Event>,
}

impl std::fmt::Debug for SerializingBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let subscribed = self.subscribers.lock().map(|s| s.len()).unwrap_or(0);
        f.debug_struct("SerializingBus")
            .field("subscribed", &subscribed)
            .finish()
    }
}

impl SerializingBus {
    /// Creates the bus and spawns its dispatcher strand on the current
    /// runtime.
    pub fn new() -> Arc<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let subscribers: Arc<Mutex<BTreeMap<u64, EventReceiver>>> =
            Arc::new(Mutex::new(BTreeMap::new()));

        let dispatch_set = subscribers.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                // Snapshot under the lock, call outside it: a receiver may
                // subscribe or unsubscribe while handling the event.
                let receivers: Vec<EventReceiver> = dispatch_set
                    .lock()
                    .expect("bus subscriber table poisoned")
                    .values()
                    .cloned()
                    .collect();
                for receiver in receivers {
                    receiver(&event);
                }
            }
            debug!("event bus dispatcher stopped");
        });

        Arc::new(Self {
            subscribers,
            next_id: AtomicU64::new(1),
            tx,
        })
    }
}

impl Bus for SerializingBus {
    fn subscribe(&self, receiver: EventReceiver) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .expect("bus subscriber table poisoned")
            .insert(id, receiver);
        SubscriptionId(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers
            .lock()
            .expect("bus subscriber table poisoned")
            .remove(&id.0);
    }

    fn push(&self, event: Event) {
        // Fails only when the runtime is shutting down and the dispatcher is
        // gone; events are dropped at that point by design.
        if self.tx.send(event).is_err() {
            debug!("event bus dispatcher gone, dropping event");
        }
    }
}
