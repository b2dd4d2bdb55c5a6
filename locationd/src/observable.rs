//! Latest-value-plus-subscription primitives.
//!
//! [`Signal`] is a multicast callback list; [`Property`] pairs a current
//! value with a change signal under single-writer/many-reader discipline.
//! Subscriptions are owned by [`Connection`] tokens: dropping the token (or
//! calling `disconnect`, idempotently) removes the subscriber.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

type Slot<T> = Arc<dyn Fn(&T) + Send + Sync>;
type SlotMap<T> = Mutex<BTreeMap<u64, Slot<T>>>;

static NEXT_SLOT_ID: AtomicU64 = AtomicU64::new(1);

/// A multicast signal; emission invokes every connected subscriber in
/// connection order.
pub struct Signal<T> {
    slots: Arc<SlotMap<T>>,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let connected = self.slots.lock().map(|s| s.len()).unwrap_or(0);
        f.debug_struct("Signal").field("connected", &connected).finish()
    }
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Connects a subscriber; the returned token owns the subscription.
    pub fn connect(&self, subscriber: impl Fn(&T) + Send + Sync + 'static) -> Connection
    where
        T: 'static,
    {
        let id = NEXT_SLOT_ID.fetch_add(1, Ordering::Relaxed);
        self.slots
            .lock()
            .expect("signal slot table poisoned")
            .insert(id, Arc::new(subscriber));

        let slots = Arc::downgrade(&self.slots);
        Connection::new(move || {
            if let Some(slots) = Weak::upgrade(&slots) {
                slots.lock().expect("signal slot table poisoned").remove(&id);
            }
        })
    }

    /// Invokes every subscriber with `value`.
    ///
    /// Subscribers are invoked outside the slot table lock so they may
    /// connect and disconnect freely.
    pub fn emit(&self, value: &T) {
        let subscribers: Vec<Slot<T>> = self
            .slots
            .lock()
            .expect("signal slot table poisoned")
            .values()
            .cloned()
            .collect();
        for subscriber in subscribers {
            subscriber(value);
        }
    }
}

/// Owns one subscription. Dropping it disconnects; explicit `disconnect` is
/// idempotent.
pub struct Connection {
    disconnect: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

impl Connection {
    fn new(disconnect: impl FnOnce() + Send + 'static) -> Self {
        Self {
            disconnect: Mutex::new(Some(Box::new(disconnect))),
        }
    }

    pub fn disconnect(&self) {
        if let Some(disconnect) = self.disconnect.lock().expect("connection poisoned").take() {
            disconnect();
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// A current value plus a change signal. `set` notifies subscribers only
/// when the value actually changes.
pub struct Property<T> {
    value: Mutex<T>,
    changed: Signal<T>,
}

impl<T: std::fmt::Debug> std::fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Property")
            .field("value", &*self.value.lock().expect("property poisoned"))
            .finish()
    }
}

impl<T: Clone + PartialEq> Property<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Mutex::new(value),
            changed: Signal::new(),
        }
    }

    pub fn get(&self) -> T {
        self.value.lock().expect("property poisoned").clone()
    }

    /// Stores `value`; returns true (and notifies) iff it differed.
    pub fn set(&self, value: T) -> bool
    where
        T: 'static,
    {
        {
            let mut current = self.value.lock().expect("property poisoned");
            if *current == value {
                return false;
            }
            *current = value.clone();
        }
        self.changed.emit(&value);
        true
    }

    /// Applies `mutate` to the value; notifies iff it reports a change.
    pub fn update(&self, mutate: impl FnOnce(&mut T) -> bool) -> bool
    where
        T: 'static,
    {
        let after = {
            let mut current = self.value.lock().expect("property poisoned");
            if !mutate(&mut current) {
                return false;
            }
            current.clone()
        };
        self.changed.emit(&after);
        true
    }

    pub fn changed(&self) -> &Signal<T> {
        &self.changed
    }
}

impl<T: Clone + PartialEq + Default> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
